//! Logging macros forwarding to `tracing`.
//!
//! The `cfg!` checks expand inside the calling crate, so a crate using these
//! macros declares its own `log_info`, `log_warnings`, `log_errors` and
//! `log_debug` features (usually through `standard` / `debug_trace`).
//! Disabled levels compile down to nothing.

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => {
        if cfg!(feature="log_info") {
            ::tracing::info!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => {
        if cfg!(feature="log_warnings") {
            ::tracing::warn!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => {
        if cfg!(feature="log_debug") {
            ::tracing::debug!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => {
        if cfg!(feature="log_errors") {
            ::tracing::error!($($t)*);
        }
    };
}
