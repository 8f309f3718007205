//! Concurrent word tally.
//!
//! One [`FileTallyTask`] per input file feeds lower-cased words into a shared
//! [`WordCounter`]; the [`TallyOrchestrator`] waits for every task before it
//! builds a [`TallyReport`].

mod counter;
mod errors;
mod orchestrator;
mod task;

pub use concur_config::TallyMode;
pub use counter::*;
pub use errors::*;
pub use orchestrator::*;
pub use task::*;
