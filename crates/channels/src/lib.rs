// Channel primitives for the concur tools: a thin wrapper over async_channel,
// an admission gate built on a capacity-one channel, and stream relays.

pub mod gate;
pub mod mspc;
pub mod relay;

pub use gate::{AdmissionGate, GatePass, GateRunOptions, GateRunSummary, GateState};
pub use mspc::{create_bounded, ChannelError, ReceiveChannel, SendChannel};
pub use relay::{echo, relay, RelayEnd, RelayOptions, RelayOutcome};
