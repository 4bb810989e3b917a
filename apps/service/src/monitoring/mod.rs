/// Monitoring core
///
/// - `checker`: the HTTP probe
/// - `engine`: transition decision and exactly-once apply
/// - `scheduler`: fixed-tick loop over due targets
pub mod checker;
pub mod engine;
pub mod scheduler;
pub mod types;

pub use checker::{HttpProbe, Probe};
pub use engine::{CycleError, CycleOutcome, TransitionEngine};
pub use scheduler::SchedulerLoop;
pub use types::{Evaluation, Status, TickSummary};
