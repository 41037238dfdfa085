// Scheduler module entrypoint
pub mod phase;     // pure far/near/live classification + cadence lookup
pub mod tracker;   // per-market polling state (identity, schedule, deadline)
pub mod scheduler; // reconcile/dispatch loops over the tracked set

pub use phase::{Cadence, MarketPhase};
pub use scheduler::Scheduler;
pub use tracker::{ScheduleParseError, TrackedMarket};
