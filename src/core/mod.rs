//! Worker pool driving action execution (§4.J).

mod scheduler;

pub use scheduler::Scheduler;
