//! Day-ahead dispatch optimization: input assembly, seeding, evolutionary
//! search and the worker loop driving it all.

pub mod params;
pub mod schedule_log;
pub mod search;
pub mod seeder;
pub mod worker;

pub use params::{calculate_deadline, Params, Period, PeriodLength};
pub use search::{run_search, SearchSettings};
pub use worker::{DispatchOptimizer, DispatchSetpoint, SharedState, WorkerSettings};
