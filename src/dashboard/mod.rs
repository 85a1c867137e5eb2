//! Interactive terminal dashboard: state machine, keyboard input, and
//! rendering for a live load-test run.

mod controller;
mod input;
mod render;
mod reporter;
mod state;

pub use controller::{DashboardController, TICK_INTERVAL};
pub use input::concurrency_step;
pub use reporter::DashboardReporter;
pub use state::{DashboardState, HISTORY_CAPACITY, History, RunStatus};
