pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod planning;
pub mod queue;
pub mod routing;

pub use error::{Error, Result};
pub use planning::{DispatchReport, Plan, Taskmaster};
