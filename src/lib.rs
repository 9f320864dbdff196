pub mod alert;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod feedback;
pub mod filter;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod routine;
pub mod session;
pub mod stats;

pub use error::{AppError, Result, ValidationError};
pub use orchestrator::{Dashboard, DashboardSnapshot, SearchOutcome, SearchProgress, SearchState};
