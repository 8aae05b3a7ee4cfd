pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod money;
pub mod mutation;
pub mod period;
pub mod projection;
pub mod report;
pub mod stats;
pub mod store;
pub mod workflow;

pub use error::{DeskError, Result};
