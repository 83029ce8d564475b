pub mod agent;
pub mod bridge;
pub mod bus;
pub mod config;
pub mod core;
pub mod error;
pub mod llm;
pub mod log;
pub mod orchestration;
pub mod planner;
pub mod state;

pub use error::{Error, Result};
