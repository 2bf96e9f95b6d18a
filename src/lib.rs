// Domain data shapes, errors and constants shared across layers
pub mod common;
pub mod config;

// Release resolution and price extraction
pub mod matching;
pub mod pricing;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub mod observability;

pub use common::{DiggerError, Result};
pub use config::Config;
