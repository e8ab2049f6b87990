pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod gateway;
pub mod image;
pub mod io;
pub mod paths;
pub mod plan;
pub mod release;
pub mod runner;
pub mod state;
pub mod tfvars;
pub mod types;
pub mod version;

pub use error::{DrydockError, Result};
