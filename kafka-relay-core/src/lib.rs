pub mod broker;
pub mod config;
pub mod error;
pub mod logging;
pub mod relay;

pub use config::Config;
pub use error::{Error, Result};
