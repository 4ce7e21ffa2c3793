pub mod api;
pub mod commands;
pub mod config;
pub mod emotion;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod lifecycle;
pub mod messaging;
pub mod providers;
pub mod registry;
pub mod routing;
pub mod storage;
pub mod types;

pub use config::Config;
pub use engine::Dispatcher;
pub use error::{ChorusError, Result};
pub use types::*;
