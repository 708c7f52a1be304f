pub mod config;
pub mod error;
pub mod fields;
pub mod notifier;
pub mod shutdown;
pub mod source;
pub mod types;

pub use config::{Config, StreamConfig};
pub use error::{Error, Result};
pub use notifier::Notifier;
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use source::{BarField, BarSource};
pub use types::*;
