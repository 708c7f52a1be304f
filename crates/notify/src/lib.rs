//! Delivery of signal notifications.

pub mod logging;
pub mod telegram;

use std::sync::Arc;

use common::{Config, Notifier};

pub use logging::LogNotifier;
pub use telegram::TelegramNotifier;

/// Telegram when a bot token is configured, the log otherwise.
pub fn from_config(cfg: &Config) -> Arc<dyn Notifier> {
    match &cfg.telegram_token {
        Some(token) => Arc::new(TelegramNotifier::new(token)),
        None => Arc::new(LogNotifier),
    }
}
