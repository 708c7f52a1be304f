use async_trait::async_trait;
use tracing::info;

use common::{Notifier, Result};

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        info!(recipient = %recipient, subject = %subject, body = %body, "Signal notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds() {
        assert!(LogNotifier.notify("anyone", "BUY ESH24", "close: 102").await.is_ok());
    }
}
