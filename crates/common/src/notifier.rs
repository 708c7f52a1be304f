use async_trait::async_trait;

use crate::Result;

/// Delivers signal messages to human recipients.
///
/// The strategy runner calls this once per qualifying signal and recipient.
/// Delivery is best effort: callers log failures and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}
