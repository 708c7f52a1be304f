use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{debug, warn};

use common::{Error, Notifier, Result};

/// Sends notifications as Telegram messages. Recipients are numeric chat ids.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let chat_id = parse_chat_id(recipient)?;
        let text = format_message(subject, body);

        if let Err(e) = self.bot.send_message(chat_id, text).await {
            warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram notification");
            return Err(Error::Notify(e.to_string()));
        }
        debug!(chat_id = ?chat_id, subject = %subject, "Telegram notification sent");
        Ok(())
    }
}

fn parse_chat_id(recipient: &str) -> Result<ChatId> {
    recipient
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::Notify(format!("'{recipient}' is not a Telegram chat id")))
}

fn format_message(subject: &str, body: &str) -> String {
    if body.is_empty() {
        subject.to_string()
    } else {
        format!("{subject}\n{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ids_must_be_numeric() {
        assert_eq!(parse_chat_id(" -100123 ").unwrap(), ChatId(-100123));
        assert!(matches!(parse_chat_id("trader@example.com"), Err(Error::Notify(_))));
    }

    #[test]
    fn subject_goes_on_the_first_line() {
        assert_eq!(format_message("BUY ESH24", "close: 102"), "BUY ESH24\nclose: 102");
        assert_eq!(format_message("SELL ESH24", ""), "SELL ESH24");
    }

    #[tokio::test]
    async fn bad_recipient_fails_before_any_request() {
        let notifier = TelegramNotifier::new("123:fake");
        let result = notifier.notify("not-a-chat", "BUY ESH24", "close: 102").await;
        assert!(matches!(result, Err(Error::Notify(_))));
    }
}
