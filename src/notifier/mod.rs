//! NotificationDispatcher - Messaging Delivery
//!
//! ## Responsibilities
//!
//! - Format and send text/photo messages through the messaging collaborator
//! - Best-effort semantics: failures are logged with device label and stage,
//!   never retried (avoids retry storms during connectivity flapping)
//! - Thread follow-up deliveries to the original message handle
//!
//! The messaging platform itself sits behind the `Messenger` trait; the
//! Telegram implementation lives in `crate::telegram`.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Handle to a sent message, used as the reply anchor for follow-ups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle {
    pub message_id: i64,
}

/// Delivery options
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Thread the message under this message id
    pub reply_to: Option<i64>,
    /// Deliver without a notification sound
    pub silent: bool,
    /// Render the text as Markdown (used for backticked raw errors)
    pub markdown: bool,
}

/// Messaging collaborator capability
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        opts: &SendOptions,
    ) -> crate::Result<MessageHandle>;

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Vec<u8>,
        opts: &SendOptions,
    ) -> crate::Result<MessageHandle>;
}

/// Fire-and-forget dispatcher over a `Messenger`
pub struct NotificationDispatcher {
    messenger: Arc<dyn Messenger>,
}

impl NotificationDispatcher {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Send a text message prefixed with the device label
    ///
    /// Returns the message handle on success; on failure logs and returns
    /// `None` so callers skip any follow-up deliveries.
    pub async fn send_text(
        &self,
        label: &str,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Option<MessageHandle> {
        let full = format!("{}: {}", label, text);
        let opts = SendOptions {
            reply_to,
            ..Default::default()
        };

        match self.messenger.send_text(chat_id, &full, &opts).await {
            Ok(handle) => {
                tracing::debug!(
                    device = %label,
                    chat_id,
                    message_id = handle.message_id,
                    "text sent"
                );
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(
                    device = %label,
                    chat_id,
                    stage = "send_text",
                    error = %e,
                    "notification send failed"
                );
                None
            }
        }
    }

    /// Deliver a snapshot image, silent and threaded to the original message
    pub async fn send_photo(
        &self,
        label: &str,
        chat_id: i64,
        photo: Vec<u8>,
        reply_to: Option<i64>,
    ) -> Option<MessageHandle> {
        let opts = SendOptions {
            reply_to,
            silent: true,
            markdown: false,
        };

        match self.messenger.send_photo(chat_id, photo, &opts).await {
            Ok(handle) => {
                tracing::debug!(device = %label, chat_id, "photo sent");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(
                    device = %label,
                    chat_id,
                    stage = "send_photo",
                    error = %e,
                    "photo send failed"
                );
                None
            }
        }
    }

    /// Report a failure to the escalation chat
    ///
    /// The text is annotated with the device label and a timestamp, and the
    /// raw upstream error is echoed in a Markdown code span.
    pub async fn send_failure_report(
        &self,
        label: &str,
        chat_id: i64,
        headline: &str,
        raw_error: &str,
        reply_to: Option<i64>,
    ) -> Option<MessageHandle> {
        let stamp = Utc::now().format("%Y/%m/%d %H:%M:%S");
        let full = format!("{}: {} - {}\n`{}`", label, headline, stamp, raw_error);
        let opts = SendOptions {
            reply_to,
            silent: false,
            markdown: true,
        };

        match self.messenger.send_text(chat_id, &full, &opts).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(
                    device = %label,
                    chat_id,
                    stage = "failure_report",
                    error = %e,
                    "failure report send failed"
                );
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingMessenger, Sent};
    use super::*;

    #[tokio::test]
    async fn test_text_prefixed_with_label() {
        let messenger = Arc::new(RecordingMessenger::new());
        let dispatcher = NotificationDispatcher::new(messenger.clone());

        let handle = dispatcher
            .send_text("Gate", -100200, "opening", None)
            .await
            .unwrap();
        assert_eq!(handle.message_id, 1);

        let sent = messenger.sent.lock().await;
        match &sent[0] {
            Sent::Text { chat_id, text, .. } => {
                assert_eq!(*chat_id, -100200);
                assert_eq!(text, "Gate: opening");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let messenger = Arc::new(RecordingMessenger::new());
        messenger
            .fail_text
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let dispatcher = NotificationDispatcher::new(messenger.clone());

        // No panic, no retry, just None
        assert!(dispatcher.send_text("Gate", -1, "opening", None).await.is_none());
        assert!(messenger.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_report_carries_raw_error() {
        let messenger = Arc::new(RecordingMessenger::new());
        let dispatcher = NotificationDispatcher::new(messenger.clone());

        dispatcher
            .send_failure_report("Gate", -100300, "unable to fetch snapshot", "503 upstream", None)
            .await
            .unwrap();

        let sent = messenger.sent.lock().await;
        match &sent[0] {
            Sent::Text { text, .. } => {
                assert!(text.starts_with("Gate: unable to fetch snapshot - "));
                assert!(text.ends_with("`503 upstream`"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
