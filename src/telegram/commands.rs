//! Inbound command handling
//!
//! Long-polls getUpdates and answers the two supported commands:
//! `/status` reports the current state of every device scoped to the
//! requesting chat (the escalation chat sees all), `/getId` echoes the
//! requesting chat id to the escalation chat.

use crate::device_registry::DeviceRegistry;
use crate::notifier::NotificationDispatcher;
use crate::snapshot_pipeline::SnapshotPipeline;
use crate::telegram::TelegramClient;
use std::sync::Arc;
use std::time::Duration;

pub struct CommandListener {
    client: Arc<TelegramClient>,
    registry: Arc<DeviceRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    pipeline: Arc<SnapshotPipeline>,
    /// Escalation chat: sees every device and receives /getId answers
    dev_chat_id: i64,
}

impl CommandListener {
    pub fn new(
        client: Arc<TelegramClient>,
        registry: Arc<DeviceRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
        pipeline: Arc<SnapshotPipeline>,
        dev_chat_id: i64,
    ) -> Self {
        Self {
            client,
            registry,
            dispatcher,
            pipeline,
            dev_chat_id,
        }
    }

    /// Poll updates until the process stops
    pub async fn run(self) {
        let mut offset = 0i64;

        loop {
            match self.client.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let Some(message) = update.message else { continue };
                        let Some(text) = message.text.as_deref() else { continue };
                        self.handle(message.chat.id, message.message_id, text).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed, backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn handle(&self, chat_id: i64, message_id: i64, text: &str) {
        if text.starts_with("/getId") {
            tracing::info!(chat_id, "identity query");
            self.dispatcher
                .send_text("System", self.dev_chat_id, &chat_id.to_string(), None)
                .await;
            return;
        }

        if text.starts_with("/status") {
            tracing::info!(chat_id, "status query");
            for handle in self.registry.handles() {
                let scoped = handle.config.chat_id == chat_id || chat_id == self.dev_chat_id;
                if !scoped {
                    continue;
                }

                match self.registry.query_status(&handle.config.device_id).await {
                    Ok(status) => {
                        let text = crate::channel_router::state_label(&handle.config, status.state);
                        let sent = self
                            .dispatcher
                            .send_text(&handle.config.label, chat_id, &text, Some(message_id))
                            .await;
                        // Current snapshots follow the status line, threaded
                        // under it
                        if let Some(sent) = sent {
                            self.pipeline.trigger(Arc::clone(&handle.config), sent);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            device = %handle.config.label,
                            error = %e,
                            "status query failed"
                        );
                    }
                }
            }
        }
    }
}
