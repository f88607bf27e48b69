//! AlertOrchestrator - Transition to Notification Flow
//!
//! ## Responsibilities
//!
//! - Consume committed transitions from all monitors
//! - Apply the channel routing decision
//! - One dispatcher text call per non-suppressed transition, then trigger
//!   the snapshot pipeline threaded to the sent message
//!
//! Handling is spawned per transition so a slow send never delays another
//! device's notification.

use crate::channel_router;
use crate::device_config::DeviceConfig;
use crate::device_monitor::Transition;
use crate::notifier::{MessageHandle, NotificationDispatcher};
use crate::snapshot_pipeline::SnapshotPipeline;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct AlertOrchestrator {
    dispatcher: Arc<NotificationDispatcher>,
    pipeline: Arc<SnapshotPipeline>,
    configs: HashMap<String, Arc<DeviceConfig>>,
}

impl AlertOrchestrator {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        pipeline: Arc<SnapshotPipeline>,
        devices: &[Arc<DeviceConfig>],
    ) -> Self {
        Self {
            dispatcher,
            pipeline,
            configs: devices
                .iter()
                .map(|d| (d.device_id.clone(), d.clone()))
                .collect(),
        }
    }

    /// Consume the transition stream until all monitors are gone
    pub async fn run(self: Arc<Self>, mut transitions: mpsc::Receiver<Transition>) {
        while let Some(transition) = transitions.recv().await {
            let orchestrator = Arc::clone(&self);
            tokio::spawn(async move {
                orchestrator.handle(transition).await;
            });
        }
        tracing::info!("transition stream closed, alert orchestrator stopping");
    }

    /// Route and deliver one committed transition
    ///
    /// Returns the handle of the sent notification, or `None` when the
    /// transition was suppressed or the send failed (either way no
    /// snapshot pipeline runs).
    pub async fn handle(&self, transition: Transition) -> Option<MessageHandle> {
        let config = match self.configs.get(&transition.device_id) {
            Some(config) => config,
            None => {
                tracing::error!(
                    device_id = %transition.device_id,
                    "transition for unconfigured device"
                );
                return None;
            }
        };

        let route = match channel_router::route(config, &transition) {
            Some(route) => route,
            None => {
                tracing::debug!(
                    device = %config.label,
                    new = ?transition.new,
                    "notification suppressed by config"
                );
                return None;
            }
        };

        let handle = self
            .dispatcher
            .send_text(&config.label, route.chat_id, &route.text, None)
            .await?;

        self.pipeline.trigger(Arc::clone(config), handle);
        Some(handle)
    }
}
