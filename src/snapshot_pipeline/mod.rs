//! SnapshotPipeline - Chained Snapshot Retrieval
//!
//! ## Responsibilities
//!
//! - One independent run per configured source × capture delay
//! - Stage chain: Authenticate → ListCameras → MatchCamera → ResolveLink →
//!   Fetch → Deliver; direct-URL sources skip straight to Fetch
//! - Stage failures are terminal for their run only and are reported to the
//!   escalation chat with the stage name and the raw upstream error
//!
//! Runs never retry and never cancel each other; a hung external call is
//! bounded by the camera client's own timeouts.

use crate::camera_client::CameraDirectory;
use crate::device_config::{DeviceConfig, SnapshotKind};
use crate::error::Error;
use crate::notifier::{MessageHandle, NotificationDispatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Stage a run was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Authenticating,
    ListingCameras,
    MatchingCamera,
    ResolvingLink,
    FetchingImage,
    Delivering,
}

impl PipelineStage {
    /// Operator-facing headline for a failure in this stage
    pub fn headline(&self) -> &'static str {
        match self {
            PipelineStage::Authenticating => "unable to log in to camera service",
            PipelineStage::ListingCameras => "unable to fetch camera list",
            PipelineStage::MatchingCamera => "camera not found",
            PipelineStage::ResolvingLink => "unable to resolve snapshot link",
            PipelineStage::FetchingImage => "unable to fetch snapshot",
            PipelineStage::Delivering => "unable to deliver snapshot",
        }
    }
}

/// Terminal outcome of one run instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Delivered,
    Failed {
        stage: PipelineStage,
        error: String,
    },
}

/// Record of all run instances triggered by one transition
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub device_id: String,
    /// Message id of the triggering notification (reply anchor)
    pub reply_to: i64,
    pub outcomes: Vec<RunOutcome>,
}

/// Snapshot retrieval pipeline over a camera directory and a dispatcher
#[derive(Clone)]
pub struct SnapshotPipeline {
    directory: Arc<dyn CameraDirectory>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl SnapshotPipeline {
    pub fn new(
        directory: Arc<dyn CameraDirectory>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            directory,
            dispatcher,
        }
    }

    /// Fan out runs for a transition and return when all reached a terminal
    /// state. Completion order between runs is unspecified.
    pub async fn run_all(&self, config: Arc<DeviceConfig>, reply_to: MessageHandle) -> PipelineRun {
        let triggered_at = Instant::now();
        let mut set = JoinSet::new();

        for (source_index, source) in config.snapshots.iter().enumerate() {
            for &delay_ms in &source.delays_ms {
                let pipeline = self.clone();
                let config = Arc::clone(&config);
                set.spawn(async move {
                    pipeline
                        .run_one(&config, source_index, delay_ms, triggered_at, reply_to)
                        .await
                });
            }
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(
                        device = %config.label,
                        error = %e,
                        "pipeline run task panicked"
                    );
                }
            }
        }

        PipelineRun {
            device_id: config.device_id.clone(),
            reply_to: reply_to.message_id,
            outcomes,
        }
    }

    /// Fire-and-forget variant used by the alert path
    pub fn trigger(&self, config: Arc<DeviceConfig>, reply_to: MessageHandle) {
        if config.snapshots.is_empty() {
            return;
        }
        let pipeline = self.clone();
        tokio::spawn(async move {
            let run = pipeline.run_all(config, reply_to).await;
            tracing::debug!(
                device_id = %run.device_id,
                runs = run.outcomes.len(),
                delivered = run
                    .outcomes
                    .iter()
                    .filter(|o| **o == RunOutcome::Delivered)
                    .count(),
                "snapshot pipeline finished"
            );
        });
    }

    /// One source × delay run instance
    async fn run_one(
        &self,
        config: &DeviceConfig,
        source_index: usize,
        delay_ms: u64,
        triggered_at: Instant,
        reply_to: MessageHandle,
    ) -> RunOutcome {
        let outcome = self
            .execute(config, source_index, delay_ms, triggered_at, reply_to)
            .await;

        if let RunOutcome::Failed { stage, error } = &outcome {
            tracing::warn!(
                device = %config.label,
                source = source_index,
                delay_ms,
                stage = ?stage,
                error = %error,
                "snapshot run failed"
            );

            // Delivery failures are dispatch errors: logged only, never
            // re-reported through the same channel that just failed.
            if *stage != PipelineStage::Delivering {
                let threaded = config.escalation_chat_id == config.chat_id;
                self.dispatcher
                    .send_failure_report(
                        &config.label,
                        config.escalation_chat_id,
                        stage.headline(),
                        error,
                        threaded.then_some(reply_to.message_id),
                    )
                    .await;
            }
        }

        outcome
    }

    async fn execute(
        &self,
        config: &DeviceConfig,
        source_index: usize,
        delay_ms: u64,
        triggered_at: Instant,
        reply_to: MessageHandle,
    ) -> RunOutcome {
        let source = &config.snapshots[source_index];

        let url = match &source.kind {
            SnapshotKind::Direct { url } => url.clone(),
            SnapshotKind::Discovered { camera_id } => {
                let session = match self.directory.login().await {
                    Ok(session) => session,
                    Err(e) => {
                        return RunOutcome::Failed {
                            stage: PipelineStage::Authenticating,
                            error: e.to_string(),
                        }
                    }
                };

                let cameras = match self.directory.list_cameras(&session).await {
                    Ok(cameras) => cameras,
                    Err(e) => {
                        return RunOutcome::Failed {
                            stage: PipelineStage::ListingCameras,
                            error: e.to_string(),
                        }
                    }
                };

                let camera = match cameras.into_iter().find(|c| c.id == *camera_id) {
                    Some(camera) => camera,
                    None => {
                        return RunOutcome::Failed {
                            stage: PipelineStage::MatchingCamera,
                            error: Error::CameraNotFound(camera_id.clone()).to_string(),
                        }
                    }
                };

                match self
                    .directory
                    .resolve_snapshot_link(&session, &camera.stream_locator)
                    .await
                {
                    Ok(url) => url,
                    Err(e) => {
                        return RunOutcome::Failed {
                            stage: PipelineStage::ResolvingLink,
                            error: e.to_string(),
                        }
                    }
                }
            }
        };

        // Capture delay is measured from trigger time, not from the
        // previous stage's completion.
        tokio::time::sleep_until(triggered_at + Duration::from_millis(delay_ms)).await;

        let image = match self.directory.fetch_image(&url).await {
            Ok(image) => image,
            Err(e) => {
                return RunOutcome::Failed {
                    stage: PipelineStage::FetchingImage,
                    error: e.to_string(),
                }
            }
        };

        match self
            .dispatcher
            .send_photo(
                &config.label,
                config.chat_id,
                image,
                Some(reply_to.message_id),
            )
            .await
        {
            Some(_) => RunOutcome::Delivered,
            None => RunOutcome::Failed {
                stage: PipelineStage::Delivering,
                error: "photo send failed".to_string(),
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeDirectory;
    use super::*;
    use crate::camera_client::CameraInfo;
    use crate::device_config::SnapshotSourceConfig;
    use crate::notifier::testing::{RecordingMessenger, Sent};
    use std::sync::atomic::Ordering;

    fn config(snapshots: Vec<SnapshotSourceConfig>) -> Arc<DeviceConfig> {
        Arc::new(DeviceConfig {
            device_id: "gate-1".to_string(),
            label: "Gate".to_string(),
            chat_id: -100200,
            escalation_chat_id: -100300,
            debounce_ms: 2000,
            notify_on_high: true,
            notify_on_low: true,
            label_high: "opening".to_string(),
            label_low: "closing".to_string(),
            snapshots,
        })
    }

    fn direct(url: &str, delays_ms: Vec<u64>) -> SnapshotSourceConfig {
        SnapshotSourceConfig {
            kind: SnapshotKind::Direct {
                url: url.to_string(),
            },
            delays_ms,
        }
    }

    fn discovered(camera_id: &str) -> SnapshotSourceConfig {
        SnapshotSourceConfig {
            kind: SnapshotKind::Discovered {
                camera_id: camera_id.to_string(),
            },
            delays_ms: vec![0],
        }
    }

    fn pipeline(
        directory: Arc<FakeDirectory>,
        messenger: Arc<RecordingMessenger>,
    ) -> Arc<SnapshotPipeline> {
        Arc::new(SnapshotPipeline::new(
            directory,
            Arc::new(NotificationDispatcher::new(messenger)),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_run_per_source_and_delay() {
        // 2 sources, 3 delays total -> 3 independent runs
        let directory = Arc::new(FakeDirectory::default());
        let messenger = Arc::new(RecordingMessenger::new());
        let pipeline = pipeline(directory.clone(), messenger.clone());

        let cfg = config(vec![
            direct("http://cam-a/snap.jpg", vec![0, 3000]),
            direct("http://cam-b/snap.jpg", vec![1500]),
        ]);

        let run = pipeline
            .run_all(cfg, MessageHandle { message_id: 7 })
            .await;

        assert_eq!(run.outcomes.len(), 3);
        assert!(run.outcomes.iter().all(|o| *o == RunOutcome::Delivered));
        assert_eq!(directory.fetch_calls.load(Ordering::SeqCst), 3);

        // All photos silent, threaded to the triggering message
        let sent = messenger.sent.lock().await;
        assert_eq!(sent.len(), 3);
        for s in sent.iter() {
            match s {
                Sent::Photo {
                    chat_id,
                    reply_to,
                    silent,
                    ..
                } => {
                    assert_eq!(*chat_id, -100200);
                    assert_eq!(*reply_to, Some(7));
                    assert!(*silent);
                }
                other => panic!("unexpected: {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_short_circuits() {
        let directory = Arc::new(FakeDirectory {
            fail_login: true,
            ..Default::default()
        });
        let messenger = Arc::new(RecordingMessenger::new());
        let pipeline = pipeline(directory.clone(), messenger.clone());

        let run = pipeline
            .run_all(config(vec![discovered("42")]), MessageHandle { message_id: 7 })
            .await;

        assert_eq!(run.outcomes.len(), 1);
        assert!(matches!(
            &run.outcomes[0],
            RunOutcome::Failed { stage: PipelineStage::Authenticating, .. }
        ));
        assert_eq!(directory.list_calls.load(Ordering::SeqCst), 0);
        assert_eq!(directory.resolve_calls.load(Ordering::SeqCst), 0);
        assert_eq!(directory.fetch_calls.load(Ordering::SeqCst), 0);

        // Failure report went to escalation, unthreaded (chats differ)
        let sent = messenger.sent.lock().await;
        match &sent[0] {
            Sent::Text {
                chat_id,
                text,
                reply_to,
            } => {
                assert_eq!(*chat_id, -100300);
                assert!(text.contains("unable to log in to camera service"));
                assert_eq!(*reply_to, None);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_camera_is_terminal() {
        // Scenario C
        let directory = Arc::new(FakeDirectory::with_cameras(vec![CameraInfo {
            id: "7".to_string(),
            stream_locator: "loc-7".to_string(),
        }]));
        let messenger = Arc::new(RecordingMessenger::new());
        let pipeline = pipeline(directory.clone(), messenger.clone());

        let run = pipeline
            .run_all(config(vec![discovered("42")]), MessageHandle { message_id: 7 })
            .await;

        match &run.outcomes[0] {
            RunOutcome::Failed { stage, error } => {
                assert_eq!(*stage, PipelineStage::MatchingCamera);
                assert_eq!(error, "Camera not found: 42");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(directory.resolve_calls.load(Ordering::SeqCst), 0);
        assert_eq!(directory.fetch_calls.load(Ordering::SeqCst), 0);

        let sent = messenger.sent.lock().await;
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Text { chat_id, text, .. } => {
                assert_eq!(*chat_id, -100300);
                assert!(text.contains("camera not found"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_does_not_block_others() {
        let directory = Arc::new(FakeDirectory {
            cameras: vec![CameraInfo {
                id: "42".to_string(),
                stream_locator: "loc-42".to_string(),
            }],
            fail_login: true,
            ..Default::default()
        });
        let messenger = Arc::new(RecordingMessenger::new());
        let pipeline = pipeline(directory.clone(), messenger.clone());

        // Direct source succeeds even while the discovered one fails login
        let run = pipeline
            .run_all(
                config(vec![direct("http://cam-a/snap.jpg", vec![0]), discovered("42")]),
                MessageHandle { message_id: 7 },
            )
            .await;

        assert_eq!(run.outcomes.len(), 2);
        assert!(run.outcomes.contains(&RunOutcome::Delivered));
        assert!(run
            .outcomes
            .iter()
            .any(|o| matches!(o, RunOutcome::Failed { stage: PipelineStage::Authenticating, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovered_source_full_chain() {
        let directory = Arc::new(FakeDirectory::with_cameras(vec![CameraInfo {
            id: "42".to_string(),
            stream_locator: "loc-42".to_string(),
        }]));
        let messenger = Arc::new(RecordingMessenger::new());
        let pipeline = pipeline(directory.clone(), messenger.clone());

        let run = pipeline
            .run_all(config(vec![discovered("42")]), MessageHandle { message_id: 7 })
            .await;

        assert_eq!(run.outcomes, vec![RunOutcome::Delivered]);
        assert_eq!(directory.login_calls.load(Ordering::SeqCst), 1);
        assert_eq!(directory.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(directory.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(directory.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_report_threads_when_chats_coincide() {
        let directory = Arc::new(FakeDirectory {
            fail_fetch: true,
            ..Default::default()
        });
        let messenger = Arc::new(RecordingMessenger::new());
        let pipeline = pipeline(directory, messenger.clone());

        let mut cfg = (*config(vec![direct("http://cam-a/snap.jpg", vec![0])])).clone();
        cfg.escalation_chat_id = cfg.chat_id;
        let run = pipeline
            .run_all(Arc::new(cfg), MessageHandle { message_id: 7 })
            .await;

        assert!(matches!(
            &run.outcomes[0],
            RunOutcome::Failed { stage: PipelineStage::FetchingImage, .. }
        ));

        let sent = messenger.sent.lock().await;
        match &sent[0] {
            Sent::Text { reply_to, text, .. } => {
                assert_eq!(*reply_to, Some(7));
                assert!(text.contains("unable to fetch snapshot"));
                assert!(text.contains("502 upstream"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
