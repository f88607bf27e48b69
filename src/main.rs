//! doorwatch - Door Sensor Alert Service
//!
//! Main entry point: wires the monitors, the Telegram adapter, the snapshot
//! pipeline and the push ingress together.

use doorwatch::alert_orchestrator::AlertOrchestrator;
use doorwatch::camera_client::HydraClient;
use doorwatch::device_config;
use doorwatch::device_monitor::{self, Transition};
use doorwatch::device_registry::DeviceRegistry;
use doorwatch::notifier::NotificationDispatcher;
use doorwatch::signal_source::{PushSignalSource, SignalSource};
use doorwatch::snapshot_pipeline::SnapshotPipeline;
use doorwatch::state::{AppConfig, AppState};
use doorwatch::telegram::{CommandListener, TelegramClient};
use doorwatch::web_api;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doorwatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting doorwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    if config.telegram_token.is_empty() {
        anyhow::bail!("TELEGRAM_TOKEN is not set");
    }
    if config.dev_chat_id == 0 {
        anyhow::bail!("DEV_CHAT_ID is not set");
    }
    tracing::info!(
        devices_file = %config.devices_file.display(),
        camera_base_url = %config.camera_base_url,
        "Configuration loaded"
    );

    let devices: Vec<Arc<_>> = device_config::load_devices(&config.devices_file)?
        .into_iter()
        .map(Arc::new)
        .collect();
    tracing::info!(devices = devices.len(), "Device descriptors loaded");

    // Messaging + camera collaborators
    let telegram = Arc::new(TelegramClient::new(&config.telegram_token)?);
    let dispatcher = Arc::new(NotificationDispatcher::new(telegram.clone()));
    let directory = Arc::new(HydraClient::new(
        config.camera_base_url.clone(),
        config.camera_login_id.clone(),
    )?);
    let pipeline = Arc::new(SnapshotPipeline::new(directory, dispatcher.clone()));

    // Transition stream from all monitors into the alert flow
    let (transitions_tx, transitions_rx) = mpsc::channel::<Transition>(64);
    let orchestrator = Arc::new(AlertOrchestrator::new(
        dispatcher.clone(),
        pipeline.clone(),
        &devices,
    ));
    tokio::spawn(orchestrator.run(transitions_rx));

    // One monitor task per device; push ingress feeds the shared source
    let push_source = Arc::new(PushSignalSource::new());
    let handles = devices
        .iter()
        .map(|device| {
            device_monitor::spawn(
                device.clone(),
                push_source.clone() as Arc<dyn SignalSource>,
                transitions_tx.clone(),
            )
        })
        .collect();
    drop(transitions_tx);

    let registry = Arc::new(DeviceRegistry::new(handles));
    tracing::info!(monitors = registry.len(), "Device monitors started");

    // Inbound command loop (/status, /getId)
    let listener = CommandListener::new(
        telegram,
        registry.clone(),
        dispatcher.clone(),
        pipeline,
        config.dev_chat_id,
    );
    tokio::spawn(listener.run());

    // Startup announcement to the escalation chat
    dispatcher
        .send_text("System", config.dev_chat_id, "monitoring started", None)
        .await;

    // Push ingress server
    let state = AppState {
        config: config.clone(),
        registry,
        push_source,
        dispatcher,
    };
    let app = web_api::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
