/// Orchestrator module - wires storage, probe, alerting and the scheduler
///
/// The orchestrator owns the lifecycle of the monitoring core:
/// - Opens and migrates the database
/// - Builds the probe and alert senders from configuration
/// - Runs the scheduler loop until shutdown, or a single tick on demand


use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::database::{self, Database};
use crate::monitoring::{HttpProbe, Probe, SchedulerLoop, TickSummary, TransitionEngine};
use crate::notifications::AlertDispatcher;
use crate::notifications::senders::{HttpMailRelay, HttpWebhookSender, MailSender};

/// Main orchestrator for the beacon service
pub struct Orchestrator {
    database: Arc<dyn Database>,
    scheduler: Arc<SchedulerLoop>,
}

impl Orchestrator {
    /// Create and run until `shutdown` fires
    pub async fn start(config: Config, shutdown: watch::Receiver<()>) -> Result<()> {
        let orchestrator = Self::new(&config).await?;
        orchestrator.run(shutdown).await;
        Ok(())
    }

    /// Build every component from configuration
    pub async fn new(config: &Config) -> Result<Self> {
        info!(path = %config.database.path, "Opening database...");
        let database: Arc<dyn Database> =
            Arc::new(database::open(&config.database.path, config.database.max_connections).await?);

        let probe: Arc<dyn Probe> = Arc::new(HttpProbe::from_config(config)?);
        let dispatcher = Arc::new(build_dispatcher(config)?);

        Ok(Self::with_components(config, database, probe, dispatcher, Arc::new(SystemClock)))
    }

    /// Assemble from already-built parts
    pub fn with_components(
        config: &Config,
        database: Arc<dyn Database>,
        probe: Arc<dyn Probe>,
        dispatcher: Arc<AlertDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = Arc::new(TransitionEngine::new(database.clone(), probe, dispatcher));
        let scheduler = Arc::new(SchedulerLoop::new(
            database.clone(),
            engine,
            clock,
            config.tick_interval(),
            config.scheduler.max_concurrent_checks,
        ));

        Self { database, scheduler }
    }

    pub fn database(&self) -> Arc<dyn Database> {
        self.database.clone()
    }

    /// Run the scheduler loop
    pub async fn run(&self, shutdown: watch::Receiver<()>) {
        info!("Starting beacon orchestrator...");
        self.scheduler.run(shutdown).await;
    }

    /// Run exactly one tick
    pub async fn tick_once(&self) -> Result<TickSummary> {
        self.scheduler.run_tick().await
    }
}

/// Alert dispatcher backed by the HTTP webhook sender and, when configured,
/// the HTTP mail relay
pub fn build_dispatcher(config: &Config) -> Result<AlertDispatcher> {
    let client = reqwest::Client::builder()
        .user_agent(config.probe.user_agent.as_str())
        .connect_timeout(config.webhook_timeout().min(config.mail_timeout()))
        .build()?;

    let mailer = config.alerts.mail.as_ref().map(|mail| {
        Arc::new(HttpMailRelay::new(client.clone(), mail, config.mail_timeout())) as Arc<dyn MailSender>
    });
    if mailer.is_none() {
        info!("No mail relay configured - email alerts are disabled");
    }

    Ok(AlertDispatcher::new(
        mailer,
        Arc::new(HttpWebhookSender::new(client)),
        config.webhook_timeout(),
    )
    .with_mail_timeout(config.mail_timeout()))
}
