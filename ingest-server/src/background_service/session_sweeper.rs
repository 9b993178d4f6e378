use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use domain_ingest::service::IngestionService;
use tokio::time::{interval, MissedTickBehavior};
use tracing::Instrument;
use typed_builder::TypedBuilder;

use super::BackgroundService;

/// Periodically expires idle upload sessions.
#[derive(TypedBuilder)]
pub struct SessionSweeper {
    service: Arc<dyn IngestionService>,
    interval: Duration,
}

impl SessionSweeper {
    async fn sweep_once(&self) {
        if let Err(e) = self.service.sweep_expired(Utc::now()).await {
            tracing::error!("{}", e);
        }
    }
}

#[async_trait]
impl BackgroundService for SessionSweeper {
    async fn run(&self) {
        let mut interval = interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.sweep_once().instrument(tracing::trace_span!("session_sweeper")).await;
        }
    }
}
