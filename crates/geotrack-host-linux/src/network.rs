//! Network geolocation: the approximate position source
//!
//! Polls an HTTP endpoint answering with
//! `{"latitude": .., "longitude": .., "accuracy": ..}` (a local
//! geolocation proxy or similar). `altitude` and `timestamp_ms` are
//! optional; without a timestamp the fetch time is used.

use async_trait::async_trait;
use geotrack_api::SourceId;
use geotrack_host_api::{HostError, HostResult, PositionSource, RawFix};
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct NetworkPosition {
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    altitude: Option<f64>,
    timestamp_ms: Option<i64>,
}

/// Parse an endpoint response body
pub fn parse_network_position(body: &str, fetched_at_ms: i64) -> Option<RawFix> {
    let position: NetworkPosition = serde_json::from_str(body).ok()?;
    Some(RawFix {
        latitude: position.latitude,
        longitude: position.longitude,
        altitude: position.altitude,
        accuracy: position.accuracy.map(|a| a as f32),
        time_ms: position.timestamp_ms.unwrap_or(fetched_at_ms),
    })
}

pub struct NetworkSource {
    client: Client,
    url: String,
    poll_interval: Duration,
    last_fix: Arc<Mutex<Option<RawFix>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkSource {
    pub fn new(url: impl Into<String>, poll_interval: Duration) -> HostResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HostError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            poll_interval,
            last_fix: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        })
    }

    fn stop_task(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            debug!(url = %self.url, "Network polling stopped");
        }
    }
}

impl Drop for NetworkSource {
    fn drop(&mut self) {
        self.stop_task();
    }
}

#[async_trait]
impl PositionSource for NetworkSource {
    fn source_id(&self) -> SourceId {
        SourceId::Secondary
    }

    fn subscribe(&self, min_interval: Duration) -> HostResult<mpsc::UnboundedReceiver<RawFix>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HostError::SubscribeFailed(format!("no async runtime: {e}")))?;

        self.stop_task();

        let period = self.poll_interval.max(min_interval).max(Duration::from_secs(1));
        let (tx, rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(poll_loop(
            self.client.clone(),
            self.url.clone(),
            period,
            tx,
            self.last_fix.clone(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);

        info!(url = %self.url, period_secs = period.as_secs(), "Network polling started");
        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.stop_task();
    }

    async fn last_known(&self) -> HostResult<Option<RawFix>> {
        let cached = self
            .last_fix
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if cached.is_some() {
            return Ok(cached);
        }

        let fix = fetch(&self.client, &self.url).await?;
        if let Some(fix) = &fix {
            *self.last_fix.lock().unwrap_or_else(PoisonError::into_inner) = Some(fix.clone());
        }
        Ok(fix)
    }
}

async fn poll_loop(
    client: Client,
    url: String,
    period: Duration,
    tx: mpsc::UnboundedSender<RawFix>,
    last_fix: Arc<Mutex<Option<RawFix>>>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        match fetch(&client, &url).await {
            Ok(Some(fix)) => {
                *last_fix.lock().unwrap_or_else(PoisonError::into_inner) = Some(fix.clone());
                if tx.send(fix).is_err() {
                    break;
                }
            }
            Ok(None) => debug!(url = %url, "Network position response had no position"),
            Err(e) => warn!(url = %url, error = %e, "Network position request failed"),
        }
    }
}

async fn fetch(client: &Client, url: &str) -> HostResult<Option<RawFix>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| HostError::SourceUnavailable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(HostError::SourceUnavailable(format!("HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| HostError::SourceUnavailable(e.to_string()))?;

    Ok(parse_network_position(&body, geotrack_util::now_ms()))
}
