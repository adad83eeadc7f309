//! gpsd client: the precise position source
//!
//! Speaks the gpsd JSON protocol over TCP. A `?WATCH` request turns on
//! streaming; every `TPV` report with a 2D or 3D fix becomes a [`RawFix`].
//! The connection is re-established with backoff while subscribed.

use async_trait::async_trait;
use chrono::DateTime;
use geotrack_api::SourceId;
use geotrack_host_api::{HostError, HostResult, PositionSource, RawFix};
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true};\n";
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const LAST_KNOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct GpsdReport {
    class: String,
    #[serde(default)]
    mode: u8,
    time: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(rename = "altHAE")]
    alt_hae: Option<f64>,
    alt: Option<f64>,
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
}

/// Parse one gpsd line. Only TPV reports with at least a 2D fix qualify.
pub fn parse_tpv(line: &str) -> Option<RawFix> {
    let report: GpsdReport = serde_json::from_str(line).ok()?;
    if report.class != "TPV" || report.mode < 2 {
        return None;
    }

    let time_ms = report
        .time
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.timestamp_millis())
        .unwrap_or(0);

    let accuracy = report.eph.or_else(|| match (report.epx, report.epy) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    });

    Some(RawFix {
        latitude: report.lat?,
        longitude: report.lon?,
        altitude: report.alt_hae.or(report.alt),
        accuracy: accuracy.map(|a| a as f32),
        time_ms,
    })
}

pub struct GpsdSource {
    addr: String,
    last_fix: Arc<Mutex<Option<RawFix>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GpsdSource {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            last_fix: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        }
    }

    fn stop_task(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            debug!(addr = %self.addr, "gpsd watch stopped");
        }
    }
}

impl Drop for GpsdSource {
    fn drop(&mut self) {
        self.stop_task();
    }
}

#[async_trait]
impl PositionSource for GpsdSource {
    fn source_id(&self) -> SourceId {
        SourceId::Primary
    }

    fn subscribe(&self, _min_interval: Duration) -> HostResult<mpsc::UnboundedReceiver<RawFix>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HostError::SubscribeFailed(format!("no async runtime: {e}")))?;

        self.stop_task();

        let (tx, rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(watch_loop(self.addr.clone(), tx, self.last_fix.clone()));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);

        info!(addr = %self.addr, "gpsd watch started");
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

        match tokio::time::timeout(LAST_KNOWN_TIMEOUT, first_fix(&self.addr)).await {
            Ok(Ok(fix)) => {
                if let Some(fix) = &fix {
                    *self.last_fix.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(fix.clone());
                }
                Ok(fix)
            }
            Ok(Err(e)) => Err(HostError::SourceUnavailable(format!(
                "gpsd at {}: {}",
                self.addr, e
            ))),
            Err(_) => Ok(None),
        }
    }
}

async fn watch_loop(
    addr: String,
    tx: mpsc::UnboundedSender<RawFix>,
    last_fix: Arc<Mutex<Option<RawFix>>>,
) {
    let mut backoff = Duration::from_secs(1);

    loop {
        match stream_fixes(&addr, &tx, &last_fix).await {
            Ok(true) => backoff = Duration::from_secs(1),
            Ok(false) => debug!(addr = %addr, "gpsd closed the connection"),
            Err(e) => warn!(addr = %addr, error = %e, "gpsd connection failed"),
        }

        if tx.is_closed() {
            break;
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Stream fixes until the connection ends. Returns whether any fix arrived.
async fn stream_fixes(
    addr: &str,
    tx: &mpsc::UnboundedSender<RawFix>,
    last_fix: &Mutex<Option<RawFix>>,
) -> std::io::Result<bool> {
    let stream = TcpStream::connect(addr).await?;
    let (read, mut write) = stream.into_split();
    write.write_all(WATCH_COMMAND.as_bytes()).await?;

    let mut lines = BufReader::new(read).lines();
    let mut delivered = false;
    while let Some(line) = lines.next_line().await? {
        let Some(fix) = parse_tpv(&line) else {
            continue;
        };
        *last_fix.lock().unwrap_or_else(PoisonError::into_inner) = Some(fix.clone());
        if tx.send(fix).is_err() {
            break;
        }
        delivered = true;
    }

    Ok(delivered)
}

async fn first_fix(addr: &str) -> std::io::Result<Option<RawFix>> {
    let stream = TcpStream::connect(addr).await?;
    let (read, mut write) = stream.into_split();
    write.write_all(WATCH_COMMAND.as_bytes()).await?;

    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(fix) = parse_tpv(&line) {
            return Ok(Some(fix));
        }
    }
    Ok(None)
}
