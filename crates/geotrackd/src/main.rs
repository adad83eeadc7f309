//! geotrackd - the location tracking background service
//!
//! This is the main entry point for the geotrackd service.
//! It wires together all the components:
//! - Configuration loading (config file plus persisted tracking settings)
//! - Store initialization
//! - Tracking session
//! - Host adapters (gpsd, network geolocation, geocoder, timer, indicator)
//! - IPC server

use anyhow::{bail, Context, Result};
use clap::Parser;
use geotrack_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Response,
    ResponsePayload,
};
use geotrack_config::{load_config, validate_tracking, Settings, TrackingConfigStore};
use geotrack_core::{
    CoreEvent, GeocodeResolver, SessionHost, SessionOutcome, StartError, TrackingCommand,
    TrackingSession,
};
use geotrack_host_api::{AlarmPayload, AlarmScheduler, PositionSource};
use geotrack_host_linux::{
    ConsentGate, GpsdSource, NetworkSource, NominatimGeocoder, StatusFileIndicator, TimerAlarm,
};
use geotrack_ipc::{IpcServer, ServerMessage};
use geotrack_store::{LocationStore, SessionSnapshot, SqliteStore, StoreError};
use geotrack_util::{default_config_path, runtime_dir, ClientId, MemberId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// geotrackd - continuous location tracking service
#[derive(Parser, Debug)]
#[command(name = "geotrackd")]
#[command(about = "Continuous location tracking service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/geotrack/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set GEOTRACK_SOCKET env var)
    #[arg(short, long, env = "GEOTRACK_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set GEOTRACK_DATA_DIR env var)
    #[arg(short, long, env = "GEOTRACK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    session: TrackingSession,
    ipc: Arc<IpcServer>,
    store: Arc<dyn LocationStore>,
    consent: Arc<ConsentGate>,
    tracking_file: TrackingConfigStore,
    alarm_rx: mpsc::UnboundedReceiver<AlarmPayload>,
    default_member: Option<MemberId>,
}

/// Shared handles used while serving requests
struct Shared {
    session: Arc<Mutex<TrackingSession>>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn LocationStore>,
    consent: Arc<ConsentGate>,
    tracking_file: TrackingConfigStore,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let settings = if args.config.exists() {
            let settings = load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?;
            info!(config_path = %args.config.display(), "Configuration loaded");
            settings
        } else {
            info!(config_path = %args.config.display(), "No config file; using defaults");
            Settings::default()
        };

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| settings.daemon.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.daemon.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        // User-edited tracking settings win over the config file
        let tracking_file = TrackingConfigStore::new(&data_dir);
        let mut tracking = tracking_file
            .load_or(settings.tracking.clone())
            .with_context(|| format!("Failed to read {:?}", tracking_file.path()))?;
        let errors = validate_tracking(&tracking);
        if !errors.is_empty() {
            warn!(
                path = %tracking_file.path().display(),
                errors = ?errors,
                "Ignoring invalid saved tracking settings"
            );
            tracking = settings.tracking.clone();
        }

        let db_path = data_dir.join("geotrack.db");
        let store: Arc<dyn LocationStore> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        info!(db_path = %db_path.display(), "Store initialized");

        let sources = build_sources(&settings)?;

        let resolver = if settings.geocode.enabled {
            let geocoder = NominatimGeocoder::new(
                &settings.geocode.url,
                &settings.geocode.user_agent,
                settings.geocode.timeout,
            )
            .context("Failed to create geocoder")?;
            GeocodeResolver::new(Arc::new(geocoder), settings.geocode.timeout)
        } else {
            info!("Reverse geocoding disabled");
            GeocodeResolver::disabled()
        };

        let consent = Arc::new(ConsentGate::new(tracking.enabled));

        let alarm = Arc::new(TimerAlarm::new());
        let alarm_rx = alarm
            .take_receiver()
            .context("Restart timer receiver already taken")?;

        let indicator_dir = socket_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(runtime_dir);
        let foreground = Arc::new(StatusFileIndicator::new(indicator_dir));

        let session = TrackingSession::new(
            tracking,
            SessionHost {
                sources,
                permission: consent.clone(),
                resolver,
                alarm,
                foreground,
                foreground_title: settings.foreground.title.clone(),
                foreground_text: settings.foreground.text.clone(),
                store: store.clone(),
            },
        );

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;
        info!(socket_path = %socket_path.display(), "IPC server started");

        Ok(Self {
            session,
            ipc: Arc::new(ipc),
            store,
            consent,
            tracking_file,
            alarm_rx,
            default_member: settings.default_member,
        })
    }

    async fn run(self) -> Result<()> {
        let Service {
            mut session,
            ipc,
            store,
            consent,
            tracking_file,
            mut alarm_rx,
            default_member,
        } = self;

        let mut core_events = session.subscribe();
        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let stale = session.reconcile();
        auto_start(&mut session, default_member, stale).await;

        let ctx = Shared {
            session: Arc::new(Mutex::new(session)),
            ipc: ipc.clone(),
            store,
            consent,
            tracking_file,
        };

        let ipc_accept = ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                // Automatic restart wake
                Some(payload) = alarm_rx.recv() => {
                    let outcome = ctx.session.lock().await.on_restart_fired(&payload).await;
                    debug!(outcome = ?outcome, "Restart wake handled");
                }

                event = core_events.recv() => match event {
                    Ok(event) => ctx.ipc.broadcast_event(Event::new(event_payload(event))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Core event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Core event stream closed");
                        break;
                    }
                },

                Some(msg) = ipc_messages.recv() => {
                    handle_ipc_message(&ctx, msg).await;
                }
            }
        }

        info!("Shutting down geotrackd");

        ctx.session.lock().await.shutdown();
        while let Ok(event) = core_events.try_recv() {
            ctx.ipc.broadcast_event(Event::new(event_payload(event)));
        }
        ctx.ipc.broadcast_event(Event::new(EventPayload::Shutdown));
        ctx.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }
}

fn build_sources(settings: &Settings) -> Result<Vec<Arc<dyn PositionSource>>> {
    let mut sources: Vec<Arc<dyn PositionSource>> = Vec::new();

    if settings.gpsd.enabled {
        info!(host = %settings.gpsd.host, port = settings.gpsd.port, "gpsd source enabled");
        sources.push(Arc::new(GpsdSource::new(
            &settings.gpsd.host,
            settings.gpsd.port,
        )));
    }

    if settings.network.enabled
        && let Some(url) = &settings.network.url
    {
        let source = NetworkSource::new(url.clone(), settings.network.poll_interval)
            .context("Failed to create network position source")?;
        info!(url = %url, "Network position source enabled");
        sources.push(Arc::new(source));
    }

    if sources.is_empty() {
        bail!("No position sources enabled; enable [sources.gpsd] or [sources.network]");
    }
    if sources.len() < 2 {
        warn!(
            sources = sources.len(),
            "Running with a single position source; the other is disabled in config"
        );
    }

    Ok(sources)
}

/// Resume tracking on daemon start when enabled.
///
/// The configured member wins; otherwise the member of a session that was
/// still recording when the previous process died is resumed.
async fn auto_start(
    session: &mut TrackingSession,
    default_member: Option<MemberId>,
    stale: Option<SessionSnapshot>,
) {
    if !session.config().auto_start_enabled {
        return;
    }

    let (member_id, interval_ms) = match (default_member, stale) {
        (Some(member_id), _) => (member_id, session.config().interval_ms()),
        (None, Some(stale)) => (stale.member_id, stale.interval_ms),
        (None, None) => {
            debug!("Auto-start enabled but no member to track");
            return;
        }
    };

    info!(member_id = %member_id, interval_ms, "Auto-starting tracking");
    let command = TrackingCommand::StartTracking {
        member_id,
        interval_ms,
    };
    if let Err(e) = session.handle(command).await {
        warn!(error = %e, "Auto-start failed");
    }
}

fn event_payload(event: CoreEvent) -> EventPayload {
    match event {
        CoreEvent::StatusChanged {
            is_tracking,
            member_id,
            interval_ms,
        } => EventPayload::StatusChanged {
            is_tracking,
            member_id,
            interval_ms,
        },
        CoreEvent::RecordWritten {
            record_id,
            member_id,
            timestamp_ms,
            source,
        } => EventPayload::RecordWritten {
            record_id,
            member_id,
            timestamp_ms,
            source,
        },
        CoreEvent::RestartScheduled {
            member_id,
            fire_at_ms,
        } => EventPayload::RestartScheduled {
            member_id,
            fire_at_ms,
        },
        CoreEvent::RestartCanceled => EventPayload::RestartCanceled,
    }
}

async fn handle_ipc_message(ctx: &Shared, msg: ServerMessage) {
    match msg {
        ServerMessage::Request { client_id, request } => {
            let response =
                handle_command(ctx, &client_id, request.request_id, request.command).await;
            if let Err(e) = ctx.ipc.send_response(&client_id, response).await {
                debug!(client_id = %client_id, error = %e, "Failed to deliver response");
            }
        }

        ServerMessage::ClientConnected { client_id, info } => {
            info!(
                client_id = %client_id,
                role = ?info.role,
                uid = ?info.uid,
                "Client connected"
            );
        }

        ServerMessage::ClientDisconnected { client_id } => {
            debug!(client_id = %client_id, "Client disconnected");
        }
    }
}

async fn handle_command(
    ctx: &Shared,
    client_id: &ClientId,
    request_id: u64,
    command: Command,
) -> Response {
    let role = ctx
        .ipc
        .get_client_info(client_id)
        .await
        .map(|info| info.role)
        .unwrap_or(ClientRole::Observer);

    let denied = |what: &str| {
        Response::error(
            request_id,
            ErrorInfo::new(ErrorCode::PermissionDenied, format!("Owner role required to {what}")),
        )
    };

    match command {
        Command::GetStatus => {
            let view = ctx.session.lock().await.view();
            Response::success(request_id, ResponsePayload::Status(view))
        }

        Command::StartTracking {
            member_id,
            interval_ms,
        } => {
            if !role.can_control_tracking() {
                return denied("start tracking");
            }

            let mut session = ctx.session.lock().await;
            let interval_ms = interval_ms.unwrap_or_else(|| session.config().interval_ms());
            let command = TrackingCommand::StartTracking {
                member_id,
                interval_ms,
            };
            match session.handle(command).await {
                Ok(outcome) => Response::success(request_id, outcome_payload(outcome)),
                Err(StartError::Precondition(e)) => Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::PreconditionFailed, e.to_string()),
                ),
                Err(StartError::Host(e)) => Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::HostError, e.to_string()),
                ),
            }
        }

        Command::StopTracking { auto_resume } => {
            if !role.can_control_tracking() {
                return denied("stop tracking");
            }

            let mut session = ctx.session.lock().await;
            match session
                .handle(TrackingCommand::StopTracking { auto_resume })
                .await
            {
                Ok(outcome) => Response::success(request_id, outcome_payload(outcome)),
                Err(e) => Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::InternalError, e.to_string()),
                ),
            }
        }

        Command::QueryRecords {
            member_id,
            start_ms,
            end_ms,
        } => {
            if start_ms > end_ms {
                return Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::InvalidRequest, "start_ms is after end_ms"),
                );
            }
            match ctx.store.query_by_range(&member_id, start_ms, end_ms) {
                Ok(records) => Response::success(request_id, ResponsePayload::Records(records)),
                Err(e) => store_error(request_id, e),
            }
        }

        Command::CountToday { member_id } => match ctx.store.count_today(&member_id) {
            Ok(count) => Response::success(request_id, ResponsePayload::Count { count }),
            Err(e) => store_error(request_id, e),
        },

        Command::LastRecordTime { member_id } => match ctx.store.last_record_time(&member_id) {
            Ok(timestamp_ms) => {
                Response::success(request_id, ResponsePayload::LastRecordTime { timestamp_ms })
            }
            Err(e) => store_error(request_id, e),
        },

        Command::DeleteRecord { record_id } => {
            if !role.can_edit_records() {
                return denied("delete records");
            }
            match ctx.store.delete_record(&record_id) {
                Ok(()) => {
                    info!(record_id = %record_id, "Record deleted");
                    Response::success(request_id, ResponsePayload::Deleted)
                }
                Err(e) => store_error(request_id, e),
            }
        }

        Command::GetConfig => {
            let config = ctx.session.lock().await.config().clone();
            Response::success(request_id, ResponsePayload::Config(config))
        }

        Command::UpdateConfig { config } => {
            if !role.can_update_config() {
                return denied("change settings");
            }

            let errors = validate_tracking(&config);
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::InvalidRequest, message),
                );
            }

            let mut session = ctx.session.lock().await;
            if let Err(e) = session.update_config(config.clone()) {
                return Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::SessionActive, e.to_string()),
                );
            }
            ctx.consent.set_granted(config.enabled);

            if let Err(e) = ctx.tracking_file.save(&config) {
                warn!(error = %e, "Tracking settings applied but not saved");
            }
            Response::success(request_id, ResponsePayload::ConfigUpdated)
        }

        Command::SubscribeEvents => Response::success(
            request_id,
            ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            },
        ),

        Command::UnsubscribeEvents => Response::success(request_id, ResponsePayload::Unsubscribed),

        Command::GetHealth => {
            let session = ctx.session.lock().await;
            Response::success(
                request_id,
                ResponsePayload::Health(HealthStatus {
                    live: true,
                    permission_granted: session.permission_granted(),
                    store_ok: ctx.store.is_healthy(),
                    status: session.state().status,
                }),
            )
        }

        Command::Ping => Response::success(request_id, ResponsePayload::Pong),
    }
}

fn outcome_payload(outcome: SessionOutcome) -> ResponsePayload {
    match outcome {
        SessionOutcome::Started {
            member_id,
            interval_ms,
        } => ResponsePayload::Started {
            member_id,
            interval_ms,
        },
        SessionOutcome::AlreadyRecording { member_id } => {
            ResponsePayload::AlreadyRecording { member_id }
        }
        SessionOutcome::Stopped { restart } => ResponsePayload::Stopped {
            restart_at_ms: restart.map(|r| r.fire_at_ms),
        },
        SessionOutcome::NotRecording => ResponsePayload::NotRecording,
    }
}

fn store_error(request_id: u64, error: StoreError) -> Response {
    let code = match error {
        StoreError::NotFound(_) => ErrorCode::NotFound,
        _ => ErrorCode::StoreError,
    };
    Response::error(request_id, ErrorInfo::new(code, error.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "geotrackd starting");

    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_sources_requires_a_source() {
        let mut settings = Settings::default();
        settings.gpsd.enabled = false;
        settings.network.enabled = false;

        let err = build_sources(&settings).err().unwrap();
        assert!(err.to_string().contains("No position sources enabled"));
    }
}
