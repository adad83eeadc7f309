//! geotrackctl - command line client for geotrackd

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geotrack_api::{
    Command, EventPayload, ResponsePayload, ResponseResult, TrackingConfig, TrackingStatus,
};
use geotrack_ipc::IpcClient;
use geotrack_util::{default_socket_path, format_timestamp_ms, MemberId, RecordId};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// geotrackctl - control and inspect the location tracking service
#[derive(Parser, Debug)]
#[command(name = "geotrackctl")]
#[command(about = "Control and inspect geotrackd", long_about = None)]
struct Args {
    /// Socket path (or set GEOTRACK_SOCKET env var)
    #[arg(short, long, env = "GEOTRACK_SOCKET")]
    socket: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Print raw JSON payloads
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show tracking status
    Status,

    /// Start tracking a member
    Start {
        member_id: String,
        /// Sampling interval in seconds (default: configured interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Stop tracking
    Stop {
        /// Restart automatically after the configured delay
        #[arg(long)]
        resume: bool,
    },

    /// List a member's records
    Records {
        member_id: String,
        /// Range start, epoch milliseconds (default: 24 hours ago)
        #[arg(long)]
        from: Option<i64>,
        /// Range end, epoch milliseconds (default: now)
        #[arg(long)]
        to: Option<i64>,
    },

    /// Number of records written today
    Count { member_id: String },

    /// Time of the newest record
    Last { member_id: String },

    /// Delete a record
    Delete { record_id: String },

    /// Show or change tracking settings
    Config {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        interval: Option<u64>,
        #[arg(long)]
        restart_delay: Option<u64>,
        #[arg(long)]
        auto_start: Option<bool>,
    },

    /// Service health
    Health,

    /// Print events as they arrive
    Watch,
}

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let socket_path = args.socket.clone().unwrap_or_else(default_socket_path);
    let mut client = IpcClient::connect(&socket_path)
        .await
        .with_context(|| format!("Failed to connect to geotrackd at {:?}", socket_path))?;

    let command = match args.command {
        Cmd::Watch => return watch(client).await,
        Cmd::Config {
            enabled,
            interval,
            restart_delay,
            auto_start,
        } => {
            if enabled.is_none()
                && interval.is_none()
                && restart_delay.is_none()
                && auto_start.is_none()
            {
                Command::GetConfig
            } else {
                let current = match request(&mut client, Command::GetConfig).await? {
                    ResponsePayload::Config(config) => config,
                    other => bail!("Unexpected response: {:?}", other),
                };
                Command::UpdateConfig {
                    config: TrackingConfig {
                        enabled: enabled.unwrap_or(current.enabled),
                        interval_seconds: interval.unwrap_or(current.interval_seconds),
                        auto_restart_delay_seconds: restart_delay
                            .unwrap_or(current.auto_restart_delay_seconds),
                        auto_start_enabled: auto_start.unwrap_or(current.auto_start_enabled),
                    },
                }
            }
        }
        other => to_command(other)?,
    };

    let payload = request(&mut client, command).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_payload(&payload);
    }
    Ok(())
}

fn to_command(cmd: Cmd) -> Result<Command> {
    let now = geotrack_util::now_ms();
    Ok(match cmd {
        Cmd::Status => Command::GetStatus,
        Cmd::Start {
            member_id,
            interval,
        } => Command::StartTracking {
            member_id: MemberId::new(member_id),
            interval_ms: interval.map(|s| s.saturating_mul(1000) as i64),
        },
        Cmd::Stop { resume } => Command::StopTracking {
            auto_resume: resume,
        },
        Cmd::Records {
            member_id,
            from,
            to,
        } => Command::QueryRecords {
            member_id: MemberId::new(member_id),
            start_ms: from.unwrap_or(now - DAY_MS),
            end_ms: to.unwrap_or(now),
        },
        Cmd::Count { member_id } => Command::CountToday {
            member_id: MemberId::new(member_id),
        },
        Cmd::Last { member_id } => Command::LastRecordTime {
            member_id: MemberId::new(member_id),
        },
        Cmd::Delete { record_id } => {
            let uuid = record_id
                .parse()
                .with_context(|| format!("Invalid record id {record_id:?}"))?;
            Command::DeleteRecord {
                record_id: RecordId::from_uuid(uuid),
            }
        }
        Cmd::Health => Command::GetHealth,
        Cmd::Config { .. } => Command::GetConfig,
        Cmd::Watch => bail!("watch is not a single request"),
    })
}

async fn request(client: &mut IpcClient, command: Command) -> Result<ResponsePayload> {
    let response = client.send(command).await?;
    match response.result {
        ResponseResult::Ok(payload) => Ok(payload),
        ResponseResult::Err(e) => bail!("{:?}: {}", e.code, e.message),
    }
}

async fn watch(client: IpcClient) -> Result<()> {
    let mut events = client.subscribe().await?;
    loop {
        let event = events.next().await?;
        let time = event.timestamp.format("%H:%M:%S");
        match event.payload {
            EventPayload::StatusChanged {
                is_tracking,
                member_id,
                interval_ms,
            } => println!(
                "{time} status: {} member={} interval={}s",
                if is_tracking { "recording" } else { "stopped" },
                member_id.as_ref().map(|m| m.as_str()).unwrap_or("-"),
                interval_ms / 1000
            ),
            EventPayload::RecordWritten {
                record_id,
                member_id,
                timestamp_ms,
                source,
            } => println!(
                "{time} record {record_id} member={member_id} at {} source={}",
                format_timestamp_ms(timestamp_ms),
                source.map(|s| s.to_string()).unwrap_or_else(|| "start".into())
            ),
            EventPayload::RestartScheduled {
                member_id,
                fire_at_ms,
            } => println!(
                "{time} restart for {member_id} at {}",
                format_timestamp_ms(fire_at_ms)
            ),
            EventPayload::RestartCanceled => println!("{time} restart canceled"),
            EventPayload::Shutdown => {
                println!("{time} service shutting down");
                return Ok(());
            }
        }
    }
}

fn print_payload(payload: &ResponsePayload) {
    match payload {
        ResponsePayload::Status(view) => {
            let status = match view.status {
                TrackingStatus::Recording => "recording",
                TrackingStatus::Stopped => "stopped",
            };
            println!("status:   {status}");
            if let Some(member_id) = &view.member_id {
                println!("member:   {member_id}");
                println!("interval: {}s", view.interval_ms / 1000);
            }
            if let Some(at) = view.last_accepted_at_ms {
                println!("last fix: {}", format_timestamp_ms(at));
            }
            if let Some(restart) = &view.pending_restart {
                println!(
                    "restart:  {} at {}",
                    restart.member_id,
                    format_timestamp_ms(restart.fire_at_ms)
                );
            }
        }
        ResponsePayload::Started {
            member_id,
            interval_ms,
        } => println!("Tracking {member_id} every {}s", interval_ms / 1000),
        ResponsePayload::AlreadyRecording { member_id } => {
            println!("Already tracking {member_id}")
        }
        ResponsePayload::Stopped { restart_at_ms } => match restart_at_ms {
            Some(at) => println!("Stopped; restarting at {}", format_timestamp_ms(*at)),
            None => println!("Stopped"),
        },
        ResponsePayload::NotRecording => println!("Not tracking"),
        ResponsePayload::Records(records) => {
            for record in records {
                println!(
                    "{}  {}  {:.6},{:.6}  {}{}",
                    record.id,
                    format_timestamp_ms(record.timestamp_ms),
                    record.latitude,
                    record.longitude,
                    record.address.as_deref().unwrap_or("-"),
                    record
                        .note
                        .as_deref()
                        .map(|n| format!("  ({n})"))
                        .unwrap_or_default()
                );
            }
            println!("{} record(s)", records.len());
        }
        ResponsePayload::Count { count } => println!("{count}"),
        ResponsePayload::LastRecordTime { timestamp_ms } => match timestamp_ms {
            Some(at) => println!("{}", format_timestamp_ms(*at)),
            None => println!("No records"),
        },
        ResponsePayload::Deleted => println!("Deleted"),
        ResponsePayload::Config(config) => {
            println!("enabled:       {}", config.enabled);
            println!("interval:      {}s", config.interval_seconds);
            println!("restart delay: {}s", config.auto_restart_delay_seconds);
            println!("auto start:    {}", config.auto_start_enabled);
        }
        ResponsePayload::ConfigUpdated => println!("Settings updated"),
        ResponsePayload::Subscribed { client_id } => println!("Subscribed as {client_id}"),
        ResponsePayload::Unsubscribed => println!("Unsubscribed"),
        ResponsePayload::Health(health) => {
            println!("live:       {}", health.live);
            println!("permission: {}", health.permission_granted);
            println!("store:      {}", if health.store_ok { "ok" } else { "failing" });
        }
        ResponsePayload::Pong => println!("pong"),
    }
}
