//! Tracking session engine

use geotrack_api::{TrackingConfig, TrackingStateView, TrackingStatus, API_VERSION};
use geotrack_host_api::{
    AlarmPayload, AlarmScheduler, ForegroundVisibility, PermissionGate, PositionSource,
};
use geotrack_store::{LocationStore, SessionSnapshot, TrackingSnapshot};
use geotrack_util::MemberId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    ConfigUpdateError, CoreEvent, ForegroundLease, GeocodeResolver, LocationAggregator,
    PreconditionError, RecordWriter, RestartScheduler, ScheduledRestart, SessionOutcome,
    StartError, TrackingCommand, TrackingSessionState,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Host collaborators the session is wired to
pub struct SessionHost {
    pub sources: Vec<Arc<dyn PositionSource>>,
    pub permission: Arc<dyn PermissionGate>,
    pub resolver: GeocodeResolver,
    pub alarm: Arc<dyn AlarmScheduler>,
    pub foreground: Arc<dyn ForegroundVisibility>,
    pub foreground_title: String,
    pub foreground_text: String,
    pub store: Arc<dyn LocationStore>,
}

/// The tracking session: one per daemon
pub struct TrackingSession {
    config: TrackingConfig,
    state: TrackingSessionState,
    aggregator: LocationAggregator,
    restart: RestartScheduler,
    lease: ForegroundLease,
    permission: Arc<dyn PermissionGate>,
    store: Arc<dyn LocationStore>,
    events: broadcast::Sender<CoreEvent>,
}

impl TrackingSession {
    pub fn new(config: TrackingConfig, host: SessionHost) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            sources = host.sources.len(),
            interval_seconds = config.interval_seconds,
            "Tracking session initialized"
        );

        Self {
            aggregator: LocationAggregator::new(
                host.sources,
                host.resolver,
                RecordWriter::new(host.store.clone()),
                events.clone(),
            ),
            restart: RestartScheduler::new(host.alarm),
            lease: ForegroundLease::new(
                host.foreground,
                host.foreground_title,
                host.foreground_text,
            ),
            permission: host.permission,
            store: host.store,
            config,
            state: TrackingSessionState::stopped(),
            events,
        }
    }

    /// Subscribe to core events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackingSessionState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn pending_restart(&self) -> Option<&ScheduledRestart> {
        self.restart.pending()
    }

    pub fn permission_granted(&self) -> bool {
        self.permission.has_location_permission()
    }

    /// Full state for clients
    pub fn view(&self) -> TrackingStateView {
        TrackingStateView {
            api_version: API_VERSION,
            status: self.state.status,
            member_id: self.state.member_id.clone(),
            interval_ms: self.state.interval_ms,
            last_accepted_at_ms: self.aggregator.last_accepted(),
            pending_restart: self.restart.pending().map(ScheduledRestart::info),
        }
    }

    /// Replace the tracking settings. Only allowed while stopped.
    pub fn update_config(&mut self, config: TrackingConfig) -> Result<(), ConfigUpdateError> {
        if self.state.is_recording() {
            return Err(ConfigUpdateError::SessionActive);
        }
        info!(
            interval_seconds = config.interval_seconds,
            auto_restart_delay_seconds = config.auto_restart_delay_seconds,
            enabled = config.enabled,
            "Tracking config updated"
        );
        self.config = config;
        Ok(())
    }

    pub async fn handle(&mut self, command: TrackingCommand) -> Result<SessionOutcome, StartError> {
        match command {
            TrackingCommand::StartTracking {
                member_id,
                interval_ms,
            } => self.start(member_id, interval_ms).await,
            TrackingCommand::StopTracking { auto_resume } => Ok(self.stop(auto_resume)),
            TrackingCommand::AutoRestart {
                member_id,
                interval_ms,
            } => {
                info!(member_id = %member_id, "Automatic restart firing");
                self.start(member_id, interval_ms).await
            }
        }
    }

    /// Start recording `member_id`.
    ///
    /// Recording the same member already is a no-op. Recording another
    /// member stops that session first (without arming a restart).
    pub async fn start(
        &mut self,
        member_id: MemberId,
        interval_ms: i64,
    ) -> Result<SessionOutcome, StartError> {
        if self.state.is_recording() && self.state.member_id.as_ref() == Some(&member_id) {
            debug!(member_id = %member_id, "Already recording");
            return Ok(SessionOutcome::AlreadyRecording { member_id });
        }

        self.check_preconditions(&member_id, interval_ms)?;

        if self.state.is_recording() {
            info!(
                from = ?self.state.member_id.as_ref().map(|m| m.as_str()),
                to = %member_id,
                "Switching tracked member"
            );
            self.stop(false);
        }

        if self.restart.cancel() {
            let _ = self.events.send(CoreEvent::RestartCanceled);
        }

        // Spacing holds across sessions of the same member
        if self.state.member_id.as_ref() != Some(&member_id) {
            self.aggregator.reset_gate();
        }
        self.aggregator.start(&member_id, interval_ms)?;

        if let Err(e) = self.lease.acquire() {
            warn!(error = %e, "Foreground indicator refused; aborting start");
            self.aggregator.stop();
            return Err(e.into());
        }

        self.aggregator.record_initial(&member_id).await;

        let now = geotrack_util::now_ms();
        self.state = TrackingSessionState {
            status: TrackingStatus::Recording,
            member_id: Some(member_id.clone()),
            interval_ms,
            started_at_ms: Some(now),
        };

        if let Err(e) = self.store.save_snapshot(&TrackingSnapshot::recording(
            member_id.clone(),
            interval_ms,
            now,
        )) {
            warn!(error = %e, "Failed to persist tracking indicator");
        }

        self.emit_status();
        info!(member_id = %member_id, interval_ms, "Tracking started");

        Ok(SessionOutcome::Started {
            member_id,
            interval_ms,
        })
    }

    /// Stop recording. No-op when already stopped.
    ///
    /// With `auto_resume`, a restart for the same member and interval is
    /// armed after the configured delay; a refused alarm is only logged.
    pub fn stop(&mut self, auto_resume: bool) -> SessionOutcome {
        if !self.state.is_recording() {
            debug!("Stop requested while not recording");
            return SessionOutcome::NotRecording;
        }

        self.aggregator.stop();
        self.lease.release();

        self.state.status = TrackingStatus::Stopped;
        self.state.started_at_ms = None;

        if let Err(e) = self.store.clear_snapshot() {
            warn!(error = %e, "Failed to clear tracking indicator");
        }

        self.emit_status();
        info!(
            member_id = ?self.state.member_id.as_ref().map(|m| m.as_str()),
            auto_resume,
            "Tracking stopped"
        );

        let restart = match (&self.state.member_id, auto_resume) {
            (Some(member_id), true) => {
                match self.restart.schedule(
                    member_id,
                    self.state.interval_ms,
                    self.config.auto_restart_delay_seconds,
                    geotrack_util::now_ms(),
                ) {
                    Ok(restart) => {
                        let _ = self.events.send(CoreEvent::RestartScheduled {
                            member_id: restart.member_id.clone(),
                            fire_at_ms: restart.fire_at_ms,
                        });
                        Some(restart)
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not arm automatic restart");
                        None
                    }
                }
            }
            _ => None,
        };

        SessionOutcome::Stopped { restart }
    }

    /// Handle a fired restart wake.
    ///
    /// Superseded wakes are ignored. Without permission the restart is
    /// dropped and not retried.
    pub async fn on_restart_fired(&mut self, payload: &AlarmPayload) -> Option<SessionOutcome> {
        let restart = self.restart.take_fired(payload)?;

        if self.state.is_recording() {
            debug!("Restart fired while recording; ignoring");
            return None;
        }

        if !self.permission.has_location_permission() {
            warn!(
                member_id = %restart.member_id,
                "Location permission missing; automatic restart dropped"
            );
            return None;
        }

        let command = TrackingCommand::AutoRestart {
            member_id: restart.member_id,
            interval_ms: restart.interval_ms,
        };
        match self.handle(command).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "Automatic restart failed");
                None
            }
        }
    }

    /// Stop everything for process exit
    pub fn shutdown(&mut self) {
        self.stop(false);
        if self.restart.cancel() {
            let _ = self.events.send(CoreEvent::RestartCanceled);
        }
        if let Err(e) = self.store.clear_snapshot() {
            warn!(error = %e, "Failed to clear tracking indicator");
        }
        info!("Tracking session shut down");
    }

    /// Clean up after an unexpected exit of a previous process.
    ///
    /// A persisted recording indicator is stale by definition here: it is
    /// cleared and returned so the caller can decide whether to resume.
    pub fn reconcile(&mut self) -> Option<SessionSnapshot> {
        if self.state.is_recording() {
            return None;
        }

        self.aggregator.stop();
        self.lease.force_release();

        match self.store.load_snapshot() {
            Ok(Some(TrackingSnapshot {
                active: Some(active),
                timestamp,
            })) => {
                warn!(
                    member_id = %active.member_id,
                    saved_at = %timestamp,
                    "Found stale tracking indicator from a previous run"
                );
                if let Err(e) = self.store.clear_snapshot() {
                    warn!(error = %e, "Failed to clear stale tracking indicator");
                }
                Some(active)
            }
            Ok(Some(_)) => {
                let _ = self.store.clear_snapshot();
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to load tracking indicator");
                None
            }
        }
    }

    /// Wait for in-flight record writes
    pub async fn wait_idle(&self) {
        self.aggregator.wait_idle().await;
    }

    fn check_preconditions(
        &self,
        member_id: &MemberId,
        interval_ms: i64,
    ) -> Result<(), PreconditionError> {
        if member_id.is_blank() {
            return Err(PreconditionError::MissingMember);
        }
        if interval_ms <= 0 {
            return Err(PreconditionError::InvalidInterval(interval_ms));
        }
        if !self.permission.has_location_permission() {
            return Err(PreconditionError::PermissionDenied);
        }
        Ok(())
    }

    fn emit_status(&self) {
        let _ = self.events.send(CoreEvent::StatusChanged {
            is_tracking: self.state.is_recording(),
            member_id: self.state.member_id.clone(),
            interval_ms: self.state.interval_ms,
        });
    }
}
