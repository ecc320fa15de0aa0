//! The playback session: the only owner of the loaded audio handle and of
//! the pause, seek, volume and mute state the UI reads.

use crate::audio::{AudioBackend, EngineEvent, HandleId};
use crate::error::SessionError;
use crate::model::{OrderPolicy, Track};
use crate::selector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Notifications for whoever drives the session. Collected in an outbox and
/// taken with [`PlaybackSession::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TrackChanged(Track),
    TitleChanged(String),
    Progress(f64),
    LoadFailed { src: String, reason: String },
    Stopped,
}

#[derive(Debug)]
struct ActiveTrack {
    handle: HandleId,
    track: Track,
}

/// A switch in flight. It is published once the new handle is loaded and
/// the previous one has reported its release.
#[derive(Debug)]
struct PendingSwitch {
    handle: HandleId,
    track: Track,
    loaded: bool,
    awaiting_release: Option<HandleId>,
    /// Pause requested while the switch was in flight.
    paused: bool,
}

pub struct PlaybackSession<B: AudioBackend> {
    backend: B,
    queue: Vec<Track>,
    policy: OrderPolicy,
    current: Option<ActiveTrack>,
    pending: Option<PendingSwitch>,
    is_paused: bool,
    is_muted: bool,
    volume: f32,
    seek: f64,
    duration: f64,
    rng: StdRng,
    events: Vec<SessionEvent>,
}

impl<B: AudioBackend> PlaybackSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_rng(backend, StdRng::from_os_rng())
    }

    pub fn with_seed(backend: B, seed: u64) -> Self {
        Self::with_rng(backend, StdRng::seed_from_u64(seed))
    }

    fn with_rng(backend: B, rng: StdRng) -> Self {
        Self {
            backend,
            queue: Vec::new(),
            policy: OrderPolicy::default(),
            current: None,
            pending: None,
            is_paused: false,
            is_muted: false,
            volume: 1.0,
            seek: 0.0,
            duration: 0.0,
            rng,
            events: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    pub fn set_queue(&mut self, tracks: Vec<Track>) {
        self.queue = tracks;
    }

    pub fn policy(&self) -> OrderPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: OrderPolicy) {
        self.policy = policy;
    }

    /// The published track. A track that is still loading is not current.
    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref().map(|active| &active.track)
    }

    pub fn pending_track(&self) -> Option<&Track> {
        self.pending.as_ref().map(|pending| &pending.track)
    }

    pub fn is_switching(&self) -> bool {
        self.pending.is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.pending.is_some() {
            SessionState::Loading
        } else if self.current.is_none() {
            SessionState::Idle
        } else if self.is_paused {
            SessionState::Paused
        } else {
            SessionState::Playing
        }
    }

    pub fn is_paused(&self) -> bool {
        match &self.pending {
            Some(pending) => pending.paused,
            None => self.is_paused,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn seek(&self) -> f64 {
        self.seek
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn progress(&self) -> f64 {
        progress_fraction(self.seek, self.duration)
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Begins switching to `track`. The previous handle is released right
    /// away; `track` becomes current once loading and the release have both
    /// completed.
    pub fn load_track(&mut self, track: Track) -> Result<(), SessionError> {
        if self.pending.is_some() {
            debug!(src = %track.src, "track switch rejected while another is in flight");
            return Err(SessionError::SwitchInProgress);
        }

        let handle = match self.backend.load(&track) {
            Ok(handle) => handle,
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(src = %track.src, %reason, "audio load failed");
                self.events.push(SessionEvent::LoadFailed {
                    src: track.src.clone(),
                    reason: reason.clone(),
                });
                return Err(SessionError::Load {
                    src: track.src,
                    reason,
                });
            }
        };

        let awaiting_release = self.current.as_ref().map(|active| active.handle);
        if let Some(previous) = awaiting_release {
            self.backend.unload(previous);
        }

        info!(src = %track.src, handle = handle.0, "switching track");
        self.pending = Some(PendingSwitch {
            handle,
            track,
            loaded: false,
            awaiting_release,
            paused: false,
        });
        Ok(())
    }

    /// Loads the queued track whose `src` matches.
    pub fn select(&mut self, src: &str) -> Result<(), SessionError> {
        let track = self
            .queue
            .iter()
            .find(|track| track.src == src)
            .cloned()
            .ok_or_else(|| SessionError::NotInQueue {
                src: src.to_string(),
            })?;
        self.load_track(track)
    }

    /// Moves to the next track under the current ordering policy.
    pub fn advance(&mut self) -> Result<(), SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::SwitchInProgress);
        }
        let current = self
            .current
            .as_ref()
            .map(|active| &active.track)
            .ok_or(SessionError::NoTrackLoaded)?;
        let next = selector::select_next(current, &self.queue, self.policy, &mut self.rng)?.clone();
        self.load_track(next)
    }

    /// During a switch the request is held and applied to the new track.
    pub fn pause(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.paused = true;
            return;
        }
        let Some(active) = &self.current else {
            return;
        };
        self.backend.pause(active.handle);
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.paused = false;
            return;
        }
        let Some(active) = &self.current else {
            return;
        };
        self.backend.play(active.handle);
        self.is_paused = false;
    }

    pub fn toggle_pause(&mut self) {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.backend.set_volume(self.volume);
    }

    pub fn mute(&mut self) {
        self.is_muted = true;
        self.backend.set_muted(true);
    }

    pub fn unmute(&mut self) {
        self.is_muted = false;
        self.backend.set_muted(false);
    }

    /// Seeks to a normalized position in the current track.
    pub fn seek_to(&mut self, fraction: f64) -> Result<(), SessionError> {
        let Some(active) = &self.current else {
            return Err(SessionError::NoTrackLoaded);
        };

        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let duration = self.duration.max(0.0);
        let target = (fraction * duration).clamp(0.0, duration);

        if let Err(err) = self
            .backend
            .seek(active.handle, Duration::from_secs_f64(target))
        {
            let reason = format!("{err:#}");
            warn!(%reason, "seek failed");
            return Err(SessionError::Seek { reason });
        }
        self.seek = target;
        Ok(())
    }

    /// Releases every handle the session holds and returns to idle.
    pub fn stop(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.backend.unload(pending.handle);
        }
        if let Some(active) = self.current.take() {
            self.backend.unload(active.handle);
        }
        self.is_paused = false;
        self.seek = 0.0;
        self.duration = 0.0;
        self.events.push(SessionEvent::Stopped);
    }

    /// Drains backend completions and applies them.
    pub fn pump(&mut self) {
        for event in self.backend.poll_events() {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Loaded(handle) => {
                if let Some(pending) = self.pending.as_mut().filter(|p| p.handle == handle) {
                    pending.loaded = true;
                    self.try_publish();
                }
            }
            EngineEvent::LoadFailed { handle, reason } => {
                if self.pending.as_ref().is_some_and(|p| p.handle == handle) {
                    self.fail_pending(reason);
                }
            }
            EngineEvent::Unloaded(handle) => {
                if self.current.as_ref().is_some_and(|a| a.handle == handle) {
                    self.current = None;
                }
                if let Some(pending) = self.pending.as_mut()
                    && pending.awaiting_release == Some(handle)
                {
                    pending.awaiting_release = None;
                    self.try_publish();
                }
            }
            EngineEvent::Ended(handle) => {
                let is_current = self.current.as_ref().is_some_and(|a| a.handle == handle);
                if is_current && self.pending.is_none() {
                    debug!("track ended, advancing");
                    if let Err(err) = self.advance() {
                        warn!("could not advance after track end: {err}");
                    }
                }
            }
        }
    }

    /// Refreshes seek and duration from the backend and reports progress.
    pub fn tick(&mut self) -> Option<f64> {
        // The outgoing handle may already be gone mid-switch.
        if self.pending.is_some() {
            return None;
        }
        let active = self.current.as_mut()?;
        let seek = self
            .backend
            .position(active.handle)
            .map_or(0.0, |position| position.as_secs_f64());
        let duration = self
            .backend
            .duration(active.handle)
            .map_or(active.track.duration, |duration| duration.as_secs_f64());

        active.track.last_seek = seek;
        if let Some(queued) = self.queue.iter_mut().find(|t| t.src == active.track.src) {
            queued.last_seek = seek;
        }

        self.seek = seek;
        self.duration = duration;
        let progress = progress_fraction(seek, duration);
        self.events.push(SessionEvent::Progress(progress));
        Some(progress)
    }

    fn try_publish(&mut self) {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| p.loaded && p.awaiting_release.is_none());
        if !ready {
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        self.backend.set_volume(self.volume);
        self.backend.set_muted(self.is_muted);
        if !pending.paused {
            self.backend.play(pending.handle);
        }

        self.is_paused = pending.paused;
        self.seek = 0.0;
        self.duration = self
            .backend
            .duration(pending.handle)
            .map_or(pending.track.duration, |duration| duration.as_secs_f64());

        info!(src = %pending.track.src, "now playing");
        self.events
            .push(SessionEvent::TrackChanged(pending.track.clone()));
        self.events
            .push(SessionEvent::TitleChanged(pending.track.display_title()));
        self.current = Some(ActiveTrack {
            handle: pending.handle,
            track: pending.track,
        });
    }

    fn fail_pending(&mut self, reason: String) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        warn!(src = %pending.track.src, %reason, "audio load failed");

        // The previous handle was already being released, so nothing is left
        // to fall back to.
        if pending.awaiting_release.is_some() {
            self.current = None;
        }
        self.is_paused = false;
        self.seek = 0.0;
        self.duration = 0.0;
        self.events.push(SessionEvent::LoadFailed {
            src: pending.track.src,
            reason,
        });
    }
}

/// `seek / duration` clamped to `[0, 1]`; zero when the duration is unknown.
pub fn progress_fraction(seek: f64, duration: f64) -> f64 {
    if !(duration > 0.0) || !seek.is_finite() {
        return 0.0;
    }
    (seek / duration).clamp(0.0, 1.0)
}
