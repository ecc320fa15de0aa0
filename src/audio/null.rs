use super::{AudioBackend, EngineEvent, HandleId};
use crate::model::Track;
use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

struct NullHandle {
    playing: bool,
    started_at: Option<Instant>,
    position_offset: Duration,
    duration: Option<Duration>,
    end_reported: bool,
}

impl NullHandle {
    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if self.playing
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

/// Silent backend driven by the wall clock. Used when no output device is
/// available, and scriptable so callers can hold back completion events or
/// make particular sources fail.
#[derive(Default)]
pub struct NullBackend {
    handles: HashMap<HandleId, NullHandle>,
    events: VecDeque<EngineEvent>,
    next_id: u64,
    volume: f32,
    muted: bool,
    hold: bool,
    missing: HashSet<String>,
    undecodable: HashSet<String>,
    seeks_fail: bool,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            volume: 1.0,
            ..Self::default()
        }
    }

    /// While held, `poll_events` returns nothing and completions queue up
    /// until released one at a time with [`NullBackend::step`].
    pub fn hold_events(&mut self, hold: bool) {
        self.hold = hold;
    }

    pub fn step(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    pub fn queued_events(&self) -> usize {
        self.events.len()
    }

    /// Loads of `src` fail synchronously, as for a file that does not exist.
    pub fn mark_missing(&mut self, src: impl Into<String>) {
        self.missing.insert(src.into());
    }

    /// Loads of `src` are accepted but later report a decode failure.
    pub fn mark_undecodable(&mut self, src: impl Into<String>) {
        self.undecodable.insert(src.into());
    }

    /// Every seek reports an error, as for a stream that cannot seek.
    pub fn fail_seeks(&mut self, fail: bool) {
        self.seeks_fail = fail;
    }

    pub fn is_live(&self, handle: HandleId) -> bool {
        self.handles.contains_key(&handle)
    }

    pub fn is_playing(&self, handle: HandleId) -> bool {
        self.handles.get(&handle).is_some_and(|entry| entry.playing)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

impl AudioBackend for NullBackend {
    fn load(&mut self, track: &Track) -> Result<HandleId> {
        if self.missing.contains(&track.src) {
            anyhow::bail!("failed to open track {}: not found", track.src);
        }

        let id = HandleId(self.next_id.max(1));
        self.next_id = id.0 + 1;

        if self.undecodable.contains(&track.src) {
            self.events.push_back(EngineEvent::LoadFailed {
                handle: id,
                reason: format!("failed to decode {}", track.src),
            });
            return Ok(id);
        }

        let duration = (track.duration > 0.0).then(|| Duration::from_secs_f64(track.duration));
        self.handles.insert(
            id,
            NullHandle {
                playing: false,
                started_at: None,
                position_offset: Duration::ZERO,
                duration,
                end_reported: false,
            },
        );
        self.events.push_back(EngineEvent::Loaded(id));
        Ok(id)
    }

    fn unload(&mut self, handle: HandleId) {
        self.handles.remove(&handle);
        self.events.push_back(EngineEvent::Unloaded(handle));
    }

    fn play(&mut self, handle: HandleId) {
        if let Some(entry) = self.handles.get_mut(&handle)
            && !entry.playing
        {
            entry.playing = true;
            entry.started_at = Some(Instant::now());
        }
    }

    fn pause(&mut self, handle: HandleId) {
        if let Some(entry) = self.handles.get_mut(&handle) {
            entry.position_offset = entry.current_position();
            entry.started_at = None;
            entry.playing = false;
        }
    }

    fn seek(&mut self, handle: HandleId, position: Duration) -> Result<()> {
        let Some(entry) = self.handles.get_mut(&handle) else {
            anyhow::bail!("seek on an unknown audio handle");
        };
        if self.seeks_fail {
            anyhow::bail!("source does not support seeking");
        }

        entry.position_offset = entry
            .duration
            .map_or(position, |duration| position.min(duration));
        entry.started_at = entry.playing.then(Instant::now);
        entry.end_reported = false;
        Ok(())
    }

    fn position(&self, handle: HandleId) -> Option<Duration> {
        self.handles.get(&handle).map(NullHandle::current_position)
    }

    fn duration(&self, handle: HandleId) -> Option<Duration> {
        self.handles.get(&handle)?.duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        for (id, entry) in &mut self.handles {
            let Some(duration) = entry.duration else {
                continue;
            };
            if entry.playing && !entry.end_reported && entry.current_position() >= duration {
                entry.end_reported = true;
                self.events.push_back(EngineEvent::Ended(*id));
            }
        }

        if self.hold {
            return Vec::new();
        }
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn track(src: &str, seconds: f64) -> Track {
        Track {
            duration: seconds,
            ..Track::new(src, src)
        }
    }

    #[test]
    fn load_reports_loaded_on_next_poll() {
        let mut backend = NullBackend::new();
        let id = backend.load(&track("a.mp3", 10.0)).expect("load");
        assert_eq!(backend.poll_events(), vec![EngineEvent::Loaded(id)]);
        assert!(backend.poll_events().is_empty());
    }

    #[test]
    fn missing_source_fails_synchronously() {
        let mut backend = NullBackend::new();
        backend.mark_missing("gone.mp3");
        assert!(backend.load(&track("gone.mp3", 1.0)).is_err());
        assert_eq!(backend.queued_events(), 0);
    }

    #[test]
    fn position_advances_only_while_playing() {
        let mut backend = NullBackend::new();
        let id = backend.load(&track("a.mp3", 60.0)).expect("load");
        assert_eq!(backend.position(id), Some(Duration::ZERO));

        backend.play(id);
        thread::sleep(Duration::from_millis(20));
        backend.pause(id);
        let paused = backend.position(id).expect("position");
        assert!(paused > Duration::ZERO);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(backend.position(id), Some(paused));
    }

    #[test]
    fn seek_is_clamped_to_duration() {
        let mut backend = NullBackend::new();
        let id = backend.load(&track("a.mp3", 5.0)).expect("load");
        backend.seek(id, Duration::from_secs(30)).expect("seek");
        assert_eq!(backend.position(id), Some(Duration::from_secs(5)));
    }

    #[test]
    fn ended_is_reported_once_after_duration_elapses() {
        let mut backend = NullBackend::new();
        let id = backend.load(&track("short.mp3", 0.03)).expect("load");
        backend.poll_events();
        backend.play(id);
        thread::sleep(Duration::from_millis(60));

        assert_eq!(backend.poll_events(), vec![EngineEvent::Ended(id)]);
        assert!(backend.poll_events().is_empty());
    }

    #[test]
    fn held_events_are_released_by_step() {
        let mut backend = NullBackend::new();
        backend.hold_events(true);
        let id = backend.load(&track("a.mp3", 1.0)).expect("load");
        assert!(backend.poll_events().is_empty());
        assert_eq!(backend.step(), Some(EngineEvent::Loaded(id)));
        assert_eq!(backend.step(), None);
    }
}
