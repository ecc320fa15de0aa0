use crate::model::Track;
use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::time::Duration;
use tracing::debug;

mod null;

pub use null::NullBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

/// Completion signals raised by a backend. They are only observed through
/// [`AudioBackend::poll_events`], on the thread that owns the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Loaded(HandleId),
    LoadFailed { handle: HandleId, reason: String },
    Unloaded(HandleId),
    Ended(HandleId),
}

pub trait AudioBackend {
    /// Starts loading `track`. An error here means the resource could not
    /// even be opened; decode problems found later arrive as
    /// [`EngineEvent::LoadFailed`].
    fn load(&mut self, track: &Track) -> Result<HandleId>;
    fn unload(&mut self, handle: HandleId);
    fn play(&mut self, handle: HandleId);
    fn pause(&mut self, handle: HandleId);
    fn seek(&mut self, handle: HandleId, position: Duration) -> Result<()>;
    fn position(&self, handle: HandleId) -> Option<Duration>;
    fn duration(&self, handle: HandleId) -> Option<Duration>;
    fn set_volume(&mut self, volume: f32);
    fn set_muted(&mut self, muted: bool);
    fn poll_events(&mut self) -> Vec<EngineEvent>;
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn load(&mut self, track: &Track) -> Result<HandleId> {
        (**self).load(track)
    }

    fn unload(&mut self, handle: HandleId) {
        (**self).unload(handle);
    }

    fn play(&mut self, handle: HandleId) {
        (**self).play(handle);
    }

    fn pause(&mut self, handle: HandleId) {
        (**self).pause(handle);
    }

    fn seek(&mut self, handle: HandleId, position: Duration) -> Result<()> {
        (**self).seek(handle, position)
    }

    fn position(&self, handle: HandleId) -> Option<Duration> {
        (**self).position(handle)
    }

    fn duration(&self, handle: HandleId) -> Option<Duration> {
        (**self).duration(handle)
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume);
    }

    fn set_muted(&mut self, muted: bool) {
        (**self).set_muted(muted);
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        (**self).poll_events()
    }
}

struct RodioHandle {
    sink: Sink,
    duration: Option<Duration>,
    end_reported: bool,
}

/// Plays through the default system output using `rodio`.
pub struct RodioBackend {
    stream: OutputStream,
    handles: HashMap<HandleId, RodioHandle>,
    events: VecDeque<EngineEvent>,
    next_id: u64,
    volume: f32,
    muted: bool,
}

impl RodioBackend {
    pub fn new() -> Result<Self> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .context("failed to open default system output stream")?;
        stream.log_on_drop(false);

        Ok(Self {
            stream,
            handles: HashMap::new(),
            events: VecDeque::new(),
            next_id: 1,
            volume: 1.0,
            muted: false,
        })
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    fn apply_volume(&self) {
        let volume = self.effective_volume();
        for handle in self.handles.values() {
            handle.sink.set_volume(volume);
        }
    }
}

impl AudioBackend for RodioBackend {
    fn load(&mut self, track: &Track) -> Result<HandleId> {
        let file = File::open(&track.src)
            .with_context(|| format!("failed to open track {}", track.src))?;

        let id = HandleId(self.next_id);
        self.next_id += 1;

        let source = match Decoder::try_from(file) {
            Ok(source) => source,
            Err(err) => {
                self.events.push_back(EngineEvent::LoadFailed {
                    handle: id,
                    reason: format!("failed to decode {}: {err}", track.src),
                });
                return Ok(id);
            }
        };

        let duration = source
            .total_duration()
            .filter(|duration| !duration.is_zero())
            .or_else(|| (track.duration > 0.0).then(|| Duration::from_secs_f64(track.duration)));

        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.append(source);
        sink.set_volume(self.effective_volume());

        debug!(src = %track.src, handle = id.0, "audio handle loaded");
        self.handles.insert(
            id,
            RodioHandle {
                sink,
                duration,
                end_reported: false,
            },
        );
        self.events.push_back(EngineEvent::Loaded(id));
        Ok(id)
    }

    fn unload(&mut self, handle: HandleId) {
        if let Some(entry) = self.handles.remove(&handle) {
            entry.sink.stop();
        }
        self.events.push_back(EngineEvent::Unloaded(handle));
    }

    fn play(&mut self, handle: HandleId) {
        if let Some(entry) = self.handles.get(&handle) {
            entry.sink.play();
        }
    }

    fn pause(&mut self, handle: HandleId) {
        if let Some(entry) = self.handles.get(&handle) {
            entry.sink.pause();
        }
    }

    fn seek(&mut self, handle: HandleId, position: Duration) -> Result<()> {
        let entry = self
            .handles
            .get_mut(&handle)
            .context("seek on an unknown audio handle")?;
        entry
            .sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))?;
        entry.end_reported = false;
        Ok(())
    }

    fn position(&self, handle: HandleId) -> Option<Duration> {
        self.handles.get(&handle).map(|entry| entry.sink.get_pos())
    }

    fn duration(&self, handle: HandleId) -> Option<Duration> {
        self.handles.get(&handle)?.duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume();
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        for (id, entry) in &mut self.handles {
            if !entry.end_reported && entry.sink.empty() {
                entry.end_reported = true;
                self.events.push_back(EngineEvent::Ended(*id));
            }
        }
        self.events.drain(..).collect()
    }
}
