use crate::audio::AudioBackend;
use crate::bridge::{HostBridge, InboundEvent, OutboundEvent};
use crate::cover;
use crate::data::DataCenter;
use crate::error::SessionError;
use crate::lyrics::{self, LyricLine};
use crate::model::{Album, ItemStatus, PlayList, PlayListItem, Setting, Track};
use crate::session::{PlaybackSession, SessionEvent};
use crate::timer::ProgressTimer;
use anyhow::Result;
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub const ALBUM_LIST_LIMIT: usize = 500;
pub const DEFAULT_PLAYLIST_TITLE: &str = "default";
pub const DEFAULT_PLAYLIST_NAME: &str = "默认列表";

/// Where to pick up after a restart: the saved current track and offset.
#[derive(Debug, Clone, PartialEq)]
struct ResumePoint {
    src: String,
    seek: f64,
}

/// The top-level component. It owns the one playback session and wires user
/// intents, the progress timer, the host shell and the data layer to it.
pub struct PlayerApp<B: AudioBackend, D: DataCenter, H: HostBridge> {
    session: PlaybackSession<B>,
    data: D,
    bridge: H,
    timer: ProgressTimer,
    setting: Setting,
    albums: Vec<Album>,
    lyrics: Vec<LyricLine>,
    progress: f64,
    resume: Option<ResumePoint>,
    seek_on_publish: Option<ResumePoint>,
}

impl<B: AudioBackend, D: DataCenter, H: HostBridge> PlayerApp<B, D, H> {
    pub fn new(session: PlaybackSession<B>, data: D, bridge: H) -> Self {
        Self {
            session,
            data,
            bridge,
            timer: ProgressTimer::default(),
            setting: Setting::default(),
            albums: Vec::new(),
            lyrics: Vec::new(),
            progress: 0.0,
            resume: None,
            seek_on_publish: None,
        }
    }

    pub fn with_timer(mut self, timer: ProgressTimer) -> Self {
        self.timer = timer;
        self
    }

    pub fn session(&self) -> &PlaybackSession<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession<B> {
        &mut self.session
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn bridge(&self) -> &H {
        &self.bridge
    }

    pub fn setting(&self) -> &Setting {
        &self.setting
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn lyrics(&self) -> &[LyricLine] {
        &self.lyrics
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn timer(&self) -> &ProgressTimer {
        &self.timer
    }

    /// Loads settings and albums and restores the saved default queue.
    pub fn startup(&mut self) -> Result<()> {
        self.setting = self.data.get_setting()?;

        if self.setting.rebuild_when_start {
            let paths = self.setting.collection_paths.clone();
            let rebuilt = self.data.rebuild_cache(&paths);
            if rebuilt {
                self.refresh_albums();
            }
        } else {
            self.refresh_albums();
        }

        self.init_playlist();
        Ok(())
    }

    fn refresh_albums(&mut self) {
        if let Some(albums) = self.data.get_album_list(Some(ALBUM_LIST_LIMIT)).into_data() {
            self.albums = albums;
        }
    }

    fn init_playlist(&mut self) {
        let Some(saved) = self
            .data
            .get_playlists()
            .into_iter()
            .find(|playlist| playlist.title == DEFAULT_PLAYLIST_TITLE)
        else {
            return;
        };

        let tracks: Vec<Track> = saved
            .children
            .iter()
            .filter_map(|child| self.data.get_track_by_src(&child.src).into_data())
            .collect();

        self.resume = saved
            .children
            .get(saved.current_index)
            .filter(|child| tracks.iter().any(|track| track.src == child.src))
            .map(|child| ResumePoint {
                src: child.src.clone(),
                seek: child.seek,
            });

        info!(tracks = tracks.len(), "restored default playlist");
        self.session.set_queue(tracks);
    }

    /// Starts the track that was current when the playlist was saved, at its
    /// saved offset.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        let Some(point) = self.resume.take() else {
            return Ok(());
        };
        self.session.select(&point.src)?;
        self.seek_on_publish = Some(point);
        Ok(())
    }

    /// Snapshot of the queue as the `default` playlist.
    pub fn playlist_snapshot(&self) -> PlayList {
        let current_src = self.session.current_track().map(|track| track.src.as_str());
        let mut current_index = 0;

        let children = self
            .session
            .queue()
            .iter()
            .enumerate()
            .map(|(idx, track)| {
                let mut seek = 0.0;
                if Some(track.src.as_str()) == current_src {
                    seek = self.session.seek();
                    current_index = idx;
                }
                PlayListItem {
                    src: track.src.clone(),
                    status: ItemStatus::Paused,
                    seek,
                }
            })
            .collect();

        PlayList {
            title: DEFAULT_PLAYLIST_TITLE.to_string(),
            name: DEFAULT_PLAYLIST_NAME.to_string(),
            update_at: (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
            current_index,
            children,
        }
    }

    pub fn save_playlist(&mut self) -> Result<()> {
        let playlist = self.playlist_snapshot();
        debug!(tracks = playlist.children.len(), "saving default playlist");
        self.data.set_playlist(&playlist)
    }

    /// Replaces the queue; a non-empty queue is saved right away. A failed
    /// save is logged and the new queue stays in effect.
    pub fn set_queue(&mut self, tracks: Vec<Track>) {
        self.session.set_queue(tracks);
        if !self.session.queue().is_empty()
            && let Err(err) = self.save_playlist()
        {
            warn!("failed to save playlist: {err:#}");
        }
    }

    pub fn delete_from_queue(&mut self, src: &str) {
        let remaining: Vec<Track> = self
            .session
            .queue()
            .iter()
            .filter(|track| track.src != src)
            .cloned()
            .collect();
        self.set_queue(remaining)
    }

    pub fn empty_queue(&mut self) {
        self.session.set_queue(Vec::new());
    }

    pub fn select(&mut self, src: &str) -> Result<(), SessionError> {
        self.session.select(src)
    }

    pub fn next(&mut self) -> Result<(), SessionError> {
        self.session.advance()
    }

    pub fn toggle_pause(&mut self) {
        self.session.toggle_pause();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.session.set_volume(volume);
    }

    pub fn toggle_mute(&mut self) {
        if self.session.is_muted() {
            self.session.unmute();
        } else {
            self.session.mute();
        }
    }

    pub fn seek(&mut self, fraction: f64) -> Result<(), SessionError> {
        self.session.seek_to(fraction)
    }

    pub fn toggle_order(&mut self) {
        let policy = self.session.policy().next();
        self.session.set_policy(policy);
    }

    pub fn cover_uri(&self) -> Option<String> {
        self.session.current_track().and_then(cover::track_cover_uri)
    }

    pub fn current_lyric(&self) -> Option<&LyricLine> {
        let position_ms = (self.session.seek().max(0.0) * 1000.0) as u32;
        lyrics::line_at(&self.lyrics, position_ms)
    }

    pub fn open_files(&mut self) -> Result<()> {
        self.bridge.send(OutboundEvent::OpenFiles)
    }

    pub fn minimize(&mut self) -> Result<()> {
        self.bridge.send(OutboundEvent::Minimize)
    }

    /// Saves the queue, stops polling and asks the shell to close the window.
    pub fn close(&mut self) -> Result<()> {
        self.timer.cancel();
        let saved = self.save_playlist();
        self.session.stop();
        self.bridge.send(OutboundEvent::Close)?;
        saved
    }

    /// Rebuilds the track cache from the configured collection paths. The
    /// queue is emptied afterwards since its tracks may no longer exist.
    pub fn rebuild_cache(&mut self) -> bool {
        let paths = self.setting.collection_paths.clone();
        let rebuilt = self.data.rebuild_cache(&paths);
        if rebuilt {
            self.refresh_albums();
        }
        self.empty_queue();
        rebuilt
    }

    pub fn handle_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::FilesOpened(tracks) => {
                let Some(first) = tracks.first().cloned() else {
                    return;
                };
                info!(count = tracks.len(), "files opened");
                self.set_queue(tracks);
                if let Err(err) = self.session.load_track(first) {
                    warn!("could not start opened files: {err}");
                }
            }
        }
    }

    /// One turn of the event loop.
    pub fn run_once(&mut self, now: Instant) -> Result<()> {
        while let Some(event) = self.bridge.try_recv() {
            self.handle_inbound(event);
        }

        self.session.pump();
        if self.timer.poll(now) {
            self.session.tick();
        }

        for event in self.session.drain_events() {
            self.apply(event, now)?;
        }
        Ok(())
    }

    fn apply(&mut self, event: SessionEvent, now: Instant) -> Result<()> {
        match event {
            SessionEvent::TrackChanged(track) => {
                self.timer.arm(now);
                self.progress = 0.0;
                self.lyrics = self
                    .data
                    .get_lyrics_for(&track.src)
                    .into_data()
                    .unwrap_or_default();
                let duration = self.session.duration();
                if let Some(point) = self.seek_on_publish.take()
                    && point.src == track.src
                    && duration > 0.0
                    && let Err(err) = self.session.seek_to(point.seek / duration)
                {
                    warn!("could not restore saved position: {err}");
                }
            }
            SessionEvent::TitleChanged(title) => {
                self.bridge.send(OutboundEvent::SetTitle(title))?;
            }
            SessionEvent::Progress(progress) => {
                self.progress = progress;
                self.bridge.send(OutboundEvent::SetProgressBar(progress))?;
            }
            SessionEvent::LoadFailed { src, reason } => {
                warn!(%src, %reason, "track could not be played");
                if self.session.current_track().is_none() {
                    self.timer.cancel();
                    self.lyrics.clear();
                    self.progress = 0.0;
                }
            }
            SessionEvent::Stopped => {
                self.timer.cancel();
                self.progress = 0.0;
            }
        }
        Ok(())
    }
}
