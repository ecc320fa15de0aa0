//! The data-access layer: settings, the scanned track cache, albums, lyrics
//! and saved playlists.

use crate::config;
use crate::library;
use crate::lyrics::{self, LyricLine};
use crate::model::{Album, DataResponse, PlayList, Setting, Track};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SETTING_FILE: &str = "setting.json";
const CACHE_FILE: &str = "cache.json";
const PLAYLISTS_FILE: &str = "playlists.json";

pub trait DataCenter {
    fn get_setting(&self) -> Result<Setting>;
    fn set_setting(&mut self, setting: &Setting) -> Result<()>;
    fn get_album_list(&self, limit: Option<usize>) -> DataResponse<Vec<Album>>;
    /// Rescans `paths` and replaces the track cache. Returns false on failure.
    fn rebuild_cache(&mut self, paths: &[PathBuf]) -> bool;
    fn get_track_by_src(&self, src: &str) -> DataResponse<Track>;
    fn get_lyrics_for(&self, src: &str) -> DataResponse<Vec<LyricLine>>;
    fn get_playlists(&self) -> Vec<PlayList>;
    fn set_playlist(&mut self, playlist: &PlayList) -> Result<()>;
    /// Last progress message of a cache rebuild; `"done"` once finished.
    fn rebuild_message(&self) -> String;
}

/// Data layer backed by JSON files in one directory.
pub struct JsonDataCenter {
    root: PathBuf,
    tracks: Vec<Track>,
    message: String,
}

impl JsonDataCenter {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        config::ensure_dir(&root)?;
        let tracks: Vec<Track> = config::load_json(&root.join(CACHE_FILE))?;
        info!(root = %root.display(), tracks = tracks.len(), "data center opened");
        Ok(Self {
            root,
            tracks,
            message: String::from("done"),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(config::config_root()?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }
}

impl DataCenter for JsonDataCenter {
    fn get_setting(&self) -> Result<Setting> {
        config::load_json(&self.path(SETTING_FILE))
    }

    fn set_setting(&mut self, setting: &Setting) -> Result<()> {
        config::save_json(&self.path(SETTING_FILE), setting)
    }

    fn get_album_list(&self, limit: Option<usize>) -> DataResponse<Vec<Album>> {
        DataResponse::ok(library::album_list(&self.tracks, limit))
    }

    fn rebuild_cache(&mut self, paths: &[PathBuf]) -> bool {
        let total = paths.len();
        let tracks = library::scan_many(paths, |n, root| {
            self.message = format!("scanning {} ({}/{})", root.display(), n + 1, total);
            info!("{}", self.message);
        });

        if let Err(err) = config::save_json(&self.path(CACHE_FILE), &tracks) {
            warn!("failed to write track cache: {err:#}");
            self.message = format!("failed: {err}");
            return false;
        }

        info!(tracks = tracks.len(), "track cache rebuilt");
        self.tracks = tracks;
        self.message = String::from("done");
        true
    }

    fn get_track_by_src(&self, src: &str) -> DataResponse<Track> {
        if let Some(track) = self.tracks.iter().find(|track| track.src == src) {
            return DataResponse::ok(track.clone());
        }

        // Files opened directly are not in the cache; read them on demand.
        match library::read_track(Path::new(src)) {
            Ok(mut track) => {
                track.src = src.to_string();
                DataResponse::ok(track)
            }
            Err(_) => DataResponse::fail(),
        }
    }

    fn get_lyrics_for(&self, src: &str) -> DataResponse<Vec<LyricLine>> {
        match lyrics::load_for_track(Path::new(src)) {
            Ok(Some(lines)) => DataResponse::ok(lines),
            Ok(None) => DataResponse::fail(),
            Err(err) => {
                warn!(src, "lyrics lookup failed: {err:#}");
                DataResponse::fail()
            }
        }
    }

    fn get_playlists(&self) -> Vec<PlayList> {
        config::load_json(&self.path(PLAYLISTS_FILE)).unwrap_or_else(|err| {
            warn!("failed to read playlists: {err:#}");
            Vec::new()
        })
    }

    fn set_playlist(&mut self, playlist: &PlayList) -> Result<()> {
        // An unreadable file is left as is rather than replaced.
        let mut playlists: Vec<PlayList> = config::load_json(&self.path(PLAYLISTS_FILE))?;
        match playlists.iter_mut().find(|p| p.title == playlist.title) {
            Some(existing) => *existing = playlist.clone(),
            None => playlists.push(playlist.clone()),
        }
        config::save_json(&self.path(PLAYLISTS_FILE), &playlists)
    }

    fn rebuild_message(&self) -> String {
        self.message.clone()
    }
}
