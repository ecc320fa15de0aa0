use crate::config;
use crate::model::{Album, Picture, Track};
use anyhow::{Context, Result};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::PictureType;
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

/// Builds a track from a file on disk. Unreadable tags are not an error: the
/// track keeps its file-stem title and no metadata.
pub fn read_track(path: &Path) -> Result<Track> {
    if !path.is_file() {
        anyhow::bail!("track file not found: {}", path.display());
    }

    let src = config::src_for_path(path);
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("unknown")
        .to_string();
    let mut track = Track::new(src, stem);

    match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(tagged_file) => {
            track.duration = tagged_file.properties().duration().as_secs_f64();
            if let Some(tag) = tagged_file
                .primary_tag()
                .or_else(|| tagged_file.first_tag())
            {
                apply_tag(&mut track, tag);
            }
        }
        Err(err) => debug!(path = %path.display(), "no readable tags: {err}"),
    }

    Ok(track)
}

fn apply_tag(track: &mut Track, tag: &Tag) {
    if let Some(title) = tag.title().and_then(|value| clean(&value)) {
        track.title = title;
    }
    track.artist = tag.artist().and_then(|value| clean(&value));
    track.album = tag.album().and_then(|value| clean(&value));

    let pictures = tag.pictures();
    let chosen = pictures
        .iter()
        .find(|picture| picture.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first());
    track.cover = chosen.map(|picture| Picture {
        format: picture
            .mime_type()
            .map(|mime| mime.as_str().to_string())
            .unwrap_or_default(),
        data: picture.data().to_vec(),
    });
}

fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn scan_folder(root: &Path) -> Vec<Track> {
    let mut tracks: Vec<Track> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio(entry.path()))
        .filter_map(|entry| read_track(entry.path()).ok())
        .collect();

    tracks.sort_by(|a, b| a.src.cmp(&b.src));
    tracks
}

/// Scans every root in turn, calling `on_root` before each one. The result
/// is sorted by `src` with duplicates from overlapping roots removed.
pub fn scan_many<P: AsRef<Path>>(
    roots: &[P],
    mut on_root: impl FnMut(usize, &Path),
) -> Vec<Track> {
    let mut tracks = Vec::new();
    for (n, root) in roots.iter().enumerate() {
        let root = root.as_ref();
        on_root(n, root);
        tracks.extend(scan_folder(root));
    }
    tracks.sort_by(|a, b| a.src.cmp(&b.src));
    tracks.dedup_by(|a, b| a.src == b.src);
    tracks
}

pub fn read_tracks(paths: &[impl AsRef<Path>]) -> Result<Vec<Track>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            read_track(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .collect()
}

/// Groups tracks by album tag, sorted by album name. Tracks without an
/// album tag are left out. `limit` caps the number of albums returned.
pub fn album_list(tracks: &[Track], limit: Option<usize>) -> Vec<Album> {
    let mut albums: BTreeMap<String, Album> = BTreeMap::new();

    for track in tracks {
        let Some(name) = track.album.as_deref() else {
            continue;
        };
        let album = albums.entry(name.to_string()).or_insert_with(|| Album {
            name: name.to_string(),
            artist: track.artist.clone(),
            cover: None,
            tracks: Vec::new(),
        });
        if album.cover.is_none() {
            album.cover = track.cover.clone();
        }
        if album.artist.is_none() {
            album.artist = track.artist.clone();
        }
        album.tracks.push(track.src.clone());
    }

    albums
        .into_values()
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

pub fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}
