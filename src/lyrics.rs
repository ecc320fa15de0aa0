//! Lyrics lookup for a track: a sidecar `.lrc` file next to the audio file,
//! else a lyrics tag embedded in the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricLine {
    pub timestamp_ms: Option<u32>,
    pub text: String,
}

pub fn load_for_track(track_path: &Path) -> Result<Option<Vec<LyricLine>>> {
    let sidecar = track_path.with_extension("lrc");
    if sidecar.is_file() {
        let raw = fs::read_to_string(&sidecar)
            .with_context(|| format!("failed to read lyrics file {}", sidecar.display()))?;
        return Ok(Some(parse_lrc(&raw)));
    }

    let Some(raw) = read_embedded_lyrics(track_path) else {
        return Ok(None);
    };
    let lines = if looks_like_lrc(&raw) {
        parse_lrc(&raw)
    } else {
        parse_plain_text(&raw)
    };
    Ok(Some(lines))
}

pub fn parse_plain_text(input: &str) -> Vec<LyricLine> {
    input
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(|line| LyricLine {
            timestamp_ms: None,
            text: line.to_string(),
        })
        .collect()
}

/// Parses LRC text. A line may carry several timestamps and yields one entry
/// per timestamp; word-level `<mm:ss.xx>` tags are dropped from the text.
/// Timed lines are sorted; untimed lines keep their order after them.
pub fn parse_lrc(input: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();

    for raw_line in input.lines() {
        let line = raw_line.trim_end();
        if line.is_empty() || is_metadata_line(line) {
            continue;
        }

        let (timestamps, rest) = split_timestamps(line);
        let text = strip_word_tags(rest);
        if timestamps.is_empty() {
            lines.push(LyricLine {
                timestamp_ms: None,
                text,
            });
        } else {
            lines.extend(timestamps.into_iter().map(|ms| LyricLine {
                timestamp_ms: Some(ms),
                text: text.clone(),
            }));
        }
    }

    lines.sort_by_key(|line| line.timestamp_ms.unwrap_or(u32::MAX));
    lines
}

/// The timed line active at `position_ms`.
pub fn line_at(lines: &[LyricLine], position_ms: u32) -> Option<&LyricLine> {
    lines
        .iter()
        .take_while(|line| line.timestamp_ms.is_some_and(|ms| ms <= position_ms))
        .last()
}

fn read_embedded_lyrics(track_path: &Path) -> Option<String> {
    let file = fs::File::open(track_path).ok()?;
    let source = symphonia::core::io::MediaSourceStream::new(
        Box::new(file),
        symphonia::core::io::MediaSourceStreamOptions::default(),
    );

    let mut hint = symphonia::core::probe::Hint::new();
    if let Some(extension) = track_path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &symphonia::core::formats::FormatOptions::default(),
            &symphonia::core::meta::MetadataOptions::default(),
        )
        .ok()?;

    let metadata = probed.format.metadata();
    let revision = metadata.current()?;

    // Prefer a value that already carries LRC timing over plain text.
    revision
        .tags()
        .iter()
        .filter(|tag| {
            let key = tag.key.to_ascii_lowercase();
            key.contains("lyric") || key == "uslt" || key == "sylt"
        })
        .map(|tag| tag.value.to_string().trim().to_string())
        .filter(|value| !value.is_empty())
        .max_by_key(|value| looks_like_lrc(value))
}

fn looks_like_lrc(input: &str) -> bool {
    input
        .lines()
        .any(|line| !split_timestamps(line.trim_start()).0.is_empty())
}

fn is_metadata_line(line: &str) -> bool {
    const TAGS: &[&str] = &["[ar:", "[ti:", "[al:", "[by:", "[offset:", "[length:"];
    let lower = line.to_ascii_lowercase();
    TAGS.iter().any(|tag| lower.starts_with(tag))
}

fn split_timestamps(input: &str) -> (Vec<u32>, &str) {
    let mut rest = input;
    let mut stamps = Vec::new();

    while let Some(inner) = rest.strip_prefix('[') {
        let Some(end) = inner.find(']') else {
            break;
        };
        let Some(ms) = parse_timestamp(&inner[..end]) else {
            break;
        };
        stamps.push(ms);
        rest = &inner[end + 1..];
    }

    (stamps, rest.trim_start())
}

/// `mm:ss`, `mm:ss.x`, `mm:ss.xx` or `mm:ss.xxx` to milliseconds.
fn parse_timestamp(token: &str) -> Option<u32> {
    let (minutes, seconds) = token.split_once(':')?;
    let minutes = minutes.parse::<u32>().ok()?;
    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let whole = whole.parse::<u32>().ok()?;

    if !fraction.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let centis = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u32>().ok()? * 10,
        _ => fraction[..2].parse::<u32>().ok()?,
    };

    Some(
        minutes
            .saturating_mul(60_000)
            .saturating_add(whole.saturating_mul(1000))
            .saturating_add(centis * 10),
    )
}

fn strip_word_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('>') else {
            out.push_str(tail);
            rest = "";
            break;
        };
        if parse_timestamp(&tail[1..close]).is_none() {
            out.push_str(&tail[..=close]);
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);

    out.trim().to_string()
}
