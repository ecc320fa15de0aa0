use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const SUCCESS_CODE: i32 = 1;
pub const FAILURE_CODE: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    #[default]
    Sequential,
    Random,
}

impl OrderPolicy {
    pub fn next(self) -> Self {
        match self {
            Self::Sequential => Self::Random,
            Self::Random => Self::Sequential,
        }
    }
}

/// Embedded cover image. `format` is a MIME type and may be empty when the
/// tag did not carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    #[serde(default)]
    pub format: String,
    #[serde(
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub src: String,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub cover: Option<Picture>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub last_seek: f64,
}

impl Track {
    pub fn new(src: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            title: title.into(),
            artist: None,
            album: None,
            cover: None,
            duration: 0.0,
            last_seek: 0.0,
        }
    }

    /// Window title for this track: `title - artist`, or just the title.
    pub fn display_title(&self) -> String {
        match self.artist.as_deref().map(str::trim) {
            Some(artist) if !artist.is_empty() => format!("{} - {artist}", self.title),
            _ => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub name: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub cover: Option<Picture>,
    pub tracks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Playing,
    #[default]
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayListItem {
    pub src: String,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub seek: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayList {
    pub title: String,
    pub name: String,
    pub update_at: i64,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub children: Vec<PlayListItem>,
}

/// Application settings. Keys the player understands are typed; everything
/// else is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Setting {
    #[serde(rename = "common.rebuildWhenStart", default)]
    pub rebuild_when_start: bool,
    #[serde(rename = "common.collectionPaths", default)]
    pub collection_paths: Vec<PathBuf>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Result shape returned by the data-access layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataResponse<T> {
    pub code: i32,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            data: Some(data),
        }
    }

    pub fn fail() -> Self {
        Self {
            code: FAILURE_CODE,
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// The payload, only when the response reports success.
    pub fn into_data(self) -> Option<T> {
        if self.is_ok() { self.data } else { None }
    }
}

fn serialize_base64<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(data))
}

fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    STANDARD
        .decode(value.as_bytes())
        .map_err(serde::de::Error::custom)
}
