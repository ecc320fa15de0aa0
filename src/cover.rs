use crate::model::{Picture, Track};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const UNKNOWN_MIME: &str = "application/octet-stream";

/// Encodes a picture as a `data:` URI the web view can display directly.
pub fn cover_data_uri(picture: &Picture) -> String {
    format!(
        "data:{};base64,{}",
        mime_for(picture),
        STANDARD.encode(&picture.data)
    )
}

/// Cover URI for a track, or `None` so the caller falls back to its default
/// artwork.
pub fn track_cover_uri(track: &Track) -> Option<String> {
    track
        .cover
        .as_ref()
        .filter(|picture| !picture.data.is_empty())
        .map(cover_data_uri)
}

fn mime_for(picture: &Picture) -> String {
    let declared = picture.format.trim();
    if !declared.is_empty() {
        // Some taggers store a bare subtype such as "jpeg" or "PNG".
        if declared.contains('/') {
            return declared.to_ascii_lowercase();
        }
        return format!("image/{}", declared.to_ascii_lowercase());
    }

    image::guess_format(&picture.data)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| UNKNOWN_MIME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn declared_mime_is_used() {
        let picture = Picture {
            format: String::from("image/jpeg"),
            data: vec![1, 2, 3],
        };
        assert_eq!(cover_data_uri(&picture), "data:image/jpeg;base64,AQID");
    }

    #[test]
    fn bare_subtype_gets_image_prefix() {
        let picture = Picture {
            format: String::from("PNG"),
            data: vec![0xff],
        };
        assert!(cover_data_uri(&picture).starts_with("data:image/png;base64,"));
    }

    #[test]
    fn missing_mime_is_sniffed_from_bytes() {
        let picture = Picture {
            format: String::new(),
            data: PNG_MAGIC.to_vec(),
        };
        assert!(cover_data_uri(&picture).starts_with("data:image/png;base64,"));
    }

    #[test]
    fn unknown_bytes_fall_back_to_octet_stream() {
        let picture = Picture {
            format: String::new(),
            data: vec![0, 1, 2, 3],
        };
        assert!(cover_data_uri(&picture).starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn track_without_cover_has_no_uri() {
        let mut track = Track::new("a.mp3", "a");
        assert_eq!(track_cover_uri(&track), None);

        track.cover = Some(Picture {
            format: String::from("image/png"),
            data: Vec::new(),
        });
        assert_eq!(track_cover_uri(&track), None);
    }
}
