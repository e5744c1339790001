//! Where asset bytes come from

use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetLoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed data URI")]
    InvalidDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("'{0}' is a remote URL; remote assets are not fetched")]
    Remote(String),
    #[error("'{0}' can only be loaded from a data URI here")]
    NotInline(String),
    #[error("asset '{id}' could not be decoded: {message}")]
    Decode { id: String, message: String },
}

/// Resolves an asset `src` string to raw bytes
pub trait AssetSource {
    fn read(&self, src: &str) -> Result<Vec<u8>, AssetLoadError>;
}

/// Only inline `data:` URIs. Used by exported documents, where every asset
/// has been inlined.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUriSource;

impl AssetSource for DataUriSource {
    fn read(&self, src: &str) -> Result<Vec<u8>, AssetLoadError> {
        if src.starts_with("data:") {
            parse_data_uri(src).map(|(_, bytes)| bytes)
        } else if is_remote(src) {
            Err(AssetLoadError::Remote(src.to_string()))
        } else {
            Err(AssetLoadError::NotInline(src.to_string()))
        }
    }
}

/// Data URIs plus files resolved against a root directory (the project
/// file's folder).
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = Path::new(src.strip_prefix("file://").unwrap_or(src));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl AssetSource for FileSource {
    fn read(&self, src: &str) -> Result<Vec<u8>, AssetLoadError> {
        if src.starts_with("data:") {
            return parse_data_uri(src).map(|(_, bytes)| bytes);
        }
        if is_remote(src) {
            return Err(AssetLoadError::Remote(src.to_string()));
        }
        let path = self.resolve(src);
        std::fs::read(&path).map_err(|source| AssetLoadError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

fn is_remote(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

/// Split a `data:[<mime>][;base64],<payload>` URI into mime type and bytes
pub fn parse_data_uri(uri: &str) -> Result<(String, Vec<u8>), AssetLoadError> {
    let rest = uri.strip_prefix("data:").ok_or(AssetLoadError::InvalidDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(AssetLoadError::InvalidDataUri)?;

    let mut params = header.split(';');
    let mime = match params.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => "text/plain".to_string(),
    };
    let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        // Whitespace sneaks into hand-edited or line-wrapped URIs
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD.decode(compact)?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };
    Ok((mime, bytes))
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// MIME type from magic bytes, falling back to the file extension of `name`
pub fn sniff_mime(bytes: &[u8], name: &str) -> &'static str {
    let starts = |sig: &[u8]| bytes.len() >= sig.len() && &bytes[..sig.len()] == sig;
    let riff_kind = |kind: &[u8]| starts(b"RIFF") && bytes.len() >= 12 && &bytes[8..12] == kind;

    if starts(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if starts(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if starts(b"GIF8") {
        return "image/gif";
    }
    if riff_kind(b"WEBP") {
        return "image/webp";
    }
    if riff_kind(b"WAVE") {
        return "audio/wav";
    }
    if starts(b"OggS") {
        return "audio/ogg";
    }
    if starts(b"fLaC") {
        return "audio/flac";
    }
    if starts(b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0) {
        return "audio/mpeg";
    }
    if starts(b"BM") {
        return "image/bmp";
    }

    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base64_data_uri() {
        let (mime, bytes) = parse_data_uri("data:image/png;base64,AAEC").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_percent_data_uri() {
        let (mime, bytes) = parse_data_uri("data:,hello%20world").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"hello world".to_vec());
        assert!(matches!(parse_data_uri("data:image/png;base64"), Err(AssetLoadError::InvalidDataUri)));
    }

    #[test]
    fn test_data_uri_round_trip() {
        let uri = to_data_uri("audio/wav", &[9, 8, 7, 6]);
        assert_eq!(parse_data_uri(&uri).unwrap(), ("audio/wav".to_string(), vec![9, 8, 7, 6]));
    }

    #[test]
    fn test_file_source_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/a.bin"), [1u8, 2, 3]).unwrap();

        let source = FileSource::new(dir.path());
        assert_eq!(source.read("img/a.bin").unwrap(), vec![1, 2, 3]);
        assert!(matches!(source.read("missing.png"), Err(AssetLoadError::Io { .. })));
        assert!(matches!(source.read("https://example.com/a.png"), Err(AssetLoadError::Remote(_))));
        assert_eq!(source.read("data:,x").unwrap(), b"x".to_vec());
    }

    #[test]
    fn test_data_uri_source_rejects_paths() {
        assert!(matches!(DataUriSource.read("hero.png"), Err(AssetLoadError::NotInline(_))));
        assert_eq!(DataUriSource.read("data:;base64,AQ==").unwrap(), vec![1]);
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(&[0x89, b'P', b'N', b'G', 0x0D], "x"), "image/png");
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WAVEfmt ", "x"), "audio/wav");
        assert_eq!(sniff_mime(b"OggS....", "x"), "audio/ogg");
        assert_eq!(sniff_mime(b"????", "song.MP3"), "audio/mpeg");
        assert_eq!(sniff_mime(b"????", "blob"), "application/octet-stream");
    }
}
