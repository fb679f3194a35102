//! Ingestion of chat export files
//!
//! This module is the file boundary in front of the parser:
//!
//! 1. [`validate_upload`] enforces the name/size policy from [`UploadConfig`]
//! 2. [`decode_lossy`] turns bytes into text, replacing malformed UTF-8
//! 3. [`parse_chat`] classifies lines into a [`ParsedChat`](crate::types::ParsedChat)
//!
//! Only the first step can fail. Decoding and parsing absorb bad input.

pub mod parser;
pub mod rules;

pub use parser::{parse_chat, parse_chat_with_report, ParseReport};
pub use rules::{classify, LineMatch, LineRule, LocalStamp, Meridiem, RULES};

use crate::config::UploadConfig;
use crate::error::{Error, Result};
use std::path::Path;

/// Extension accepted for chat exports.
pub const EXPORT_EXTENSION: &str = "txt";

const UTF8_BOM: &str = "\u{feff}";

/// Check an upload's name and size against the policy.
pub fn validate_upload(file_name: &str, size: u64, policy: &UploadConfig) -> Result<()> {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return Err(Error::MissingFile);
    }

    let has_extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(EXPORT_EXTENSION))
        .unwrap_or(false);
    if !has_extension {
        return Err(Error::InvalidFileType {
            file_name: file_name.to_string(),
            expected: EXPORT_EXTENSION.to_string(),
        });
    }

    if size > policy.max_bytes {
        return Err(Error::FileTooLarge {
            size,
            limit: policy.max_bytes,
        });
    }

    Ok(())
}

/// Decode export bytes as UTF-8, replacing invalid sequences. Never fails.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix(UTF8_BOM).unwrap_or(&*text).to_string()
}

/// Validate, read and decode an export from disk.
pub fn read_export(path: &Path, policy: &UploadConfig) -> Result<String> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let size = std::fs::metadata(path)?.len();

    validate_upload(&file_name, size, policy)?;

    let bytes = std::fs::read(path)?;
    tracing::debug!(bytes = bytes.len(), "Read chat export");
    Ok(decode_lossy(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_bytes: u64) -> UploadConfig {
        UploadConfig {
            max_bytes,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_upload_accepts_txt() {
        assert!(validate_upload("KakaoTalk_Chat.txt", 100, &policy(1000)).is_ok());
        assert!(validate_upload("chat.TXT", 1000, &policy(1000)).is_ok());
    }

    #[test]
    fn test_validate_upload_rejections() {
        assert!(matches!(
            validate_upload("  ", 1, &policy(1000)),
            Err(Error::MissingFile)
        ));
        assert!(matches!(
            validate_upload("chat.csv", 1, &policy(1000)),
            Err(Error::InvalidFileType { .. })
        ));
        assert!(matches!(
            validate_upload("txt", 1, &policy(1000)),
            Err(Error::InvalidFileType { .. })
        ));
        assert!(matches!(
            validate_upload("chat.txt", 1001, &policy(1000)),
            Err(Error::FileTooLarge {
                size: 1001,
                limit: 1000
            })
        ));
    }

    #[test]
    fn test_decode_lossy_replaces_invalid_bytes() {
        let mut bytes = "안녕".as_bytes().to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(b"ok");
        assert_eq!(decode_lossy(&bytes), "안녕\u{fffd}ok");
    }

    #[test]
    fn test_decode_lossy_strips_bom() {
        let bytes = b"\xef\xbb\xbfhello";
        assert_eq!(decode_lossy(bytes), "hello");
    }

    #[test]
    fn test_read_export_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        std::fs::write(&path, "2024.03.15. 오후 3:45, Alice : hello").unwrap();

        let text = read_export(&path, &UploadConfig::default()).unwrap();
        assert_eq!(parse_chat(&text).participants, vec!["Alice"]);
    }
}
