use uuid::Uuid;

use crate::utils::unix_millis;

/// The shared part of every storage key produced by one request.
///
/// Keys follow `<prefix>-<timestamp>[-<uuid>][-<original-name>][-<size>].<ext>`,
/// the uuid segment only being present when unique keys are enabled.
#[derive(Debug, Clone)]
pub struct KeyStamp {
    timestamp: u128,
    unique: bool,
}

impl KeyStamp {
    pub fn now(unique: bool) -> Self {
        Self::at(unix_millis(), unique)
    }

    pub fn at(timestamp: u128, unique: bool) -> Self {
        Self { timestamp, unique }
    }

    pub fn file_name(
        &self,
        prefix: &str,
        original_name: Option<&str>,
        size: Option<u32>,
        extension: &str,
    ) -> String {
        let mut name = format!("{}-{}", prefix, self.timestamp);

        if self.unique {
            name.push('-');
            name.push_str(&Uuid::new_v4().simple().to_string());
        }

        if let Some(original) = original_name {
            name.push('-');
            name.push_str(&sanitize_file_name(original));
        }

        if let Some(size) = size {
            name.push('-');
            name.push_str(&size.to_string());
        }

        name.push('.');
        name.push_str(extension);
        name
    }
}

/// Makes a client supplied file name safe to embed in a storage key.
///
/// Path separators and control characters become `_` and leading
/// dots are removed so the key can never escape its directory.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key() {
        let stamp = KeyStamp::at(1700000000000, false);
        assert_eq!(
            stamp.file_name("compressed", None, None, "webp"),
            "compressed-1700000000000.webp",
        );
    }

    #[test]
    fn test_key_with_original_name_and_size() {
        let stamp = KeyStamp::at(42, false);
        assert_eq!(
            stamp.file_name("bulk-resized", Some("cat.png"), None, "webp"),
            "bulk-resized-42-cat.png.webp",
        );
        assert_eq!(stamp.file_name("favicon", None, Some(48), "png"), "favicon-42-48.png");
    }

    #[test]
    fn test_unique_keys_differ() {
        let stamp = KeyStamp::at(42, true);
        let a = stamp.file_name("icon", None, Some(16), "png");
        let b = stamp.file_name("icon", None, Some(16), "png");

        assert_ne!(a, b);
        assert!(a.starts_with("icon-42-"));
        assert!(a.ends_with("-16.png"));
    }

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("..\\boot.ini"), "_boot.ini");
        assert_eq!(sanitize_file_name("..."), "file");
        assert_eq!(sanitize_file_name("my photo.jpg"), "my photo.jpg");
    }
}
