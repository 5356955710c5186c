//! Request path parsing and blob name validation
//!
//! Blob names double as on-disk file names, so they are restricted to
//! `[a-zA-Z0-9.-]+`. Nothing is normalized: a path either matches exactly or
//! is rejected before storage is touched.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::error::StoreError;

static REQUEST_PATH: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^/(upload|download)/([a-zA-Z0-9.\-]+)$").expect("request path pattern")
});

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9.\-]+$").expect("name pattern")
});

/// Operation addressed by a blob path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::Download => "download",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `/upload/{name}` or `/download/{name}` into its operation and name.
pub fn parse_request_path(path: &str) -> Result<(Operation, &str), StoreError> {
    let caps = REQUEST_PATH
        .captures(path)
        .ok_or_else(|| StoreError::InvalidName(path.to_string()))?;

    let op = match caps.get(1).map(|m| m.as_str()) {
        Some("upload") => Operation::Upload,
        Some("download") => Operation::Download,
        _ => return Err(StoreError::InvalidName(path.to_string())),
    };
    let name = caps
        .get(2)
        .map(|m| m.as_str())
        .ok_or_else(|| StoreError::InvalidName(path.to_string()))?;

    Ok((op, name))
}

/// Check a bare blob name.
pub fn validate_name(name: &str) -> Result<&str, StoreError> {
    if NAME.is_match(name) {
        Ok(name)
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_paths() {
        assert_eq!(
            parse_request_path("/upload/abc-123.txt").unwrap(),
            (Operation::Upload, "abc-123.txt")
        );
        assert_eq!(
            parse_request_path("/download/ABC.def-9").unwrap(),
            (Operation::Download, "ABC.def-9")
        );
    }

    #[test]
    fn test_rejects_invalid_paths() {
        for path in [
            "/upload/abc/def",
            "/upload/abc?x=1",
            "/upload/",
            "/upload",
            "/delete/abc",
            "/download/a b",
            "/download/name_with_underscore",
            "upload/abc",
            "/upload/abc/",
        ] {
            assert!(
                matches!(parse_request_path(path), Err(StoreError::InvalidName(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_dots_are_taken_literally() {
        assert_eq!(
            parse_request_path("/download/..").unwrap(),
            (Operation::Download, "..")
        );
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("medium-abcdefghijkl.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc/passwd").is_err());
    }
}
