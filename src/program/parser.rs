//! Version output parsing.

use crate::error::{Error, Result};
use regex::Regex;
use semver::Version;
use std::sync::OnceLock;

fn semver_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("Invalid regex pattern"))
}

fn lenient_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("Invalid regex pattern")
    })
}

/// Parse a full `major.minor.patch` version embedded in CLI output.
///
/// - `gpg (GnuPG) 2.4.4` -> 2.4.4
/// - `Homebrew 4.2.0` -> 4.2.0
pub fn parse_version(output: &str) -> Result<Version> {
    let Some(caps) = semver_pattern().captures(output) else {
        return Err(Error::Parse {
            what: "version".to_string(),
            message: format!("no x.y.z version in {:?}", output.trim()),
        });
    };
    let matched = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
    Version::parse(matched).map_err(|e| Error::Parse {
        what: "version".to_string(),
        message: e.to_string(),
    })
}

/// Parse a version that may have fewer than three components.
///
/// Missing components are zero and leading zeros are dropped, so `22.04`
/// becomes `22.4.0` and `13` becomes `13.0.0`. Returns `None` if the text
/// has no digits.
pub fn lenient_version(text: &str) -> Option<Version> {
    let caps = lenient_pattern().captures(text.trim().trim_start_matches('v'))?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// Whitespace-separated field `index` of the first line of `output`.
///
/// Falls back to the whole trimmed output when the first line is too
/// short, so unrecognised formats still yield something displayable.
pub fn whitespace_field(output: &str, index: usize) -> String {
    let first_line = output.lines().next().unwrap_or_default();
    first_line
        .split_whitespace()
        .nth(index)
        .map(str::to_string)
        .unwrap_or_else(|| output.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gpg_version() {
        let result = parse_version("gpg (GnuPG) 2.4.4\nlibgcrypt 1.10.3").unwrap();
        assert_eq!(result, Version::new(2, 4, 4));
    }

    #[test]
    fn test_parse_version_multiline() {
        let output = "My Tool\nVersion: 1.0.0\nBuilt on 2025-01-01";
        assert_eq!(parse_version(output).unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn test_parse_version_no_match() {
        assert!(matches!(
            parse_version("no version here"),
            Err(Error::Parse { .. })
        ));
        assert!(parse_version("version 1.2").is_err());
    }

    #[test]
    fn test_lenient_version() {
        assert_eq!(lenient_version("22.04"), Some(Version::new(22, 4, 0)));
        assert_eq!(lenient_version("13"), Some(Version::new(13, 0, 0)));
        assert_eq!(lenient_version("v2.2.1"), Some(Version::new(2, 2, 1)));
        assert_eq!(lenient_version("14.5.1"), Some(Version::new(14, 5, 1)));
        assert_eq!(lenient_version("rolling"), None);
        assert_eq!(lenient_version(""), None);
    }

    #[test]
    fn test_whitespace_field() {
        assert_eq!(whitespace_field("apt 2.4.8 (amd64)\n", 1), "2.4.8");
        assert_eq!(whitespace_field("gpg (GnuPG) 2.2.27\nlibgcrypt 1.9", 2), "2.2.27");
        assert_eq!(whitespace_field("weird\nsecond line", 1), "weird\nsecond line");
        assert_eq!(whitespace_field("", 1), "");
    }
}
