//! Media scan collaborator.
//!
//! `HandBrakeCLI --scan` prints its title/stream report on stderr. The text
//! is handed unmodified to a [`MediaInfoParser`]; this crate never
//! interprets it.

use std::path::Path;

/// Parsed media details with a validity flag.
pub trait MediaDetails {
    fn is_valid(&self) -> bool;
}

/// Turns raw scan output into media details.
pub trait MediaInfoParser {
    type Output: MediaDetails;

    fn parse(&self, path: &Path, scan_output: &str) -> Self::Output;
}

/// Arguments for a scan of `path`, executable excluded.
pub fn scan_args(path: &Path) -> Vec<String> {
    vec![
        "--scan".to_string(),
        "-i".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_args() {
        assert_eq!(
            scan_args(Path::new("/media/in.mkv")),
            vec!["--scan", "-i", "/media/in.mkv"]
        );
    }
}
