//! HandBrakeCLI progress line parsing.

use regex::Regex;
use std::sync::LazyLock;
use transcoder_models::{ProgressSample, ETA_FIELD, FPS_FIELD};

/// Matches the average-fps / ETA fragment of HandBrake's status line, e.g.
/// `Encoding: task 1 of 1, 45.67 % (78.90 fps, avg 80.12 fps, ETA 00h05m12s)`.
static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*avg (?P<fps>.+?) fps.*ETA\s(?P<eta>.+?)\)").unwrap()
});

/// Extract a progress sample from one line of encoder output.
///
/// Returns `None` for the many lines that carry no progress (banners,
/// warnings, scan output). Captured values are returned verbatim.
pub fn extract_progress(line: &str) -> Option<ProgressSample> {
    let caps = STATUS_RE.captures(line)?;
    let fps = caps.name(FPS_FIELD)?.as_str();
    let eta = caps.name(ETA_FIELD)?.as_str();
    Some(ProgressSample::new(fps, eta))
}
