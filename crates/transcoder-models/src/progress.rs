//! Progress samples reported by the encoder.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Field holding the average frames per second.
pub const FPS_FIELD: &str = "fps";
/// Field holding the estimated time remaining.
pub const ETA_FIELD: &str = "eta";

/// Snapshot of encoder-reported progress fields.
///
/// Values are the raw text captured from the encoder's status line.
/// Interpretation is left to consumers; see [`ProgressSample::fps_value`]
/// and [`ProgressSample::eta_duration`] for the common cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProgressSample {
    fields: BTreeMap<String, String>,
}

impl ProgressSample {
    /// Create a sample from the two mandatory fields.
    pub fn new(fps: impl Into<String>, eta: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(FPS_FIELD.to_string(), fps.into());
        fields.insert(ETA_FIELD.to_string(), eta.into());
        Self { fields }
    }

    /// Add an extra named field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Raw average fps text.
    pub fn fps(&self) -> &str {
        self.get(FPS_FIELD).unwrap_or_default()
    }

    /// Raw ETA text.
    pub fn eta(&self) -> &str {
        self.get(ETA_FIELD).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Average fps as a number, if the raw text parses.
    pub fn fps_value(&self) -> Option<f64> {
        self.fps().trim().parse().ok()
    }

    /// ETA as a duration.
    ///
    /// Understands HandBrake's `00h12m34s` form; a bare number is taken as
    /// seconds.
    pub fn eta_duration(&self) -> Option<Duration> {
        parse_eta(self.eta())
    }
}

fn parse_eta(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in text.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'h' | 'm' | 's' => {
                let value: u64 = digits.parse().ok()?;
                digits.clear();
                let unit = match c {
                    'h' => 3600,
                    'm' => 60,
                    _ => 1,
                };
                total = total.checked_add(value.checked_mul(unit)?)?;
            }
            _ => return None,
        }
    }

    // Trailing digits without a unit
    if !digits.is_empty() {
        return None;
    }
    Some(Duration::from_secs(total))
}
