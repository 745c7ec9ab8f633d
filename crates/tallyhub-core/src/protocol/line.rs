//! Observation line protocol (JSON, one observation per line).
//!
//! Client libraries push `["metric","label_name","label_value","0.142857"]`
//! followed by `\n`. The duration is in seconds and may be sent either as a
//! JSON string or a number.

use serde::Deserialize;

use crate::error::{Result, TallyError};
use crate::registry::Registry;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawLine(String, String, String, Seconds);

/// One decoded observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationLine {
    pub metric: String,
    pub label_name: String,
    pub label_value: String,
    pub seconds: f64,
}

impl ObservationLine {
    /// Record this observation in `registry`.
    pub fn apply(&self, registry: &Registry) {
        registry.observe(&self.metric, &self.label_name, &self.label_value, self.seconds);
    }
}

/// Decode one line (without its trailing newline).
pub fn decode_line(line: &str) -> Result<ObservationLine> {
    let RawLine(metric, label_name, label_value, seconds) = serde_json::from_str(line)
        .map_err(|e| TallyError::BadRequest(format!("invalid observation line: {e}")))?;

    let seconds = match seconds {
        Seconds::Number(v) => v,
        Seconds::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| TallyError::BadRequest(format!("invalid duration {s:?}")))?,
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TallyError::BadRequest(format!("duration out of range: {seconds}")));
    }
    if metric.is_empty() {
        return Err(TallyError::BadRequest("metric name must not be empty".into()));
    }

    Ok(ObservationLine { metric, label_name, label_value, seconds })
}
