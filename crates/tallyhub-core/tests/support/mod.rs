//! Snapshot vectors under `tests/vectors`.

use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotVector {
    pub description: String,
    pub frame: Frame,
    #[serde(default)]
    pub expect: Option<Expect>,
    #[serde(default)]
    pub expect_error: Option<ExpectError>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expect {
    pub boundaries: Vec<String>,
    pub keys: usize,
    #[serde(default)]
    pub render: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectError {
    pub code: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "lowercase")]
pub enum Frame {
    Hex(String),
    Base64(String),
}

impl Frame {
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Frame::Hex(s) => hex::decode(s).expect("invalid hex in vector"),
            Frame::Base64(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .expect("invalid base64 in vector"),
        }
    }
}

pub fn load(name: &str) -> SnapshotVector {
    let path = format!("{}/tests/vectors/{name}", env!("CARGO_MANIFEST_DIR"));
    let raw = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"));
    serde_json::from_str(&raw).unwrap_or_else(|e| panic!("{path}: {e}"))
}
