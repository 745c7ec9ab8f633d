use std::net::SocketAddr;

use serde::Deserialize;
use tallyhub_core::bucket::{Boundaries, DEFAULT_BUCKETS};
use tallyhub_core::error::{Result, TallyError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub histogram: HistogramSection,

    #[serde(default)]
    pub ingest: Option<IngestSection>,

    #[serde(default)]
    pub aggregate: AggregateSection,
}

impl TallyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TallyError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.histogram.boundaries()?;
        if let Some(ingest) = &self.ingest {
            ingest.validate()?;
        }
        self.aggregate.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Gzip `/metrics` when the scraper accepts it.
    #[serde(default = "default_gzip")]
    pub gzip: bool,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            gzip: default_gzip(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr("gateway.listen", &self.listen)
    }
}

fn default_listen() -> String {
    "0.0.0.0:9090".into()
}
fn default_gzip() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistogramSection {
    /// Bucket upper bounds in seconds; `+Inf` is implicit.
    #[serde(default = "default_buckets")]
    pub buckets: Vec<f64>,
}

impl Default for HistogramSection {
    fn default() -> Self {
        Self { buckets: default_buckets() }
    }
}

impl HistogramSection {
    pub fn boundaries(&self) -> Result<Boundaries> {
        Boundaries::new(&self.buckets)
    }
}

fn default_buckets() -> Vec<f64> {
    DEFAULT_BUCKETS.to_vec()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestSection {
    pub listen: String,

    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl IngestSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(64..=65536).contains(&self.max_line_bytes) {
            return Err(TallyError::BadRequest(
                "ingest.max_line_bytes must be between 64 and 65536".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr("ingest.listen", &self.listen)
    }
}

fn default_max_line_bytes() -> usize {
    4096
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSection {
    /// Base URLs of peers whose `/metrics/snapshot` gets merged in.
    #[serde(default)]
    pub peers: Vec<String>,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AggregateSection {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AggregateSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=3_600_000).contains(&self.interval_ms) {
            return Err(TallyError::BadRequest(
                "aggregate.interval_ms must be between 1000 and 3600000".into(),
            ));
        }
        if !(100..=60_000).contains(&self.timeout_ms) {
            return Err(TallyError::BadRequest(
                "aggregate.timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if self.timeout_ms >= self.interval_ms {
            return Err(TallyError::BadRequest(
                "aggregate.timeout_ms must be less than interval_ms".into(),
            ));
        }
        for peer in &self.peers {
            if !(peer.starts_with("http://") || peer.starts_with("https://")) {
                return Err(TallyError::BadRequest(format!(
                    "aggregate.peers entry must be an http(s) url: {peer}"
                )));
            }
        }
        Ok(())
    }
}

fn default_interval_ms() -> u64 {
    15000
}
fn default_timeout_ms() -> u64 {
    5000
}

fn parse_addr(field: &str, s: &str) -> Result<SocketAddr> {
    s.parse()
        .map_err(|e| TallyError::BadRequest(format!("{field} must be a valid SocketAddr: {e}")))
}
