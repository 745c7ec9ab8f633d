//! Binary registry snapshot (panic-free).
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic "TLLY" | version u8
//! u32 n, n x (str name, f64 value)                     boundaries, ascending
//! u32 n, n x set:
//!     str metric, str label
//!     u32 n, n x (str value, u64)                      counters
//!     u32 n, n x (str value, u64)                      duration counts
//!     u32 n, n x (str value, f64)                      duration sums
//!     u32 n, n x (str value, u32 m, m x (str le, u64)) bucket counts
//! str = u32 byte length + utf-8
//! ```
//!
//! Parsing rules:
//! - Never index; every read goes through `Buf` after a `remaining()` check.
//! - Element counts are checked against the bytes left before allocating.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::bucket::{Boundaries, BucketBoundary};
use crate::error::DecodeError;
use crate::registry::{MetricKey, MetricSet, RegistryState};

/// Leading bytes of every snapshot.
pub const MAGIC: &[u8; 4] = b"TLLY";
/// Current layout version.
pub const VERSION: u8 = 1;
/// Content type used when a snapshot travels over HTTP.
pub const CONTENT_TYPE: &str = "application/octet-stream";

// Smallest possible encodings, used to reject counts the input cannot hold.
const MIN_STR: usize = 4;
const MIN_SCALAR_ENTRY: usize = MIN_STR + 8;
const MIN_BUCKET_ENTRY: usize = MIN_STR + 4;
const MIN_SET: usize = 2 * MIN_STR + 4 * 4;

type DecodeResult<T> = std::result::Result<T, DecodeError>;

pub(crate) fn encode(state: &RegistryState) -> Bytes {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);

    put_len(&mut buf, state.boundaries.len());
    for b in state.boundaries.iter() {
        put_str(&mut buf, &b.name);
        buf.put_f64_le(b.value);
    }

    put_len(&mut buf, state.sets.len());
    for (key, set) in &state.sets {
        put_str(&mut buf, &key.name);
        put_str(&mut buf, &key.label);

        put_len(&mut buf, set.counters.len());
        for (v, n) in &set.counters {
            put_str(&mut buf, v);
            buf.put_u64_le(*n);
        }
        put_len(&mut buf, set.duration_counts.len());
        for (v, n) in &set.duration_counts {
            put_str(&mut buf, v);
            buf.put_u64_le(*n);
        }
        put_len(&mut buf, set.duration_sums.len());
        for (v, s) in &set.duration_sums {
            put_str(&mut buf, v);
            buf.put_f64_le(*s);
        }
        put_len(&mut buf, set.bucket_counts.len());
        for (v, buckets) in &set.bucket_counts {
            put_str(&mut buf, v);
            put_len(&mut buf, buckets.len());
            for (le, n) in buckets {
                put_str(&mut buf, le);
                buf.put_u64_le(*n);
            }
        }
    }
    buf.freeze()
}

fn put_len(buf: &mut BytesMut, n: usize) {
    buf.put_u32_le(n as u32);
}

fn put_str(buf: &mut BytesMut, s: &str) {
    put_len(buf, s.len());
    buf.put_slice(s.as_bytes());
}

pub(crate) fn decode(blob: &[u8]) -> DecodeResult<RegistryState> {
    let mut r = Reader { buf: blob };

    if r.take(MAGIC.len())? != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = r.u8()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let boundaries = r.boundaries()?;

    let n = r.count(MIN_SET)?;
    let mut sets = BTreeMap::new();
    for _ in 0..n {
        let key = MetricKey { name: r.string()?, label: r.string()? };
        let set = r.metric_set(&boundaries)?;
        if sets.insert(key, set).is_some() {
            return Err(DecodeError::Malformed("duplicate metric key".into()));
        }
    }

    if r.buf.has_remaining() {
        return Err(DecodeError::TrailingBytes(r.buf.remaining()));
    }
    Ok(RegistryState { boundaries, sets })
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn need(&self, needed: usize) -> DecodeResult<()> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(DecodeError::Truncated { needed, remaining });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        let buf: &'a [u8] = self.buf;
        let head = buf
            .get(..n)
            .ok_or(DecodeError::Truncated { needed: n, remaining: buf.len() })?;
        self.buf.advance(n);
        Ok(head)
    }

    fn u8(&mut self) -> DecodeResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self) -> DecodeResult<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    fn u64(&mut self) -> DecodeResult<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    fn f64(&mut self) -> DecodeResult<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Element count, rejected when `min_size`-byte elements could not fit.
    fn count(&mut self, min_size: usize) -> DecodeResult<usize> {
        let n = self.u32()? as usize;
        self.need(n.saturating_mul(min_size))?;
        Ok(n)
    }

    fn string(&mut self) -> DecodeResult<String> {
        let n = self.u32()? as usize;
        let raw = self.take(n)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    fn boundaries(&mut self) -> DecodeResult<Boundaries> {
        let n = self.count(MIN_STR + 8)?;
        let mut list: Vec<BucketBoundary> = Vec::with_capacity(n);
        for _ in 0..n {
            let name = self.string()?;
            let value = self.f64()?;
            if !value.is_finite() {
                return Err(DecodeError::Malformed(format!("non-finite boundary {name}")));
            }
            if let Some(prev) = list.last() {
                if prev.value >= value {
                    return Err(DecodeError::Malformed("boundaries not strictly ascending".into()));
                }
            }
            if name.is_empty() || list.iter().any(|b| b.name == name) {
                return Err(DecodeError::Malformed(format!("invalid boundary name {name:?}")));
            }
            list.push(BucketBoundary { name, value });
        }
        Ok(Boundaries::from_validated(list))
    }

    fn metric_set(&mut self, boundaries: &Boundaries) -> DecodeResult<MetricSet> {
        let counters = self.scalar_map(Self::u64)?;
        let duration_counts = self.scalar_map(Self::u64)?;
        let duration_sums = self.scalar_map(Self::f64)?;

        let n = self.count(MIN_BUCKET_ENTRY)?;
        let mut bucket_counts = BTreeMap::new();
        for _ in 0..n {
            let value = self.string()?;
            let buckets = self.scalar_map(Self::u64)?;
            if let Some(le) = buckets.keys().find(|le| !boundaries.contains_name(le)) {
                return Err(DecodeError::Malformed(format!("bucket {le:?} has no boundary")));
            }
            if bucket_counts.insert(value, buckets).is_some() {
                return Err(DecodeError::Malformed("duplicate bucket label value".into()));
            }
        }

        Ok(MetricSet { counters, duration_counts, duration_sums, bucket_counts })
    }

    fn scalar_map<V>(
        &mut self,
        read: impl Fn(&mut Self) -> DecodeResult<V>,
    ) -> DecodeResult<BTreeMap<String, V>> {
        let n = self.count(MIN_SCALAR_ENTRY)?;
        let mut map = BTreeMap::new();
        for _ in 0..n {
            let key = self.string()?;
            let value = read(self)?;
            if map.insert(key, value).is_some() {
                return Err(DecodeError::Malformed("duplicate label value".into()));
            }
        }
        Ok(map)
    }
}
