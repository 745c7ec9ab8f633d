//! Binary snapshot vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use tallyhub_core::{Registry, TallyError};

mod support;
use support::load;

#[test]
fn snapshot_vectors() {
    let files = [
        "snapshot_empty.json",
        "snapshot_full.json",
        "snapshot_truncated.json",
        "snapshot_bad_magic.json",
        "snapshot_bad_version.json",
        "snapshot_trailing.json",
        "snapshot_unsorted_bounds.json",
        "snapshot_unknown_bucket.json",
        "snapshot_huge_count.json",
        "snapshot_bad_utf8.json",
    ];

    for f in files {
        let v = load(f);
        let raw = v.frame.bytes();
        let res = Registry::deserialize(&raw);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            let TallyError::Decode(d) = e else {
                panic!("expected decode error, vector={}", v.description);
            };
            assert_eq!(d.kind(), err.kind, "vector={}", v.description);
            continue;
        }

        let reg = res.expect("expected ok snapshot");
        let ex = v.expect.expect("missing expect block");

        let names: Vec<String> = reg.boundaries().iter().map(|b| b.name.clone()).collect();
        assert_eq!(names, ex.boundaries, "vector={}", v.description);
        assert_eq!(reg.len(), ex.keys, "vector={}", v.description);

        if let Some(text) = ex.render {
            assert_eq!(reg.render(), text, "vector={}", v.description);
        }

        // Re-encoding a decoded snapshot is byte-stable.
        assert_eq!(reg.serialize().as_ref(), raw.as_slice(), "vector={}", v.description);
    }
}

#[test]
fn failed_decode_leaves_target_untouched() {
    let reg = Registry::new();
    reg.inc_counter("hits", "code", "200", 5);
    reg.observe("req", "path", "/a", 0.3);
    let before = reg.render();

    let mut blob = reg.serialize().to_vec();
    blob.truncate(blob.len() - 3);

    assert!(reg.deserialize_into(&blob).is_err());
    assert!(reg.deserialize_into(b"TLLY").is_err());
    assert_eq!(reg.render(), before);
}

#[test]
fn deserialize_into_replaces_state() {
    let src = Registry::with_buckets(&[0.1, 1.0]).unwrap();
    src.observe("req", "path", "/a", 0.05);

    let dst = Registry::new();
    dst.inc_counter("hits", "code", "200", 1);
    dst.deserialize_into(&src.serialize()).unwrap();

    assert_eq!(dst.render(), src.render());
    assert_eq!(dst.boundaries().len(), 2);
    assert!(dst.metric_set("hits", "code").is_none());
}

#[test]
fn round_trip_renders_identically() {
    let reg = Registry::new();
    reg.inc_counter("http_requests", "status", "200", 41);
    reg.inc_counter("http_requests", "status", "404", 2);
    reg.observe("database_calls", "file", "file.php@L123", 0.142857);
    reg.observe("database_calls", "file", "other.php@L9", 3.5);
    reg.observe("database_calls", "file", "file.php@L123", 42.0);
    reg.observe("quoted", "v", "say \"hi\"\\", 0.001);

    let back = Registry::deserialize(&reg.serialize()).unwrap();
    assert_eq!(back.render(), reg.render());
    assert_eq!(back.keys(), reg.keys());
}
