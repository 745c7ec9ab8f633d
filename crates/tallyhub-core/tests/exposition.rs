#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use tallyhub_core::Registry;

#[test]
fn empty_registry_is_just_eof() {
    assert_eq!(Registry::new().render(), "# EOF\n");
}

#[test]
fn full_layout() {
    let reg = Registry::with_buckets(&[0.1, 0.5]).unwrap();
    reg.inc_counter("http_requests", "status", "500", 1);
    reg.inc_counter("http_requests", "status", "200", 7);
    reg.observe("http_requests", "status", "200", 0.05);
    reg.observe("http_requests", "status", "500", 0.25);
    reg.observe("http_requests", "status", "200", 1.5);

    let want = "\
# TYPE http_requests counter
# HELP http_requests A counter of the http requests.
http_requests_total{status=\"200\"} 7
http_requests_total{status=\"500\"} 1
# TYPE http_requests_seconds summary
# UNIT http_requests_seconds seconds
# HELP http_requests_seconds A summary of the http requests.
http_requests_seconds_count{status=\"200\"} 2
http_requests_seconds_sum{status=\"200\"} 1.550
http_requests_seconds_count{status=\"500\"} 1
http_requests_seconds_sum{status=\"500\"} 0.250
# TYPE http_requests_total_seconds histogram
# UNIT http_requests_total_seconds seconds
# HELP http_requests_total_seconds A histogram of the http requests.
http_requests_total_seconds_bucket{le=\"0.1\"} 1
http_requests_total_seconds_bucket{le=\"0.5\"} 2
http_requests_total_seconds_bucket{le=\"+Inf\"} 3
http_requests_total_seconds_sum 1.800
http_requests_total_seconds_count 3
# EOF
";
    assert_eq!(reg.render(), want);
}

#[test]
fn keys_sorted_by_combined_name_and_label() {
    let reg = Registry::new();
    reg.inc_counter("req", "x", "1", 1);
    reg.inc_counter("req_a", "x", "1", 1);
    reg.inc_counter("zeta", "a", "1", 1);
    reg.inc_counter("alpha", "z", "1", 1);
    reg.inc_counter("alpha", "b", "1", 1);

    let text = reg.render();
    let pos = |needle: &str| text.find(needle).unwrap();
    // "req_a|x" < "req|x": '_' sorts below '|'.
    assert!(pos("req_a_total{x=") < pos("req_total{x="));
    assert!(pos("alpha_total{b=") < pos("alpha_total{z="));
    assert!(pos("alpha_total{z=") < pos("req_a_total{x="));
    assert!(pos("req_total{x=") < pos("zeta_total{a="));

    let keys: Vec<String> = reg
        .keys()
        .into_iter()
        .map(|k| format!("{}|{}", k.name, k.label))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn keys_with_colliding_combined_bytes_stay_distinct() {
    let reg = Registry::new();
    reg.inc_counter("a|b", "c", "1", 1);
    reg.inc_counter("a", "b|c", "1", 2);
    assert_eq!(reg.len(), 2);
    assert_eq!(reg.metric_set("a|b", "c").unwrap().counters["1"], 1);
    assert_eq!(reg.metric_set("a", "b|c").unwrap().counters["1"], 2);
}

#[test]
fn non_finite_sums_use_text_format_spelling() {
    let reg = Registry::new();
    reg.observe("slow", "op", "x", f64::INFINITY);
    reg.observe("neg", "op", "x", f64::NEG_INFINITY);
    reg.observe("odd", "op", "x", f64::NAN);

    let text = reg.render();
    assert!(text.contains("slow_seconds_sum{op=\"x\"} +Inf\n"), "{text}");
    assert!(text.contains("slow_total_seconds_sum +Inf\n"));
    assert!(text.contains("neg_seconds_sum{op=\"x\"} -Inf\n"));
    assert!(text.contains("neg_total_seconds_sum -Inf\n"));
    assert!(text.contains("odd_seconds_sum{op=\"x\"} NaN\n"));
    assert!(!text.contains(" inf\n"));
}

#[test]
fn label_values_are_escaped() {
    let reg = Registry::new();
    reg.inc_counter("hits", "path", "a\"b\\c\nd", 2);
    assert!(reg
        .render()
        .contains("hits_total{path=\"a\\\"b\\\\c\\nd\"} 2\n"));
}

#[test]
fn render_is_deterministic() {
    let reg = Registry::new();
    for (i, v) in ["/b", "/a", "/c", "/a"].iter().enumerate() {
        reg.observe("req", "path", v, i as f64 * 0.07);
        reg.inc_counter("hits", "path", v, 1);
    }
    assert_eq!(reg.render(), reg.render());
}

#[test]
fn observations_above_every_bucket_only_count_in_inf() {
    let reg = Registry::with_buckets(&[1.0]).unwrap();
    reg.observe("slow", "op", "x", 30.0);
    let text = reg.render();
    assert!(text.contains("slow_total_seconds_bucket{le=\"1\"} 0\n"));
    assert!(text.contains("slow_total_seconds_bucket{le=\"+Inf\"} 1\n"));
    assert!(text.contains("slow_total_seconds_sum 30.000\n"));
}
