#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use tallyhub_core::Registry;
use tallyhub_gateway::{app_state::AppState, config, ingest};

async fn start() -> (AppState, std::net::SocketAddr) {
    let cfg = config::load_from_str(
        "version: 1\ningest: { listen: \"127.0.0.1:0\", max_line_bytes: 128 }\n",
    )
    .unwrap();
    let st = AppState::new(cfg).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(ingest::serve(listener, st.clone()));
    (st, addr)
}

async fn wait_for(reg: &Registry, outcome: &str, n: u64) {
    for _ in 0..200 {
        let seen = reg
            .metric_set("tallyhub_ingest_lines", "outcome")
            .and_then(|s| s.counters.get(outcome).copied())
            .unwrap_or(0);
        if seen >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {n} {outcome} lines");
}

#[tokio::test]
async fn lines_are_recorded() {
    let (st, addr) = start().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(
        b"[\"database_calls\",\"file\",\"file.php@L123\",\"0.142857\"]\n\
          garbage\n\
          \n\
          [\"database_calls\",\"file\",\"file.php@L123\",0.5]\r\n\
          [\"database_calls\",\"file\",\"other.php@L1\",\"3\"]",
    )
    .await
    .unwrap();
    conn.shutdown().await.unwrap();

    let reg = st.registry();
    wait_for(&reg, "accepted", 3).await;
    wait_for(&reg, "rejected", 1).await;

    let set = reg.metric_set("database_calls", "file").unwrap();
    assert_eq!(set.duration_counts["file.php@L123"], 2);
    assert_eq!(set.duration_counts["other.php@L1"], 1);
    assert_eq!(set.bucket_count("file.php@L123", "0.25"), 1);
    assert_eq!(set.bucket_count("file.php@L123", "0.5"), 2);
}

#[tokio::test]
async fn over_long_line_closes_connection() {
    let (st, addr) = start().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();

    let long = format!("[\"m\",\"l\",\"{}\",\"1\"]\n", "x".repeat(200));
    conn.write_all(long.as_bytes()).await.unwrap();
    let _ = conn.write_all(b"[\"m\",\"l\",\"v\",\"1\"]\n").await;

    // A fresh connection still works.
    let mut conn2 = TcpStream::connect(addr).await.unwrap();
    conn2.write_all(b"[\"ok\",\"l\",\"v\",\"1\"]\n").await.unwrap();
    conn2.shutdown().await.unwrap();

    let reg = st.registry();
    wait_for(&reg, "accepted", 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(reg.metric_set("ok", "l").is_some());
    assert!(reg.metric_set("m", "l").is_none());
}

#[tokio::test]
async fn serve_returns_once_draining() {
    let (st, _) = start().await;
    st.set_draining();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let served = tokio::spawn(ingest::serve(listener, st.clone()));

    // Returns without waiting for a connection to arrive.
    tokio::time::timeout(Duration::from_secs(2), served)
        .await
        .expect("serve must stop when draining")
        .unwrap();

    // The listener is gone with the task.
    assert!(TcpStream::connect(addr).await.is_err());
}
