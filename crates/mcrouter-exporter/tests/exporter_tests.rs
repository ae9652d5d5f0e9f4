//! Integration Tests for the mcrouter exporter
//!
//! Drives the axum router against a fake mcrouter on a real TCP socket:
//!
//! - Full scrape with per-destination and admin metrics
//! - Partial scrape when a later reader fails
//! - Independent concurrent scrapes

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use mcrouter_exporter::server::{router, AppState};
use mcrouter_exporter::Collector;
use mcrouter_stats::Endpoint;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

// =============================================================================
// Test Fixtures - Fake mcrouter
// =============================================================================

const STATS_ALL_REPLY: &str = "STAT version 41.0.0 mcrouter\r\n\
STAT commandargs --port 5000\r\n\
STAT start_time 1700000000\r\n\
STAT cmd_get_count 2000\r\n\
STAT num_servers_up 1\r\n\
STAT ps_user_time_sec 2\r\n\
STAT ps_system_time_sec 1\r\n\
END\r\n";

const STATS_SERVERS_REPLY: &str =
    "STAT 10.0.0.1:11211:ascii:plain:notcompressed-1000 avg_latency_us:302.991 pending_reqs:0 up:5; found:42\r\n\
END\r\n";

#[derive(Clone, Copy)]
struct FakeMcrouter {
    config_age: &'static str,
}

impl FakeMcrouter {
    fn reply(&self, command: &str) -> String {
        let value = |key: &str, body: &str| format!("VALUE {key} 0 {}\r\n{body}\r\nEND\r\n", body.len());

        match command {
            "stats all" => STATS_ALL_REPLY.to_string(),
            "stats servers" => STATS_SERVERS_REPLY.to_string(),
            "get __mcrouter__.version" => value("__mcrouter__.version", "41.0.0 mcrouter"),
            "get __mcrouter__.config_age" => value("__mcrouter__.config_age", self.config_age),
            "get __mcrouter__.config_file" => value("__mcrouter__.config_file", "/etc/mcrouter.json"),
            "get __mcrouter__.hostid" => value("__mcrouter__.hostid", "987654"),
            "get __mcrouter__.config_md5_digest" => {
                value("__mcrouter__.config_md5_digest", "d41d8cd98f00b204e9800998ecf8427e")
            }
            _ => "END\r\n".to_string(),
        }
    }

    async fn serve(self, stream: TcpStream) {
        let mut stream = BufReader::new(stream);
        let mut command = String::new();

        loop {
            command.clear();
            match stream.read_line(&mut command).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let reply = self.reply(command.trim_end());
            if stream.get_mut().write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }
    }

    async fn spawn(self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(self.serve(stream));
            }
        });

        address
    }
}

fn app(address: &str) -> Router {
    let collector = Collector::new(Endpoint::parse(address), Duration::from_secs(1))
        .with_server_metrics(true)
        .with_admin_requests(true);
    router(AppState::new(collector, "/metrics"))
}

async fn scrape(app: Router) -> String {
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_full_scrape() {
    let address = FakeMcrouter { config_age: "120" }.spawn().await;
    let body = scrape(app(&address)).await;

    assert!(body.contains("mcrouter_up 1\n"));
    assert_eq!(body.matches("# TYPE mcrouter_up gauge").count(), 1);

    assert!(body.contains(r#"mcrouter_version{version="41.0.0 mcrouter"} 1"#));
    assert!(body.contains(r#"mcrouter_commandargs{commandargs="--port 5000"} 1"#));
    assert!(body.contains("mcrouter_start_time_seconds 1700000000\n"));
    assert!(body.contains(r#"mcrouter_command_count{cmd="get"} 2000"#));
    assert!(body.contains(r#"mcrouter_command_count{cmd="set"} 0"#));
    assert!(body.contains(r#"mcrouter_servers{state="up"} 1"#));
    assert!(body.contains("mcrouter_cpu_seconds_total 3\n"));

    let server = r#"server="10.0.0.1:11211:ascii:plain:notcompressed-1000""#;
    assert!(body.contains(&format!("mcrouter_server_duration_us{{{server}}} 302.991")));
    assert!(body.contains(&format!("mcrouter_server_memcached_found_count{{{server}}} 42")));
    assert!(body.contains(&format!("mcrouter_server_memcached_deleted_count{{{server}}} 0")));
    assert!(body.contains(&format!("mcrouter_server_memcached_hard_tko{{{server}}} 0")));

    assert!(body.contains(r#"mcrouter_admin_request_version{version="41.0.0 mcrouter"} 1"#));
    assert!(body.contains("mcrouter_admin_request_config_age 120\n"));
    assert!(body.contains(r#"mcrouter_admin_request_config_file{config_file="/etc/mcrouter.json"} 1"#));
    assert!(body.contains(r#"mcrouter_admin_request_hostid{hostid="987654"} 1"#));
    assert!(body.contains(
        r#"mcrouter_admin_request_config_md5_digest{config_md5_digest="d41d8cd98f00b204e9800998ecf8427e"} 1"#
    ));
}

#[tokio::test]
async fn test_bad_config_age_reports_down_with_partial_metrics() {
    let address = FakeMcrouter { config_age: "yesterday" }.spawn().await;
    let body = scrape(app(&address)).await;

    assert!(body.contains("mcrouter_up 0\n"));
    assert!(!body.contains("mcrouter_up 1"));

    assert!(body.contains(r#"mcrouter_command_count{cmd="get"} 2000"#));
    assert!(body.contains("mcrouter_server_memcached_found_count"));
    assert!(body.contains(r#"mcrouter_admin_request_version{version="41.0.0 mcrouter"} 1"#));
    assert!(!body.contains("mcrouter_admin_request_config_age"));
    assert!(!body.contains("mcrouter_admin_request_hostid"));
}

#[tokio::test]
async fn test_concurrent_scrapes_are_independent() {
    let address = FakeMcrouter { config_age: "120" }.spawn().await;
    let app = app(&address);

    let scrapes: Vec<_> = (0..4).map(|_| tokio::spawn(scrape(app.clone()))).collect();
    for handle in scrapes {
        let body = handle.await.unwrap();
        assert!(body.contains("mcrouter_up 1\n"));
        assert_eq!(body.matches("mcrouter_command_count{cmd=\"get\"}").count(), 1);
    }
}
