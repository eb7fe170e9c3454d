//! End-to-end tests for the stream proxy.
//!
//! Starts a real Axum server on a random port with wiremock standing in for
//! the upstream origins, then drives the full HTTP pipeline: admission,
//! origin probing, playlist rewriting, token round-trips, and media
//! pass-through.

use hlsgate::config::{Config, RewriteMode};
use hlsgate::server::build_router;
use std::net::SocketAddr;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MASTER_BODY: &str = "#EXTM3U\nseg1.ts\nseg2.ts\n";

const MEDIA_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:4\n\
#EXTINF:4.0,\n\
seg1.ts\n\
#EXTINF:4.0,\n\
seg2.ts\n\
#EXT-X-ENDLIST\n";

fn test_config(origins: Vec<String>) -> Config {
    Config {
        port: 0,
        public_base_url: String::new(),
        origin_urls: origins,
        allowed_domains: Vec::new(),
        user_agent: "hlsgate-test".to_string(),
        referer: "https://front.example.com/".to_string(),
        is_dev: true,
        rewrite_mode: RewriteMode::Token,
        master_ttl: Duration::from_secs(7200),
        segment_ttl: Duration::from_secs(600),
        probe_timeout: Duration::from_secs(2),
        playlist_timeout: Duration::from_secs(5),
        media_timeout: Duration::from_secs(5),
        rate_limit_rpm: 0,
        image_base_url: None,
    }
}

async fn start_server(config: Config) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let app = build_router(config).await;

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

// ── Path mode: probing + rewrite ────────────────────────────────────────────

#[tokio::test]
async fn path_mode_falls_back_to_second_origin_and_rewrites() {
    let origin_a = MockServer::start().await;
    let origin_b = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin_a)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie1/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_BODY))
        .mount(&origin_b)
        .await;

    let mut config = test_config(vec![origin_a.uri(), origin_b.uri()]);
    config.rewrite_mode = RewriteMode::Direct;
    let addr = start_server(config).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("path", "movie1/master.m3u8")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/vnd.apple.mpegurl"
    );
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "public, max-age=30"
    );

    let body = resp.text().await.unwrap();
    let lines: Vec<&str> = body.split('\n').collect();
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[1], "/stream?path=movie1%2Fseg1.ts");
    assert_eq!(lines[2], "/stream?path=movie1%2Fseg2.ts");

    assert!(
        !origin_a.received_requests().await.unwrap().is_empty(),
        "Origin A should have been probed first"
    );
}

#[tokio::test]
async fn rewritten_path_reference_round_trips_to_segment() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/movie1/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_BODY))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie1/seg1.ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("seg-one".as_bytes().to_vec(), "video/mp2t"),
        )
        .mount(&origin)
        .await;

    let mut config = test_config(vec![origin.uri()]);
    config.rewrite_mode = RewriteMode::Direct;
    let addr = start_server(config).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("path", "movie1/master.m3u8")])
        .send()
        .await
        .unwrap();
    let body = resp.text().await.unwrap();
    let reference = body
        .split('\n')
        .find(|l| l.starts_with("/stream?"))
        .expect("rewritten reference expected");

    // Follow the emitted reference exactly as a player would
    let resp = client
        .get(format!("http://{}{}", addr, reference))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "video/mp2t");
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "public, max-age=300"
    );
    assert_eq!(resp.text().await.unwrap(), "seg-one");
}

#[tokio::test]
async fn path_mode_exhaustion_propagates_last_status() {
    let origin_a = MockServer::start().await;
    let origin_b = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&origin_a)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin_b)
        .await;

    let addr = start_server(test_config(vec![origin_a.uri(), origin_b.uri()])).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("path", "missing/master.m3u8")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let body = resp.text().await.unwrap();
    assert!(
        !body.contains("127.0.0.1"),
        "Upstream identity must not leak, got: {}",
        body
    );
}

// ── Token mode ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn token_mode_hides_origin_and_round_trips() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/movie1/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_BODY))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie1/seg1.ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("seg-one")
                .insert_header("content-type", "video/mp2t"),
        )
        .mount(&origin)
        .await;

    let addr = start_server(test_config(vec![origin.uri()])).await;
    let client = reqwest::Client::new();

    let master_url = format!("{}/movie1/master.m3u8", origin.uri());
    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("url", master_url.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();

    // The security boundary: nothing about the origin appears in the output
    assert!(
        !body.contains(&origin.uri()),
        "Origin URL leaked into rewritten playlist:\n{}",
        body
    );
    assert!(!body.contains("seg1.ts"), "Segment name leaked:\n{}", body);

    let references: Vec<&str> = body
        .split('\n')
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    assert_eq!(references.len(), 2);
    for reference in &references {
        assert!(
            reference.starts_with("/stream?t="),
            "Expected token reference, got: {}",
            reference
        );
    }

    // Follow the first token reference to the segment
    let resp = client
        .get(format!("http://{}{}", addr, references[0]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "seg-one");
}

#[tokio::test]
async fn unknown_token_is_a_404() {
    let addr = start_server(test_config(vec!["http://127.0.0.1:9".to_string()])).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/stream?t=0011223344556677", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}

// ── Branch decision ─────────────────────────────────────────────────────────

#[tokio::test]
async fn mpegurl_content_type_triggers_rewrite_without_m3u8_suffix() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stream/live"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("#EXTM3U\nseg1.ts\n".as_bytes().to_vec(), "application/x-mpegurl"),
        )
        .mount(&origin)
        .await;

    let mut config = test_config(vec![origin.uri()]);
    config.rewrite_mode = RewriteMode::Direct;
    let addr = start_server(config).await;
    let client = reqwest::Client::new();

    let live_url = format!("{}/stream/live", origin.uri());
    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("url", live_url.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/vnd.apple.mpegurl"
    );
    let body = resp.text().await.unwrap();
    assert!(
        body.contains("/stream?url="),
        "Line should be rewritten despite missing .m3u8 suffix, got:\n{}",
        body
    );
}

#[tokio::test]
async fn media_passthrough_mirrors_content_type() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/movie1/seg1.ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("binary-ish".as_bytes().to_vec(), "video/mp2t"),
        )
        .mount(&origin)
        .await;

    let addr = start_server(test_config(vec![origin.uri()])).await;
    let client = reqwest::Client::new();

    let seg_url = format!("{}/movie1/seg1.ts", origin.uri());
    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("url", seg_url.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "video/mp2t");
    assert_eq!(resp.text().await.unwrap(), "binary-ish");
}

#[tokio::test]
async fn upstream_error_on_resolved_url_is_502() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&origin)
        .await;

    let addr = start_server(test_config(vec![origin.uri()])).await;
    let client = reqwest::Client::new();

    let seg_url = format!("{}/movie1/seg1.ts", origin.uri());
    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("url", seg_url.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
}

// ── Structural validity ─────────────────────────────────────────────────────

#[tokio::test]
async fn rewritten_playlist_stays_valid_m3u8() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/movie1/index.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MEDIA_PLAYLIST))
        .mount(&origin)
        .await;

    let mut config = test_config(vec![origin.uri()]);
    config.rewrite_mode = RewriteMode::Direct;
    let addr = start_server(config).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("path", "movie1/index.m3u8")])
        .send()
        .await
        .unwrap();
    let body = resp.text().await.unwrap();

    // Line count must match the input exactly
    assert_eq!(body.split('\n').count(), MEDIA_PLAYLIST.split('\n').count());

    let playlist =
        m3u8_rs::parse_playlist_res(body.as_bytes()).expect("Rewritten output must stay valid M3U8");
    let m3u8_rs::Playlist::MediaPlaylist(pl) = playlist else {
        panic!("Expected a MediaPlaylist");
    };
    assert_eq!(pl.segments.len(), 2);
    for segment in &pl.segments {
        assert!(
            segment.uri.starts_with("/stream?"),
            "Segment URI should point at the proxy, got: {}",
            segment.uri
        );
    }
}

// ── Upstream header contract ────────────────────────────────────────────────

#[tokio::test]
async fn upstream_requests_carry_configured_headers() {
    let origin = MockServer::start().await;

    // Mock only matches when both headers arrive
    Mock::given(method("GET"))
        .and(path("/movie1/seg1.ts"))
        .and(header("user-agent", "hlsgate-test"))
        .and(header("referer", "https://front.example.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("seg-one"))
        .mount(&origin)
        .await;

    let addr = start_server(test_config(vec![origin.uri()])).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/stream", addr))
        .query(&[("path", "movie1/seg1.ts")])
        .send()
        .await
        .unwrap();

    assert_eq!(
        resp.status(),
        200,
        "Origin gated on UA/Referer — both must be sent"
    );
}

// ── Image proxy ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn image_proxy_streams_with_long_cache() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/poster.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF])
                .insert_header("content-type", "image/jpeg"),
        )
        .mount(&origin)
        .await;

    let mut config = test_config(vec!["http://127.0.0.1:9".to_string()]);
    config.image_base_url = Some(origin.uri());
    let addr = start_server(config).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/image", addr))
        .query(&[("path", "poster.jpg")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/jpeg");
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "public, max-age=86400"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &[0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn image_proxy_mirrors_404() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin)
        .await;

    let mut config = test_config(vec!["http://127.0.0.1:9".to_string()]);
    config.image_base_url = Some(origin.uri());
    let addr = start_server(config).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/image", addr))
        .query(&[("path", "missing.jpg")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}
