//! Integration tests for VideoUrlScraper against a local page server
//!
//! Run with: cargo test --test scraper_integration -- --nocapture

mod common;

use common::FixtureServer;
use farsiflix_core::config::{CdnConfig, ScraperConfig};
use farsiflix_core::scrape::{RateLimiter, ScraperOutcome, VideoUrlScraper};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn scraper_with_interval(interval_ms: u64) -> VideoUrlScraper {
    let config = ScraperConfig {
        min_request_interval_ms: interval_ms,
        request_timeout_secs: 5,
        ..ScraperConfig::default()
    };
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let limiter = Arc::new(RateLimiter::new(config.min_request_interval()));
    VideoUrlScraper::new(client, limiter, &config, CdnConfig::default())
}

fn scraper() -> VideoUrlScraper {
    scraper_with_interval(10)
}

const EPISODE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="fa"><head><title>خانه - قسمت ۱</title></head>
<body>
  <div class="video-js"><video id="videoTag"></video></div>
  <script type="text/javascript">
    var seriesepisode_respose = {"id": 901, "title": "قسمت ۱",
      "video_url": [
        {"ios": "http://iranproud2.net/khaneh/e1-ios.m3u8"},
        {"android": "http://iranproud2.net/khaneh/e1.mp4", "quality": "720p"}
      ]};
    initPlayer(seriesepisode_respose);
  </script>
</body></html>"#;

#[tokio::test]
async fn test_script_payload_with_cdn_rewrite() {
    let server = FixtureServer::start().await;
    server.page("/series/khaneh/episode-1", EPISODE_PAGE);

    println!("\n=== Resolving episode page ===");
    let outcome = scraper()
        .resolve(&server.url("/series/khaneh/episode-1"))
        .await;
    println!("   outcome: {:?}", outcome);

    match outcome {
        ScraperOutcome::Success { urls } => {
            assert_eq!(urls.len(), 1);
            assert_eq!(urls[0].url, "https://negahestan.com/khaneh/e1.mp4");
            assert_eq!(urls[0].quality, "720p");
            assert!(!urls[0].low_confidence);
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_android_entry_without_quality() {
    let server = FixtureServer::start().await;
    server.page(
        "/series/a/episode-1",
        r#"<script>seriesepisode_respose = {"video_url":[{"android":"http://iranproud2.net/a.mp4"},{"ios":"http://iranproud2.net/a.mp4"}]}</script>"#,
    );

    let outcome = scraper().resolve(&server.url("/series/a/episode-1")).await;
    assert_eq!(
        outcome,
        ScraperOutcome::Success {
            urls: vec![farsiflix_core::scrape::VideoUrl::new("", "https://negahestan.com/a.mp4")]
        }
    );
}

#[tokio::test]
async fn test_media_tags_ranked_best_first() {
    let server = FixtureServer::start().await;
    server.page(
        "/movies/film/",
        r#"<video id="my-video_html5_api" class="vjs-tech">
             <source src="/media/film-480.mp4" label="480p">
             <source src="/media/film-1080.mp4" label="1080p">
             <source src="/media/film-720.mp4" label="720p">
             <source src="/media/film-extra.mp4" label="Trailer">
           </video>"#,
    );

    let urls = match scraper().resolve(&server.url("/movies/film/")).await {
        ScraperOutcome::Success { urls } => urls,
        other => panic!("expected success, got {:?}", other),
    };

    let labels: Vec<&str> = urls.iter().map(|u| u.quality.as_str()).collect();
    assert_eq!(labels, vec!["1080p", "720p", "480p", "Trailer"]);
    // Relative sources are resolved against the page
    assert_eq!(urls[0].url, server.url("/media/film-1080.mp4"));
}

#[tokio::test]
async fn test_iframe_embed_and_attribute_fallback() {
    let server = FixtureServer::start().await;
    server.page(
        "/movies/embedded/",
        r#"<div class="player"><iframe src="/jwplayer/?source=https%3A%2F%2Fcdn.farsiland.com%2Fm-1080p.mp4&id=3"></iframe></div>"#,
    );
    server.page(
        "/movies/legacy/",
        r#"<div id="player" data-video-url="https://cdn.farsiland.com/legacy.mp4"></div>"#,
    );

    let scraper = scraper();

    let embedded = scraper.resolve(&server.url("/movies/embedded/")).await;
    let best = embedded.best().expect("iframe source");
    assert_eq!(best.url, "https://cdn.farsiland.com/m-1080p.mp4");
    assert_eq!(best.quality, "1080p");
    assert!(!best.low_confidence);

    let legacy = scraper.resolve(&server.url("/movies/legacy/")).await;
    let best = legacy.best().expect("fallback attribute");
    assert_eq!(best.url, "https://cdn.farsiland.com/legacy.mp4");
    assert!(best.low_confidence);
}

#[tokio::test]
async fn test_page_without_video_is_no_data_and_cached() {
    let server = FixtureServer::start().await;
    server.page("/movies/removed/", "<html><body><h1>این فیلم حذف شده است</h1></body></html>");

    let scraper = scraper();
    let url = server.url("/movies/removed/");

    let first = scraper.resolve(&url).await;
    assert!(matches!(first, ScraperOutcome::NoDataFound { .. }));
    assert!(!first.is_retryable());

    let second = scraper.resolve(&url).await;
    assert_eq!(first, second);
    assert_eq!(server.hits("/movies/removed/"), 1);
}

#[tokio::test]
async fn test_cache_shared_across_scheme_spellings() {
    let server = FixtureServer::start().await;
    server.page("/series/khaneh/episode-1", EPISODE_PAGE);

    let scraper = scraper();
    let http_url = server.url("/series/khaneh/episode-1");
    let https_url = http_url.replacen("http://", "https://", 1);

    let first = scraper.resolve(&http_url).await;
    assert!(matches!(first, ScraperOutcome::Success { .. }));

    // Served from cache; the fixture has no TLS so a fetch would fail
    let second = scraper.resolve(&https_url).await;
    assert_eq!(first, second);
    assert_eq!(server.hits("/series/khaneh/episode-1"), 1);

    scraper.clear_cache().await;
    scraper.resolve(&http_url).await;
    assert_eq!(server.hits("/series/khaneh/episode-1"), 2);
}

#[tokio::test]
async fn test_malformed_payload_is_parse_error_and_refetched() {
    let server = FixtureServer::start().await;
    server.page(
        "/series/broken/episode-2",
        r#"<script>var seriesepisode_respose = {"video_url": [{"android": }]};</script>"#,
    );

    let scraper = scraper();
    let url = server.url("/series/broken/episode-2");

    let outcome = scraper.resolve(&url).await;
    assert!(matches!(outcome, ScraperOutcome::ParseError { .. }), "{:?}", outcome);
    assert!(outcome.is_retryable());

    scraper.resolve(&url).await;
    assert_eq!(server.hits("/series/broken/episode-2"), 2);
}

#[tokio::test]
async fn test_server_error_is_network_error_then_retry_succeeds() {
    let server = FixtureServer::start().await;
    server.page("/series/khaneh/episode-1", EPISODE_PAGE);
    server.fail_next("/series/khaneh/episode-1", 1);

    let scraper = scraper();
    let url = server.url("/series/khaneh/episode-1");

    let failed = scraper.resolve(&url).await;
    assert!(matches!(failed, ScraperOutcome::NetworkError { .. }), "{:?}", failed);
    assert!(failed.is_retryable());

    let retried = scraper.resolve(&url).await;
    assert!(matches!(retried, ScraperOutcome::Success { .. }));
    assert_eq!(server.hits("/series/khaneh/episode-1"), 2);
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let outcome = scraper().resolve("http://127.0.0.1:9/movies/x/").await;
    assert!(matches!(outcome, ScraperOutcome::NetworkError { .. }), "{:?}", outcome);
}

#[tokio::test]
async fn test_malformed_page_url_is_not_retryable() {
    let scraper = scraper();

    for page_url in ["not a url", "file:///movies/x/"] {
        let outcome = scraper.resolve(page_url).await;
        println!("   {} -> {:?}", page_url, outcome);
        assert!(matches!(outcome, ScraperOutcome::NoDataFound { .. }), "{:?}", outcome);
        assert!(!outcome.is_retryable());
    }
}

#[tokio::test]
async fn test_requests_are_spaced_by_rate_limiter() {
    let server = FixtureServer::start().await;
    for i in 0..3 {
        server.page(&format!("/movies/m{}/", i), "<html></html>");
    }

    let scraper = scraper_with_interval(150);
    let started = Instant::now();
    for i in 0..3 {
        scraper.resolve(&server.url(&format!("/movies/m{}/", i))).await;
    }

    // Three distinct pages need at least two full intervals between them
    assert!(started.elapsed() >= Duration::from_millis(300));
}
