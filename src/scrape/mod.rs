//! Source resolution
//!
//! Turns a movie or episode page URL into a ranked list of playable media
//! URLs, spaced by a shared [`RateLimiter`] and memoized in a
//! [`ResultCache`].

pub mod cache;
pub mod cdn;
pub mod extract;
pub mod fetcher;
pub mod models;
pub mod rank;
pub mod rate_limiter;
pub mod scraper;

pub use cache::ResultCache;
pub use cdn::CdnNormalizer;
pub use extract::{detect_quality, Extractor};
pub use fetcher::{build_http_client, PageFetcher};
pub use models::{ExtractionMethod, ScraperOutcome, VideoUrl};
pub use rank::{quality_score, rank};
pub use rate_limiter::RateLimiter;
pub use scraper::VideoUrlScraper;
