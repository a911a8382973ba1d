//! CDN host normalization
//!
//! Media files referenced by the catalog pages live on hosts that are
//! geo-blocked in most regions; the same paths are served from a mirror.
//! Rules match the host exactly or as a dot-suffix, so a rule for
//! `iranproud2.net` also turns `media.iranproud2.net` into
//! `media.negahestan.com`. Rewritten URLs are upgraded to https.

use crate::config::CdnConfig;
use url::Url;

#[derive(Debug, Clone)]
pub struct CdnNormalizer {
    /// (blocked, working), longest blocked host first
    rules: Vec<(String, String)>,
}

impl CdnNormalizer {
    pub fn new(config: &CdnConfig) -> Self {
        let mut rules: Vec<(String, String)> = config
            .host_rewrites
            .iter()
            .map(|(blocked, working)| (blocked.to_ascii_lowercase(), working.to_ascii_lowercase()))
            .collect();
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { rules }
    }

    /// Rewrite a blocked host to its mirror. Unmatched or unparsable input
    /// is returned unchanged.
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let mut url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(_) => return trimmed.to_string(),
        };

        let mut rewritten = false;
        // A chain a→b→c still settles in one call.
        for _ in 0..=self.rules.len() {
            let host = match url.host_str() {
                Some(h) => h.to_ascii_lowercase(),
                None => break,
            };
            let replacement = match self.rewrite_host(&host) {
                Some(r) => r,
                None => break,
            };
            if url.set_host(Some(&replacement)).is_err() {
                break;
            }
            rewritten = true;
        }

        if !rewritten {
            return trimmed.to_string();
        }

        if url.scheme() == "http" {
            let _ = url.set_scheme("https");
        }
        url.to_string()
    }

    /// Key under which a page's outcome is cached: the normalized URL with
    /// scheme folded to https and the fragment dropped, so `http://` and
    /// `https://` spellings of one page share an entry.
    pub fn cache_key(&self, raw: &str) -> String {
        let normalized = self.normalize(raw);
        match Url::parse(&normalized) {
            Ok(mut url) => {
                if url.scheme() == "http" {
                    let _ = url.set_scheme("https");
                }
                url.set_fragment(None);
                url.to_string()
            }
            Err(_) => normalized,
        }
    }

    fn rewrite_host(&self, host: &str) -> Option<String> {
        self.rules.iter().find_map(|(blocked, working)| {
            if host == blocked {
                Some(working.clone())
            } else {
                host.strip_suffix(blocked.as_str())
                    .filter(|prefix| prefix.ends_with('.'))
                    .map(|prefix| format!("{}{}", prefix, working))
            }
        })
    }
}

impl Default for CdnNormalizer {
    fn default() -> Self {
        Self::new(&CdnConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_blocked_host() {
        let cdn = CdnNormalizer::default();
        assert_eq!(
            cdn.normalize("http://iranproud2.net/a.mp4"),
            "https://negahestan.com/a.mp4"
        );
        assert_eq!(
            cdn.normalize("https://media.iranproud.net/series/ep1.mp4?t=1"),
            "https://media.negahestan.com/series/ep1.mp4?t=1"
        );
    }

    #[test]
    fn test_unmatched_host_unchanged() {
        let cdn = CdnNormalizer::default();
        assert_eq!(cdn.normalize("http://cdn.farsiland.com/x.mp4"), "http://cdn.farsiland.com/x.mp4");
        // suffix must sit on a label boundary
        assert_eq!(cdn.normalize("http://notiranproud.net/x.mp4"), "http://notiranproud.net/x.mp4");
        assert_eq!(cdn.normalize("not a url"), "not a url");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let cdn = CdnNormalizer::default();
        for raw in [
            "http://iranproud2.net/a.mp4",
            "http://media.iranproud.net/b.mp4",
            "https://negahestan.com/c.mp4",
            "http://example.org/d",
            "garbage",
        ] {
            let once = cdn.normalize(raw);
            assert_eq!(cdn.normalize(&once), once, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_chained_rules_settle() {
        let mut config = CdnConfig::default();
        config.host_rewrites.insert("negahestan.com".into(), "mirror.example".into());
        let cdn = CdnNormalizer::new(&config);

        let once = cdn.normalize("http://iranproud2.net/a.mp4");
        assert_eq!(once, "https://mirror.example/a.mp4");
        assert_eq!(cdn.normalize(&once), once);
    }

    #[test]
    fn test_cache_key_folds_scheme() {
        let cdn = CdnNormalizer::default();
        assert_eq!(
            cdn.cache_key("http://namakade.com/series/x/episode-1"),
            cdn.cache_key("https://namakade.com/series/x/episode-1#player")
        );
        assert_eq!(
            cdn.cache_key("http://iranproud2.net/a"),
            cdn.cache_key("https://negahestan.com/a")
        );
    }
}
