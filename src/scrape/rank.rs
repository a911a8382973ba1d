//! Quality ranking
//!
//! Labels are free text ("1080p", "HD 720", "FHD", ""), so the score comes
//! from substring matches checked highest resolution first. Anything
//! unrecognized scores 0 and sorts last.

use crate::scrape::models::VideoUrl;

const RESOLUTION_SCORES: &[(&str, u8)] = &[("1080", 4), ("720", 3), ("480", 2), ("360", 1)];

pub fn quality_score(label: &str) -> u8 {
    RESOLUTION_SCORES
        .iter()
        .find(|(needle, _)| label.contains(needle))
        .map(|(_, score)| *score)
        .unwrap_or(0)
}

/// Sort best-first. `sort_by` is stable, so equal scores keep extraction
/// order.
pub fn rank(urls: &mut [VideoUrl]) {
    urls.sort_by(|a, b| quality_score(&b.quality).cmp(&quality_score(&a.quality)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores() {
        assert_eq!(quality_score("1080p"), 4);
        assert_eq!(quality_score("HD 720"), 3);
        assert_eq!(quality_score("480"), 2);
        assert_eq!(quality_score("360p"), 1);
        assert_eq!(quality_score("HD"), 0);
        assert_eq!(quality_score(""), 0);
    }

    #[test]
    fn test_rank_descending_and_stable() {
        let mut urls = vec![
            VideoUrl::new("", "https://a/unknown-1.mp4"),
            VideoUrl::new("480p", "https://a/480.mp4"),
            VideoUrl::new("1080p", "https://a/1080.mp4"),
            VideoUrl::new("HD", "https://a/unknown-2.mp4"),
            VideoUrl::new("720p", "https://a/720.mp4"),
        ];
        rank(&mut urls);

        let order: Vec<&str> = urls.iter().map(|u| u.url.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "https://a/1080.mp4",
                "https://a/720.mp4",
                "https://a/480.mp4",
                "https://a/unknown-1.mp4",
                "https://a/unknown-2.mp4",
            ]
        );
    }
}
