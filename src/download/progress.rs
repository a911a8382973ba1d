// FarsiFlix - Persian Streaming Engine
// Copyright (C) 2025 FarsiFlix contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Transfer progress tracking
//!
//! Workers call [`ProgressTracker::update`] after every chunk; it answers
//! whether the change is worth publishing. Observers see a new value when the
//! integer percentage moves or when `update_interval` has passed, never on
//! every byte.

use crate::download::models::progress_percent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Progress snapshot for a single download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub id: String,

    /// Bytes on disk, including any resumed prefix
    pub bytes_downloaded: u64,

    /// Total bytes (0 if unknown)
    pub total_bytes: u64,

    /// 0..=99 while transferring
    pub percent: u8,

    /// Bytes per second, moving average
    pub download_speed: f64,

    /// Estimated seconds remaining (0 if unknown)
    pub eta_seconds: u64,
}

impl DownloadProgress {
    pub fn new(id: String, bytes_downloaded: u64, total_bytes: u64) -> Self {
        Self {
            id,
            bytes_downloaded,
            total_bytes,
            percent: progress_percent(bytes_downloaded, total_bytes),
            download_speed: 0.0,
            eta_seconds: 0,
        }
    }

    fn calculate_eta(&mut self) {
        if self.download_speed > 0.0 && self.total_bytes > 0 {
            let remaining = self.total_bytes.saturating_sub(self.bytes_downloaded);
            self.eta_seconds = (remaining as f64 / self.download_speed) as u64;
        } else {
            self.eta_seconds = 0;
        }
    }

    /// e.g. "2.5 MB/s"
    pub fn speed_string(&self) -> String {
        format!("{:.1} MB/s", self.download_speed / 1_000_000.0)
    }

    /// e.g. "5m 30s"
    pub fn eta_string(&self) -> String {
        if self.eta_seconds == 0 {
            return "calculating...".to_string();
        }

        let hours = self.eta_seconds / 3600;
        let minutes = (self.eta_seconds % 3600) / 60;
        let seconds = self.eta_seconds % 60;

        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Sliding-window speed average
#[derive(Debug)]
pub struct SpeedTracker {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
}

impl SpeedTracker {
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(10))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
        }
    }

    /// Record the total byte position at this instant
    pub fn add_position(&mut self, position: u64) {
        let now = Instant::now();
        self.samples.push_back((now, position));

        while let Some((timestamp, _)) = self.samples.front() {
            if now.duration_since(*timestamp) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Bytes per second over the window
    pub fn average_speed(&self) -> f64 {
        let (Some((first_at, first)), Some((last_at, last))) =
            (self.samples.front(), self.samples.back())
        else {
            return 0.0;
        };

        let elapsed = last_at.duration_since(*first_at).as_secs_f64();
        if elapsed > 0.0 {
            last.saturating_sub(*first) as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for SpeedTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    progress: DownloadProgress,
    speed: SpeedTracker,
    last_publish: Instant,
    update_interval: Duration,
}

impl ProgressTracker {
    pub fn new(id: String, bytes_downloaded: u64, total_bytes: u64) -> Self {
        let mut speed = SpeedTracker::new();
        speed.add_position(bytes_downloaded);
        Self {
            progress: DownloadProgress::new(id, bytes_downloaded, total_bytes),
            speed,
            last_publish: Instant::now(),
            update_interval: Duration::from_millis(500),
        }
    }

    /// Record a new byte position. Returns true when observers should be
    /// told.
    pub fn update(&mut self, bytes_downloaded: u64) -> bool {
        let previous_percent = self.progress.percent;

        self.progress.bytes_downloaded = bytes_downloaded;
        self.speed.add_position(bytes_downloaded);
        self.progress.download_speed = self.speed.average_speed();
        self.progress.percent = progress_percent(bytes_downloaded, self.progress.total_bytes);
        self.progress.calculate_eta();

        let now = Instant::now();
        if self.progress.percent != previous_percent
            || now.duration_since(self.last_publish) >= self.update_interval
        {
            self.last_publish = now;
            true
        } else {
            false
        }
    }

    pub fn percent(&self) -> u8 {
        self.progress.percent
    }

    pub fn snapshot(&self) -> DownloadProgress {
        self.progress.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_publishes_on_percent_change_only() {
        let mut tracker = ProgressTracker::new("movie_1".into(), 0, 1_000_000);

        assert!(tracker.update(10_000)); // 0 → 1%
        assert!(!tracker.update(10_500)); // still 1%
        assert!(tracker.update(500_000));
        assert_eq!(tracker.percent(), 50);
    }

    #[test]
    fn test_resumed_tracker_starts_at_offset() {
        let tracker = ProgressTracker::new("movie_1".into(), 250_000, 1_000_000);
        assert_eq!(tracker.snapshot().percent, 25);
        assert_eq!(tracker.snapshot().bytes_downloaded, 250_000);
    }

    #[test]
    fn test_speed_tracker() {
        let mut tracker = SpeedTracker::new();

        tracker.add_position(0);
        thread::sleep(Duration::from_millis(100));
        tracker.add_position(100_000);

        let speed = tracker.average_speed();
        assert!(speed > 500_000.0 && speed < 1_100_000.0);
    }

    #[test]
    fn test_eta_string() {
        let mut progress = DownloadProgress::new("movie_1".into(), 5_000_000, 10_000_000);
        progress.download_speed = 1_000_000.0;
        progress.calculate_eta();
        assert_eq!(progress.eta_seconds, 5);
        assert_eq!(progress.eta_string(), "5s");

        progress.eta_seconds = 330;
        assert_eq!(progress.eta_string(), "5m 30s");
    }
}
