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

//! Bounded outcome cache
//!
//! Entries expire after a fixed TTL and the least recently used entry is
//! evicted once capacity is reached. Keys are always
//! [`CdnNormalizer::cache_key`](crate::scrape::cdn::CdnNormalizer::cache_key)
//! output.

use crate::scrape::models::ScraperOutcome;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: ScraperOutcome,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Front is least recently used
    recency: VecDeque<String>,
}

impl CacheState {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.recency.retain(|k| k != key);
    }
}

#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cached outcome for `key`, if present and not expired
    pub async fn get(&self, key: &str) -> Option<ScraperOutcome> {
        let mut state = self.state.lock().await;

        let expired = match state.entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() >= self.ttl,
            None => return None,
        };

        if expired {
            state.remove(key);
            return None;
        }

        state.touch(key);
        state.entries.get(key).map(|entry| entry.outcome.clone())
    }

    pub async fn insert(&self, key: String, outcome: ScraperOutcome) {
        let mut state = self.state.lock().await;

        if state.entries.contains_key(&key) {
            state.touch(&key);
        } else {
            let ttl = self.ttl;
            let expired: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.stored_at.elapsed() >= ttl)
                .map(|(k, _)| k.clone())
                .collect();
            for k in expired {
                state.remove(&k);
            }

            while state.entries.len() >= self.capacity {
                match state.recency.pop_front() {
                    Some(oldest) => {
                        tracing::trace!(key = %oldest, "evicting cached outcome");
                        state.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            state.recency.push_back(key.clone());
        }

        state.entries.insert(
            key,
            CacheEntry {
                outcome,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.recency.clear();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
