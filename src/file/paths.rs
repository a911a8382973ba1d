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

//! Download destination paths
//!
//! ```text
//! <dir>/movies/<title>_<id>.<ext>
//! <dir>/series/<series title>/<episode info>_<id>.<ext>
//! ```
//!
//! The record id is part of every file name, so two titles that sanitize to
//! the same text never share a file.

use crate::download::models::DownloadRequest;
use std::path::{Path, PathBuf};
use url::Url;

/// Byte limit for one path component on every supported filesystem
const MAX_COMPONENT_LENGTH: usize = 255;

/// Extensions accepted from the media URL
const KNOWN_EXTENSIONS: &[&str] = &["mp4", "mkv", "m4v", "mov", "webm", "avi", "ts", "m3u8"];

const DEFAULT_EXTENSION: &str = "mp4";

/// Destination for a request's media file
pub fn destination_for(base: &Path, request: &DownloadRequest, video_url: &str) -> PathBuf {
    let extension = extension_from_url(video_url);
    let id = request.id();

    match request {
        DownloadRequest::Movie { title, .. } => base
            .join("movies")
            .join(file_name(title, &id, &extension)),
        DownloadRequest::Episode {
            series_title,
            episode_info,
            ..
        } => base
            .join("series")
            .join(sanitize_path_component(series_title))
            .join(file_name(episode_info, &id, &extension)),
    }
}

fn file_name(label: &str, id: &str, extension: &str) -> String {
    let suffix = format!("_{}.{}", id, extension);
    let stem = truncate_component(
        &sanitize_path_component(label),
        MAX_COMPONENT_LENGTH.saturating_sub(suffix.len()),
    );
    format!("{}{}", stem, suffix)
}

/// Lowercased extension of the URL path if it is a known media type,
/// otherwise `mp4`
pub fn extension_from_url(video_url: &str) -> String {
    let path = match Url::parse(video_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => video_url.split(['?', '#']).next().unwrap_or("").to_string(),
    };

    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Make a title safe as a single file or directory name. Persian text is
/// kept as is; separators and characters reserved on Windows/Android
/// storage are replaced.
pub fn sanitize_path_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' => '＜',
            '>' => '＞',
            ':' => '_',
            '"' => '＂',
            '|' => '⏐',
            '?' => '？',
            '*' => '✱',
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let mut result = replaced.trim().trim_matches('.').trim().to_string();

    if is_windows_reserved(&result) {
        result = format!("_{}", result);
    }

    if result.is_empty() {
        result = "untitled".to_string();
    }

    truncate_component(&result, MAX_COMPONENT_LENGTH)
}

fn is_windows_reserved(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let upper = name.to_uppercase();
    let stem = upper.split('.').next().unwrap_or("");
    RESERVED.contains(&stem)
}

/// Cut to at most `max_bytes` on a char boundary
pub fn truncate_component(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut index = max_bytes;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    text[..index].trim_end().to_string()
}
