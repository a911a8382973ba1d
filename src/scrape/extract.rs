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

//! Video URL extraction strategies
//!
//! The pages are not an API: markup and inline scripts change without
//! notice, and the same page looks different before and after the player
//! script runs. Strategies are tried in order and the first one that yields
//! anything wins:
//!
//! 1. **Script variable** - a JSON object literal assigned to a known
//!    variable (`var seriesepisode_respose = {...}`), holding
//!    `video_url: [{"android": ...}, {"ios": ...}]`.
//! 2. **Media tag** - `<video><source src label>` markup. video.js renames
//!    the element id to `<id>_html5_api` once it initialises, so both
//!    spellings are tried before falling back to the first `<video>`.
//! 3. **Iframe embed** - player iframes carrying the file in a `source=`
//!    query parameter, plus a raw-text scan for encoded `source=` values.
//! 4. **Attribute fallback** - a data attribute on the player container.
//!    Results are flagged low-confidence.
//!
//! A malformed script payload does not stop the later strategies; it is
//! only reported if nothing else is found.

use crate::error::{EngineError, Result};
use crate::scrape::models::ExtractionMethod;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

/// `<video>` selectors, most specific first
const VIDEO_SELECTORS: &[&str] = &[
    "video#videoTag",
    "video#videoTag_html5_api",
    "video#my-video",
    "video#my-video_html5_api",
    "video.video-js",
    "video",
];

/// Attributes that carry a human quality label on `<source>`
const QUALITY_ATTRIBUTES: &[&str] = &["label", "res", "size", "title", "data-quality"];

/// Player containers checked by the attribute fallback
const FALLBACK_CONTAINERS: &[&str] = &["#player", ".player", "#video-player", ".video-container"];
const FALLBACK_ATTRIBUTES: &[&str] = &["data-video-url", "data-video", "data-src"];

/// Preferred platform keys inside a `video_url` entry
const PLATFORM_PREFERENCE: &[&str] = &["android", "ios"];

/// One extracted URL before normalization and ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub quality: String,
    pub url: String,
    pub method: ExtractionMethod,
}

impl Candidate {
    fn new(quality: impl Into<String>, url: impl Into<String>, method: ExtractionMethod) -> Self {
        Self {
            quality: quality.into(),
            url: url.into(),
            method,
        }
    }
}

/// What the strategies produced for one page
#[derive(Debug, Default)]
pub struct Extraction {
    pub candidates: Vec<Candidate>,
    /// Set when a script payload was found but could not be read
    pub parse_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Extractor {
    script_variables: Vec<String>,
}

impl Extractor {
    pub fn new(script_variables: Vec<String>) -> Self {
        Self { script_variables }
    }

    /// Run the strategies against a page. Never fails; parse problems are
    /// carried in [`Extraction::parse_error`].
    pub fn extract(&self, html: &str, page_url: &Url) -> Extraction {
        let doc = Html::parse_document(html);
        let mut extraction = Extraction::default();

        match self.from_script_variables(&doc) {
            Ok(candidates) if !candidates.is_empty() => {
                extraction.candidates = resolve_all(candidates, page_url);
                if !extraction.candidates.is_empty() {
                    return extraction;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(page = %page_url, error = %e, "script payload unreadable, trying markup");
                extraction.parse_error = Some(e.to_string());
            }
        }

        let fallbacks: [(&str, Vec<Candidate>); 3] = [
            ("media tag", from_media_tag(&doc)),
            ("iframe embed", from_iframe_embed(&doc, html)),
            ("attribute", from_container_attribute(&doc)),
        ];

        for (name, candidates) in fallbacks {
            let resolved = resolve_all(candidates, page_url);
            if !resolved.is_empty() {
                tracing::debug!(page = %page_url, strategy = name, count = resolved.len(), "extracted");
                extraction.candidates = resolved;
                return extraction;
            }
        }

        extraction
    }

    fn from_script_variables(&self, doc: &Html) -> Result<Vec<Candidate>> {
        let script_selector = selector("script");

        for script in doc.select(&script_selector) {
            let text: String = script.text().collect();
            for variable in &self.script_variables {
                if let Some(literal) = find_assigned_literal(&text, variable)? {
                    let payload: Value = serde_json::from_str(literal).map_err(|e| {
                        EngineError::ParseError(format!("{} is not valid JSON: {}", variable, e))
                    })?;
                    return read_video_url_list(&payload, variable);
                }
            }
        }

        Ok(Vec::new())
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(vec!["seriesepisode_respose".to_string()])
    }
}

/// Locate `<variable> = {...}` (or `[...]`) in script text and return the
/// balanced literal. `Ok(None)` when the variable is not assigned here.
fn find_assigned_literal<'a>(script: &'a str, variable: &str) -> Result<Option<&'a str>> {
    let mut search_from = 0;

    while let Some(found) = script[search_from..].find(variable) {
        let name_end = search_from + found + variable.len();
        search_from = name_end;

        // Reject longer identifiers that merely start with the name
        if script[name_end..]
            .chars()
            .next()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            continue;
        }

        let rest = script[name_end..].trim_start();
        let Some(after_eq) = rest.strip_prefix('=') else {
            continue;
        };
        if after_eq.starts_with('=') {
            // comparison, not assignment
            continue;
        }

        let value = after_eq.trim_start();
        let start = script.len() - value.len();
        return match balanced_literal(value) {
            Some(len) => Ok(Some(&script[start..start + len])),
            None => Err(EngineError::ParseError(format!(
                "{} literal is not terminated",
                variable
            ))),
        };
    }

    Ok(None)
}

/// Length of the JSON object/array literal at the start of `text`, honouring
/// strings and escapes. `None` if it does not open with `{`/`[` or never
/// closes.
fn balanced_literal(text: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    let (_, open) = chars.next()?;
    if open != '{' && open != '[' {
        return None;
    }

    let mut depth = 1usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (i, c) in chars {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => in_string = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Pick one URL out of `video_url`: the first `android` entry, else the
/// first `ios` entry, else the first URL-looking value under any key.
fn read_video_url_list(payload: &Value, variable: &str) -> Result<Vec<Candidate>> {
    let list = match payload.get("video_url") {
        Some(Value::Array(entries)) => entries.clone(),
        Some(Value::Object(_)) => vec![payload["video_url"].clone()],
        Some(Value::String(url)) => {
            return Ok(non_empty(url)
                .map(|u| vec![Candidate::new("", u, ExtractionMethod::ScriptVariable)])
                .unwrap_or_default());
        }
        Some(Value::Null) => return Ok(Vec::new()),
        Some(other) => {
            return Err(EngineError::ParseError(format!(
                "{}.video_url has unexpected type: {}",
                variable,
                json_type(other)
            )))
        }
        None => {
            return Err(EngineError::ParseError(format!(
                "{} has no video_url field",
                variable
            )))
        }
    };

    let quality_of = |entry: &Value| {
        ["quality", "label"]
            .iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_str))
            .unwrap_or("")
            .to_string()
    };

    for platform in PLATFORM_PREFERENCE {
        for entry in &list {
            if let Some(url) = entry.get(*platform).and_then(Value::as_str).and_then(non_empty) {
                return Ok(vec![Candidate::new(
                    quality_of(entry),
                    url,
                    ExtractionMethod::ScriptVariable,
                )]);
            }
        }
    }

    for entry in &list {
        if let Some(map) = entry.as_object() {
            let other = map
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "quality" | "label"))
                .filter_map(|(_, value)| value.as_str())
                .find(|value| looks_like_url(value));
            if let Some(url) = other {
                return Ok(vec![Candidate::new(
                    quality_of(entry),
                    url,
                    ExtractionMethod::ScriptVariable,
                )]);
            }
        }
    }

    Ok(Vec::new())
}

fn from_media_tag(doc: &Html) -> Vec<Candidate> {
    let source_selector = selector("source");

    for css in VIDEO_SELECTORS {
        let video_selector = selector(css);
        for video in doc.select(&video_selector) {
            let mut candidates: Vec<Candidate> = video
                .select(&source_selector)
                .filter_map(|source| {
                    let src = source.value().attr("src").and_then(non_empty)?;
                    Some(Candidate::new(quality_label(&source), src, ExtractionMethod::MediaTag))
                })
                .collect();

            if let Some(src) = video.value().attr("src").and_then(non_empty) {
                candidates.push(Candidate::new(quality_label(&video), src, ExtractionMethod::MediaTag));
            }

            candidates.retain(|c| !c.url.starts_with("blob:"));
            if !candidates.is_empty() {
                return candidates;
            }
        }
    }

    Vec::new()
}

fn from_iframe_embed(doc: &Html, html: &str) -> Vec<Candidate> {
    let iframe_selector = selector("iframe");
    let mut candidates = Vec::new();

    for iframe in doc.select(&iframe_selector) {
        let src = iframe
            .value()
            .attr("src")
            .or_else(|| iframe.value().attr("data-src"))
            .unwrap_or("");
        if !src.contains("source=") {
            continue;
        }

        // Relative player paths still carry the query we want
        let parsed = Url::parse(src).or_else(|_| Url::parse("https://player.invalid/")?.join(src));
        if let Ok(parsed) = parsed {
            if let Some((_, value)) = parsed.query_pairs().find(|(k, _)| k == "source") {
                if looks_like_url(&value) {
                    candidates.push(Candidate::new(
                        detect_quality(&value),
                        value.into_owned(),
                        ExtractionMethod::IframeEmbed,
                    ));
                }
            }
        }
    }

    for capture in encoded_source_pattern().captures_iter(html) {
        let Ok(decoded) = urlencoding::decode(&capture[1]) else {
            continue;
        };
        let lower = decoded.to_ascii_lowercase();
        if decoded.starts_with("http") && (lower.contains(".mp4") || lower.contains(".m3u8")) {
            candidates.push(Candidate::new(
                detect_quality(&decoded),
                decoded.into_owned(),
                ExtractionMethod::IframeEmbed,
            ));
        }
    }

    candidates
}

fn from_container_attribute(doc: &Html) -> Vec<Candidate> {
    for css in FALLBACK_CONTAINERS {
        let container_selector = selector(css);
        for container in doc.select(&container_selector) {
            for attribute in FALLBACK_ATTRIBUTES {
                if let Some(url) = container.value().attr(attribute).and_then(non_empty) {
                    if looks_like_url(url) {
                        return vec![Candidate::new(
                            quality_label(&container),
                            url,
                            ExtractionMethod::AttributeFallback,
                        )];
                    }
                }
            }
        }
    }

    Vec::new()
}

/// Guess a label from the file name, for sources that carry none
pub fn detect_quality(url: &str) -> String {
    let file_name = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_ascii_lowercase();

    let label = if file_name.contains("1080") || file_name.contains("fhd") {
        "1080p"
    } else if file_name.contains("720") || file_name.contains("hd") {
        "720p"
    } else if file_name.contains("480") {
        "480p"
    } else if file_name.contains("360") {
        "360p"
    } else {
        ""
    };
    label.to_string()
}

fn resolve_all(candidates: Vec<Candidate>, page_url: &Url) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter_map(|mut candidate| match page_url.join(candidate.url.trim()) {
            Ok(absolute) if matches!(absolute.scheme(), "http" | "https") => {
                if absolute.as_str() != candidate.url {
                    candidate.url = absolute.to_string();
                }
                Some(candidate)
            }
            _ => {
                tracing::debug!(url = %candidate.url, "dropping unusable candidate");
                None
            }
        })
        .collect()
}

fn quality_label(element: &ElementRef) -> String {
    QUALITY_ATTRIBUTES
        .iter()
        .find_map(|attr| element.value().attr(attr).and_then(non_empty))
        .unwrap_or("")
        .to_string()
}

fn looks_like_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://") || value.starts_with("//")
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn encoded_source_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"source=([^&'"\s<>]+)"#).expect("static regex"))
}
