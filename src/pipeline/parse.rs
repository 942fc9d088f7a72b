// src/pipeline/parse.rs

//! M3U playlist parsing.
//!
//! The grammar is a sequence of `#EXTINF:` directive lines, each followed by
//! one non-comment URL line. A directive carries zero or more `key="value"`
//! attributes in any order and a display name after the last comma outside
//! double quotes. Anything else is skipped.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::Channel;

const DIRECTIVE_PREFIX: &str = "#EXTINF:";

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z0-9-]+)="([^"]*)""#).expect("valid attribute regex"))
}

/// Parsed pieces of one directive line.
#[derive(Debug)]
struct Directive {
    name: String,
    attributes: BTreeMap<String, String>,
}

/// Parse raw playlist text into candidate channel entries.
///
/// When `apply_filter` is set, an entry is kept only if its name or
/// `group-title` contains one of `region_keywords` (case-insensitively).
/// Malformed directive/URL pairings are skipped; the rest of the playlist is
/// still parsed. Output order carries no downstream meaning.
pub fn parse_playlist(
    text: &str,
    source_name: &str,
    apply_filter: bool,
    region_keywords: &[String],
) -> Vec<Channel> {
    let mut channels = Vec::new();
    let mut pending: Option<Directive> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(DIRECTIVE_PREFIX) {
            if pending.is_some() {
                log::debug!("Directive without URL line in source {}", source_name);
            }
            pending = parse_directive(rest);
            continue;
        }

        if line.starts_with('#') {
            // Unrelated directive between EXTINF and its URL; skip the line.
            continue;
        }

        let Some(directive) = pending.take() else {
            continue;
        };

        let group = directive
            .attributes
            .get("group-title")
            .cloned()
            .unwrap_or_default();

        if apply_filter && !matches_region(&directive.name, &group, region_keywords) {
            continue;
        }

        channels.push(Channel {
            name: directive.name,
            url: line.to_string(),
            group,
            source: source_name.to_string(),
            attributes: directive.attributes,
            category: String::new(),
            resolution: String::new(),
            latency_ms: None,
            throughput_kbps: None,
            valid: false,
        });
    }

    channels
}

/// Parse the portion of a directive line after `#EXTINF:`.
///
/// Returns `None` when no display name can be extracted.
fn parse_directive(rest: &str) -> Option<Directive> {
    let mut attributes = BTreeMap::new();
    for capture in attr_regex().captures_iter(rest) {
        attributes.insert(capture[1].to_string(), capture[2].to_string());
    }

    let name = name_after_last_comma(rest)?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    Some(Directive { name, attributes })
}

/// The display name follows the last comma outside double quotes, so commas
/// inside attribute values do not split the name.
fn name_after_last_comma(line: &str) -> Option<&str> {
    let mut in_quotes = false;
    let mut last_comma = None;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => last_comma = Some(index),
            _ => {}
        }
    }
    last_comma.map(|index| &line[index + 1..])
}

fn matches_region(name: &str, group: &str, keywords: &[String]) -> bool {
    let name = name.to_lowercase();
    let group = group.to_lowercase();
    keywords
        .iter()
        .any(|keyword| {
            let keyword = keyword.to_lowercase();
            name.contains(&keyword) || group.contains(&keyword)
        })
}
