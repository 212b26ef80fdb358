// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image URL extraction from free-form model replies.

use std::sync::LazyLock;

use regex::Regex;

/// Patterns whose first capture group is an image URL.
static IMAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // <img src="...">
        Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).unwrap(),
        // <image url="...">
        Regex::new(r#"(?i)<image[^>]+url=["']([^"']+)["']"#).unwrap(),
        // ![alt](url "title")
        Regex::new(r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).unwrap(),
    ]
});

/// Extract image URLs in order of appearance, without duplicates.
pub fn extract_image_urls(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = IMAGE_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str().trim()))
        .filter(|(_, url)| !url.is_empty())
        .collect();
    found.sort_by_key(|(start, _)| *start);

    let mut urls: Vec<String> = Vec::with_capacity(found.len());
    for (_, url) in found {
        if !urls.iter().any(|existing| existing == url) {
            urls.push(url.to_string());
        }
    }
    urls
}
