// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image encoding helpers shared by the providers.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use pictor_core::ImageFile;

/// Encode raw bytes as a `data:` URL.
pub fn bytes_to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Encode an input image as a `data:` URL.
pub fn data_url(image: &ImageFile) -> String {
    bytes_to_data_url(&image.mime_type, &image.bytes)
}

/// Normalize a provider-returned base64 payload into a data URL.
///
/// Payloads that already carry a `data:` prefix are kept as is; bare
/// base64 is assumed to be PNG.
pub fn b64_to_data_url(payload: &str) -> String {
    let trimmed = payload.trim();
    if trimmed.starts_with("data:") {
        trimmed.to_string()
    } else {
        format!("data:image/png;base64,{trimmed}")
    }
}

/// Guess an image MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Shorten long values (data URLs, base64 payloads, model replies) for log
/// output and error messages.
pub fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let cut: String = value.chars().take(max_len).collect();
    format!("{cut}... [{} chars]", value.len())
}
