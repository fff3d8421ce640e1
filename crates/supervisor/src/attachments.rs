// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt attachments.
//!
//! Base64 images and plain-text files are persisted into the workspace's
//! `.attachments/` directory with sanitized names; the returned prefix
//! tells the agent to read them before responding.

use base64::Engine;
use std::path::Path;

/// Directory under the workspace holding attachment files.
pub const ATTACHMENTS_DIR: &str = ".attachments";

/// One attachment supplied with a prompt.
#[derive(Debug, Clone)]
pub enum Attachment {
    /// A `data:` URL carrying base64 image bytes.
    Image { name: Option<String>, data_url: String },
    /// A plain-text file.
    File { name: String, content: String },
}

/// Persist attachments; returns the prompt prefix, or `None` when nothing
/// was written.
pub(crate) fn save_attachments(
    workspace: &Path,
    attachments: &[Attachment],
) -> std::io::Result<Option<String>> {
    if attachments.is_empty() {
        return Ok(None);
    }

    let dir = workspace.join(ATTACHMENTS_DIR);
    std::fs::create_dir_all(&dir)?;

    let mut saved = Vec::new();
    for (index, attachment) in attachments.iter().enumerate() {
        match attachment {
            Attachment::Image { name, data_url } => {
                let Some((kind, bytes)) = decode_data_url(data_url) else {
                    tracing::warn!(index, "skipping undecodable image attachment");
                    continue;
                };
                let fallback = format!("image-{index}.{kind}");
                let file = sanitize_filename(name.as_deref().unwrap_or(&fallback));
                std::fs::write(dir.join(&file), bytes)?;
                saved.push(file);
            }
            Attachment::File { name, content } => {
                let file = sanitize_filename(name);
                std::fs::write(dir.join(&file), content)?;
                saved.push(file);
            }
        }
    }

    if saved.is_empty() {
        return Ok(None);
    }
    let listing: Vec<String> =
        saved.iter().map(|f| format!("{ATTACHMENTS_DIR}/{f}")).collect();
    Ok(Some(format!(
        "The following files were attached to this message: {}. Read them before responding.\n\n",
        listing.join(", ")
    )))
}

/// Decode a `data:<mime>;base64,<payload>` URL into (extension, bytes).
fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim()).ok()?;
    let ext = match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    };
    Some((ext.to_string(), bytes))
}

/// Keep the final path component, then alphanumerics, dot, dash and
/// underscore; everything else becomes `_`. Leading dots are stripped so
/// attachments cannot hide or escape.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() { "attachment".to_string() } else { trimmed.to_string() }
}

#[cfg(test)]
#[path = "attachments_tests.rs"]
mod tests;
