//! Batch parser
//!
//! Turns a delimited text blob or a file selection into pending items plus
//! per-input rejection diagnostics. Rejections are data, never errors: an
//! empty input yields an empty outcome and exceeding the cap yields a partial
//! one.

use crate::config::IngestLimits;
use crate::models::{FileHandle, PendingItem};
use crate::services::source_normalizer::{
    classify_url, looks_like_url, normalize_url, parse_http_url, title_from_filename,
    title_from_url,
};
use serde::Serialize;
use std::path::PathBuf;

/// Why an input line or file was excluded from the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Batch already holds the maximum number of items
    LimitExceeded { limit: usize },
    /// Line has no usable URL
    InvalidUrl,
    /// File is larger than the configured maximum
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },
    /// File could not be read
    Unreadable { message: String },
}

/// One rejected input with its 1-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedInput {
    pub position: usize,
    pub input: String,
    #[serde(flatten)]
    pub reason: RejectReason,
}

/// Parser output
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub items: Vec<PendingItem>,
    pub rejected: Vec<RejectedInput>,
}

impl ParseOutcome {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn accepted_count(&self) -> usize {
        self.items.len()
    }
}

/// Field delimiter, detected from the first non-empty line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Semicolon,
    Comma,
}

impl Delimiter {
    pub fn detect(first_line: &str) -> Self {
        if first_line.contains('\t') {
            Delimiter::Tab
        } else if first_line.contains(';') {
            Delimiter::Semicolon
        } else {
            Delimiter::Comma
        }
    }

    fn as_char(self) -> char {
        match self {
            Delimiter::Tab => '\t',
            Delimiter::Semicolon => ';',
            Delimiter::Comma => ',',
        }
    }
}

/// Split one line honoring double quotes (`""` is an escaped quote)
pub fn split_fields(line: &str, delimiter: Delimiter) -> Vec<String> {
    let delimiter = delimiter.as_char();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                fields.push(clean_field(&current));
                current.clear();
            }
            c => current.push(c),
        }
    }
    fields.push(clean_field(&current));
    fields
}

fn clean_field(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

fn is_header(fields: &[String]) -> bool {
    let lower: Vec<String> = fields.iter().map(|f| f.to_lowercase()).collect();
    let has_title = lower.iter().any(|f| f == "title" || f == "name");
    let has_url = lower.iter().any(|f| f == "url" || f == "link");
    has_title && has_url
}

/// Batch parser configured with the batch limits
#[derive(Debug, Clone)]
pub struct BatchParser {
    limits: IngestLimits,
}

impl BatchParser {
    pub fn new(limits: IngestLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &IngestLimits {
        &self.limits
    }

    /// Parse a delimited link list
    ///
    /// `already_accepted` counts items already in the batch so the cap holds
    /// across repeated calls.
    pub fn parse_links(&self, text: &str, already_accepted: usize) -> ParseOutcome {
        let text = text.trim_start_matches('\u{feff}');
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let mut outcome = ParseOutcome::default();
        let Some(first) = lines.first() else {
            return outcome;
        };
        let delimiter = Delimiter::detect(first);
        let limit = self.limits.max_links;

        for (i, line) in lines.iter().enumerate() {
            let position = i + 1;
            let fields: Vec<String> = split_fields(line, delimiter)
                .into_iter()
                .filter(|f| !f.is_empty())
                .collect();

            if i == 0 && is_header(&fields) {
                tracing::debug!("Skipping header row: {}", line);
                continue;
            }

            let Some((title, raw_url)) = pick_title_and_url(fields) else {
                outcome.rejected.push(RejectedInput {
                    position,
                    input: line.to_string(),
                    reason: RejectReason::InvalidUrl,
                });
                continue;
            };

            let url = normalize_url(&raw_url);
            if parse_http_url(&url).is_none() {
                outcome.rejected.push(RejectedInput {
                    position,
                    input: line.to_string(),
                    reason: RejectReason::InvalidUrl,
                });
                continue;
            }

            if already_accepted + outcome.items.len() >= limit {
                outcome.rejected.push(RejectedInput {
                    position,
                    input: line.to_string(),
                    reason: RejectReason::LimitExceeded { limit },
                });
                continue;
            }

            let detected_type = classify_url(&url);
            let fallback_title = title_from_url(&url);
            outcome.items.push(PendingItem::from_link(
                title,
                url,
                detected_type,
                fallback_title,
            ));
        }

        if !outcome.rejected.is_empty() {
            tracing::info!(
                accepted = outcome.items.len(),
                rejected = outcome.rejected.len(),
                "Link list parsed with rejections"
            );
        }

        outcome
    }

    /// Parse local paths, reading only filesystem metadata
    pub fn parse_files(&self, paths: &[PathBuf], already_accepted: usize) -> ParseOutcome {
        let mut handles = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();

        for (i, path) in paths.iter().enumerate() {
            match FileHandle::from_path(path) {
                Ok(handle) => handles.push((i + 1, handle)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read selected file");
                    unreadable.push(RejectedInput {
                        position: i + 1,
                        input: path.display().to_string(),
                        reason: RejectReason::Unreadable {
                            message: e.to_string(),
                        },
                    });
                }
            }
        }

        let mut outcome = self.parse_handles(handles, already_accepted);
        outcome.rejected.extend(unreadable);
        outcome.rejected.sort_by_key(|r| r.position);
        outcome
    }

    /// Admit already-built file handles, enforcing size and count limits
    pub fn parse_handles(
        &self,
        handles: Vec<(usize, FileHandle)>,
        already_accepted: usize,
    ) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        let limit = self.limits.max_files;
        let limit_bytes = self.limits.max_file_size_bytes;

        for (position, handle) in handles {
            if handle.size_bytes > limit_bytes {
                outcome.rejected.push(RejectedInput {
                    position,
                    input: handle.file_name.clone(),
                    reason: RejectReason::FileTooLarge {
                        size_bytes: handle.size_bytes,
                        limit_bytes,
                    },
                });
                continue;
            }

            if already_accepted + outcome.items.len() >= limit {
                outcome.rejected.push(RejectedInput {
                    position,
                    input: handle.file_name.clone(),
                    reason: RejectReason::LimitExceeded { limit },
                });
                continue;
            }

            let mut title = title_from_filename(&handle.file_name);
            if title.is_empty() {
                title = handle.file_name.clone();
            }
            outcome.items.push(PendingItem::from_file(handle, title));
        }

        outcome
    }
}

/// Decide which field is the URL; `None` title means it must be fetched
fn pick_title_and_url(mut fields: Vec<String>) -> Option<(Option<String>, String)> {
    match fields.len() {
        0 => None,
        1 => fields.pop().map(|url| (None, url)),
        _ => {
            let url_positions: Vec<usize> = fields
                .iter()
                .enumerate()
                .filter(|(_, f)| looks_like_url(f))
                .map(|(i, _)| i)
                .collect();

            if let [url_index] = url_positions[..] {
                let url = fields.remove(url_index);
                let title = fields.join(", ");
                Some((Some(title), url))
            } else {
                let url = fields.remove(1);
                let title = fields.remove(0);
                Some((Some(title), url))
            }
        }
    }
}
