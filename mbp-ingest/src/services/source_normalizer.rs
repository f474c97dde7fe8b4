//! Source normalizer
//!
//! Pure helpers that turn one raw input into canonical item parts: a title
//! guess, a normalized URL and its `DetectedType`. Identifier extraction used
//! by the resolvers lives here too so classification and resolution agree on
//! the same patterns. No I/O.

use crate::models::DetectedType;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

const DEFAULT_SCHEME: &str = "https://";

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
    "www.youtube-nocookie.com",
    "youtube-nocookie.com",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "odt", "odp", "ods", "rtf", "txt", "epub",
];

/// Path segments that say nothing about the content
const UNINFORMATIVE_SEGMENTS: &[&str] = &["view", "edit", "preview", "open", "watch", "usp=sharing"];

static VIDEO_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"[?&]v=([A-Za-z0-9_-]{11})",
        r"youtu\.be/([A-Za-z0-9_-]{11})",
        r"/(?:embed|shorts|live|v)/([A-Za-z0-9_-]{11})",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static DRIVE_FOLDER_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"/folders/([A-Za-z0-9_-]+)").ok());

static DRIVE_FILE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/file/d/([A-Za-z0-9_-]+)",
        r"/d/([A-Za-z0-9_-]+)",
        r"[?&]id=([A-Za-z0-9_-]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// `host.tld` or `host.tld/...` without a scheme
static BARE_DOMAIN_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}(:\d+)?(/\S*)?$").ok());

/// Prepend the default scheme when missing
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("{}{}", DEFAULT_SCHEME, rest)
    } else {
        format!("{}{}", DEFAULT_SCHEME, trimmed)
    }
}

/// Parse a normalized URL, accepting only http(s) with a host
pub fn parse_http_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;
    let scheme_ok = matches!(parsed.scheme(), "http" | "https");
    let host_ok = parsed.host_str().is_some_and(|h| !h.is_empty());
    (scheme_ok && host_ok).then_some(parsed)
}

/// Whether a CSV field is the URL column rather than the title column
pub fn looks_like_url(field: &str) -> bool {
    let field = field.trim();
    if field.is_empty() || field.contains(char::is_whitespace) {
        return false;
    }
    if parse_http_url(field).is_some() {
        return true;
    }

    let lower = field.to_lowercase();
    lower.contains("http")
        || lower.starts_with("www.")
        || lower.starts_with("drive.")
        || lower.starts_with("docs.google.")
        || lower.contains("youtu")
        || BARE_DOMAIN_PATTERN
            .as_ref()
            .is_some_and(|re| re.is_match(field))
}

/// Ordered classification of a normalized URL
pub fn classify_url(url: &str) -> DetectedType {
    let Some(parsed) = parse_http_url(url) else {
        return DetectedType::GenericLink;
    };
    let host = parsed.host_str().unwrap_or_default().to_lowercase();

    if VIDEO_HOSTS.contains(&host.as_str()) {
        return DetectedType::VideoEmbed;
    }

    let is_drive = host == "drive.google.com";
    let is_docs = host == "docs.google.com";
    if is_drive && extract_drive_folder_id(url).is_some() {
        return DetectedType::CloudFolder;
    }
    if (is_drive || is_docs) && extract_drive_file_id(url).is_some() {
        return DetectedType::CloudDocument;
    }

    let has_document_extension = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .is_some_and(|(_, ext)| DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
    if has_document_extension {
        return DetectedType::GenericDocument;
    }

    DetectedType::GenericLink
}

/// 11-character video id from the usual URL shapes
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_drive_folder_id(url: &str) -> Option<String> {
    DRIVE_FOLDER_PATTERN
        .as_ref()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Document id via `/file/d/<id>`, `/d/<id>`, then `id=<id>`
pub fn extract_drive_file_id(url: &str) -> Option<String> {
    DRIVE_FILE_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Title guess from a file name: extension stripped, separators to spaces
pub fn title_from_filename(file_name: &str) -> String {
    humanize(strip_extension(file_name))
}

/// Title guess from a URL: last informative path segment, else the host
pub fn title_from_url(url: &str) -> String {
    let Some(parsed) = parse_http_url(url) else {
        return url.trim().to_string();
    };

    let segment = parsed.path_segments().and_then(|segments| {
        segments
            .filter(|s| !s.is_empty())
            .filter(|s| !UNINFORMATIVE_SEGMENTS.contains(&s.to_lowercase().as_str()))
            .last()
            .map(str::to_string)
    });

    if let Some(segment) = segment {
        let decoded = urlencoding::decode(&segment)
            .map(|d| d.into_owned())
            .unwrap_or(segment);
        let title = humanize(strip_extension(&decoded));
        if !title.is_empty() {
            return title;
        }
    }

    if let Some(video_id) = extract_video_id(url) {
        return video_id;
    }

    parsed
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_else(|| url.trim().to_string())
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => name,
    }
}

fn humanize(raw: &str) -> String {
    raw.replace(['_', '-', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
