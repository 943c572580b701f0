//! File naming and front matter for archived documents.

use chrono::SecondsFormat;

use crate::document::Document;

const MAX_SLUG_LEN: usize = 50;

/// Lower-case the title, collapse every run of non-alphanumeric characters
/// into one hyphen, trim hyphens from both ends and cap the length.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut gap = false;
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(c);
        } else {
            gap = true;
        }
    }
    // slug is ASCII, so byte truncation is char truncation
    slug.truncate(MAX_SLUG_LEN);
    if slug.is_empty() {
        slug.push_str("untitled");
    }
    slug
}

/// `YYYY-MM-DD-<slug>.md`, dated by creation time.
pub fn file_name(doc: &Document) -> String {
    format!(
        "{}-{}.md",
        doc.created_at.format("%Y-%m-%d"),
        slugify(&doc.title)
    )
}

/// Folder segments of `metadata.path` that are safe to use on disk.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect()
}

/// Repository-relative location of the archived file.
pub fn relative_path(doc: &Document) -> String {
    let mut parts: Vec<String> = doc
        .metadata
        .path
        .as_deref()
        .map(path_segments)
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect();
    parts.push(file_name(doc));
    parts.join("/")
}

pub fn front_matter(doc: &Document) -> String {
    // a JSON string literal is also a valid double-quoted YAML scalar
    let quote = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""));

    let mut out = String::from("---\n");
    out.push_str(&format!("title: {}\n", quote(&doc.title)));
    out.push_str(&format!(
        "created: {}\n",
        doc.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
    ));
    out.push_str(&format!(
        "source: {}\n",
        quote(doc.metadata.source.as_deref().unwrap_or("unknown"))
    ));
    if doc.metadata.tags.is_empty() {
        out.push_str("tags: []\n");
    } else {
        out.push_str("tags:\n");
        for tag in &doc.metadata.tags {
            out.push_str(&format!("  - {}\n", quote(tag)));
        }
    }
    if let Some(path) = doc.metadata.upsert_key() {
        out.push_str(&format!("path: {}\n", quote(path)));
    }
    out.push_str("---\n\n");
    out
}

pub fn render_document(doc: &Document) -> String {
    let mut out = front_matter(doc);
    out.push_str(&doc.content);
    out
}

pub fn default_commit_message(doc: &Document) -> String {
    format!("docs: Add {}", doc.title)
}
