//! Tag model

use serde::{Deserialize, Serialize};

/// Categorization label attachable to articles and images.
///
/// Major tags are the categories offered in listing filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    /// Normalized, unique name
    pub name: String,
    pub major: bool,
}

/// Tag with usage counts for the tag list
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagWithCount {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub tag: Tag,
    pub article_count: i64,
    pub image_count: i64,
}

/// Canonical tag spelling: trimmed, first letter upper-cased, the rest lower-cased.
///
/// `"   test tag1"` becomes `"Test tag1"`.
pub fn normalize_tag_name(raw: &str) -> String {
    capitalize(raw.trim())
}

/// Upper-case the first character and lower-case the rest
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
