//! Paragraph model

use serde::{Deserialize, Serialize};

/// Title given to paragraphs created without one
pub const DEFAULT_PARAGRAPH_TITLE: &str = "paragraph";

/// A titled block of article text. At most one paragraph per article is the lead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Paragraph {
    pub id: i64,
    pub article_id: i64,
    pub title: String,
    pub text: String,
    pub is_lead: bool,
    /// Ordering within the article
    pub position: i64,
}

/// Input for creating a paragraph
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateParagraphInput {
    pub article_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_lead: bool,
}

impl CreateParagraphInput {
    pub fn new(article_id: i64) -> Self {
        Self {
            article_id,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn lead(mut self) -> Self {
        self.is_lead = true;
        self
    }
}

/// Partial paragraph update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateParagraphInput {
    pub title: Option<String>,
    pub text: Option<String>,
    pub is_lead: Option<bool>,
    pub position: Option<i64>,
}
