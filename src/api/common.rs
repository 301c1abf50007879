//! Query types shared by the API and the HTML pages

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{normalize_tag_name, ArticleFilter, ImageFilter, ListParams, PubPeriod};
use crate::services::clean_search_phrase;

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size
pub fn default_per_page() -> u32 {
    10
}

/// Treat `?field=` like an absent field
fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

/// Lenient page number: anything unparseable is page 1
fn lenient_page<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or_else(default_page))
}

fn lenient_per_page<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or_else(default_per_page))
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.trim().parse().ok()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page", deserialize_with = "lenient_page")]
    pub page: u32,
    #[serde(default = "default_per_page", deserialize_with = "lenient_per_page")]
    pub per_page: u32,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// Article listing filters: `?search=&category=&author=&pub_period=&page=`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub pub_period: Option<String>,
    #[serde(default = "default_page", deserialize_with = "lenient_page")]
    pub page: u32,
    #[serde(default = "default_per_page", deserialize_with = "lenient_per_page")]
    pub per_page: u32,
}

impl ArticleQuery {
    pub fn filter(&self, only_displayed: bool) -> ArticleFilter {
        ArticleFilter {
            search: self.search.as_deref().map(clean_search_phrase).unwrap_or_default(),
            category: self.category.as_deref().map(normalize_tag_name),
            author: self.author.as_ref().map(|a| a.trim().to_string()),
            pub_period: PubPeriod::parse_opt(self.pub_period.as_deref()),
            only_displayed,
        }
    }

    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// Image library filters: `?search=&category=&pub_period=&page=`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub pub_period: Option<String>,
    #[serde(default = "default_page", deserialize_with = "lenient_page")]
    pub page: u32,
    #[serde(default = "default_per_page", deserialize_with = "lenient_per_page")]
    pub per_page: u32,
}

impl ImageQuery {
    pub fn filter(&self) -> ImageFilter {
        ImageFilter {
            search: self.search.as_deref().map(clean_search_phrase).unwrap_or_default(),
            category: self.category.as_deref().map(normalize_tag_name),
            pub_period: PubPeriod::parse_opt(self.pub_period.as_deref()),
        }
    }

    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// Optional parent filter for paragraphs and comments
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleScopedQuery {
    #[serde(default, deserialize_with = "lenient_id")]
    pub article_id: Option<i64>,
    #[serde(default = "default_page", deserialize_with = "lenient_page")]
    pub page: u32,
    #[serde(default = "default_per_page", deserialize_with = "lenient_per_page")]
    pub per_page: u32,
}

impl ArticleScopedQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}
