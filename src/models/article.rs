//! Article model, listing filters and pagination types

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Title given to articles created without one
pub const DEFAULT_ARTICLE_TITLE: &str = "New article";

/// Article entity with its engagement counters.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    /// `None` once the author account is deleted
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    /// Shown on the public site
    pub for_display: bool,
    /// Total number of detail page views
    pub popularity: i64,
    pub pub_date: DateTime<Utc>,
    /// Number of fans
    pub likes: i64,
    /// Number of distinct signed-in visitors
    pub views: i64,
}

impl Article {
    /// Undisplayed articles are only visible to editors
    pub fn is_visible_to(&self, is_editor: bool) -> bool {
        self.for_display || is_editor
    }

    /// Author username, or "unknown" for orphaned articles
    pub fn author_display(&self) -> &str {
        self.author_name.as_deref().unwrap_or("unknown")
    }

    pub fn published_today(&self) -> bool {
        self.published_in(PubPeriod::Today, Utc::now())
    }

    pub fn published_last_day(&self) -> bool {
        self.published_in(PubPeriod::Day, Utc::now())
    }

    pub fn published_last_week(&self) -> bool {
        self.published_in(PubPeriod::Week, Utc::now())
    }

    pub fn published_last_month(&self) -> bool {
        self.published_in(PubPeriod::Month, Utc::now())
    }

    /// Whether `pub_date` falls within `period` as seen from `now`
    pub fn published_in(&self, period: PubPeriod, now: DateTime<Utc>) -> bool {
        self.pub_date >= period.cutoff(now) && self.pub_date <= now
    }

    pub fn date(&self) -> NaiveDate {
        self.pub_date.date_naive()
    }
}

/// Input for creating an article
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateArticleInput {
    /// Blank or missing titles become "New article"
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub for_display: bool,
}

impl CreateArticleInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            for_display: false,
        }
    }

    pub fn with_display(mut self, for_display: bool) -> Self {
        self.for_display = for_display;
        self
    }
}

/// Partial article update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArticleInput {
    pub title: Option<String>,
    pub for_display: Option<bool>,
}

/// Publication window used by list filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PubPeriod {
    /// Same UTC calendar day
    Today,
    /// Last 24 hours
    Day,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
}

impl PubPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PubPeriod::Today => "today",
            PubPeriod::Day => "day",
            PubPeriod::Week => "week",
            PubPeriod::Month => "month",
        }
    }

    /// Earliest publication time inside the window
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            PubPeriod::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc())
                .unwrap_or(now),
            PubPeriod::Day => now - Duration::days(1),
            PubPeriod::Week => now - Duration::days(7),
            PubPeriod::Month => now - Duration::days(30),
        }
    }

    /// Lenient parse for query strings; empty or unknown means "any time"
    pub fn parse_opt(value: Option<&str>) -> Option<Self> {
        value.and_then(|v| v.parse().ok())
    }
}

impl FromStr for PubPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(PubPeriod::Today),
            "day" => Ok(PubPeriod::Day),
            "week" => Ok(PubPeriod::Week),
            "month" => Ok(PubPeriod::Month),
            _ => Err(format!("Invalid publication period: {}", s)),
        }
    }
}

/// Filters accepted by article listings
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    /// Words produced by `clean_search_phrase`
    pub search: Vec<String>,
    /// Normalized tag name
    pub category: Option<String>,
    /// Author username
    pub author: Option<String>,
    pub pub_period: Option<PubPeriod>,
    /// Restrict to `for_display` articles
    pub only_displayed: bool,
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.total <= 0 {
            return 0;
        }
        ((self.total as u64).div_ceil(self.per_page as u64)) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}
