//! Image model
//!
//! Images live in a shared library and can be linked to any number of
//! articles; the link records whether the image leads that article.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::PubPeriod;

/// Sub-directory of the media root that holds uploaded photos
pub const IMAGE_UPLOAD_DIR: &str = "article_images";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Image {
    pub id: i64,
    pub name: String,
    /// Path relative to the media root, e.g. `article_images/<file>`
    pub photo: String,
    pub pub_date: DateTime<Utc>,
}

impl Image {
    /// Default name derived from the upload time
    pub fn get_name(&self) -> String {
        default_image_name(self.pub_date)
    }

    pub fn date(&self) -> NaiveDate {
        self.pub_date.date_naive()
    }

    /// Public URL of the stored file
    pub fn url(&self) -> String {
        format!("/media/{}", self.photo)
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// `image_<timestamp>`, used when an image is saved without a name
pub fn default_image_name(pub_date: DateTime<Utc>) -> String {
    format!("image_{}", pub_date.format("%Y-%m-%d %H:%M:%S%.6f%:z"))
}

/// An image as linked to one article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct ArticleImage {
    pub id: i64,
    pub name: String,
    pub photo: String,
    pub pub_date: DateTime<Utc>,
    pub is_lead: bool,
}

impl ArticleImage {
    pub fn url(&self) -> String {
        format!("/media/{}", self.photo)
    }
}

/// Filters accepted by the image library listing
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    /// Words produced by `clean_search_phrase`
    pub search: Vec<String>,
    /// Normalized tag name
    pub category: Option<String>,
    pub pub_period: Option<PubPeriod>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn image(name: &str) -> Image {
        Image {
            id: 1,
            name: name.to_string(),
            photo: format!("{}/test.jpg", IMAGE_UPLOAD_DIR),
            pub_date: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_display_is_name() {
        assert_eq!(image("Test Image").to_string(), "Test Image");
    }

    #[test]
    fn test_get_name_uses_pub_date() {
        let img = image("");
        assert_eq!(img.get_name(), "image_2024-03-05 14:30:00.000000+00:00");
        assert_eq!(img.date(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn test_url() {
        assert_eq!(image("x").url(), "/media/article_images/test.jpg");
    }
}
