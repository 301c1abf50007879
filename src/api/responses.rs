//! JSON representations returned by the API

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::middleware::CurrentUser;
use crate::models::{Comment, Image, PagedResult, Tag};
use crate::services::ArticleDetail;

/// One page of a listing
#[derive(Debug, Serialize)]
pub struct PagedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PagedResponse<T> {
    pub fn from_paged<S>(result: PagedResult<S>, f: impl FnMut(S) -> T) -> Self {
        let total_pages = result.total_pages();
        Self {
            items: result.items.into_iter().map(f).collect(),
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            total_pages,
        }
    }
}

impl<T> From<PagedResult<T>> for PagedResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        Self::from_paged(result, |item| item)
    }
}

/// Comment as embedded in an article
#[derive(Debug, Serialize)]
pub struct CommentSummary {
    pub author: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub likes: i64,
    pub dislikes: i64,
}

impl From<Comment> for CommentSummary {
    fn from(comment: Comment) -> Self {
        Self {
            author: comment.author_name,
            text: comment.text,
            date: comment.pub_date,
            likes: comment.likes,
            dislikes: comment.dislikes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub id: i64,
    pub url: String,
    pub title: String,
    /// Username, or "unknown" once the author is gone
    pub author: String,
    pub for_display: bool,
    /// Paragraph title to paragraph text
    pub text: serde_json::Map<String, serde_json::Value>,
    pub pub_date: DateTime<Utc>,
    /// Distinct signed-in visitors
    pub views: i64,
    /// Fans
    pub likes: i64,
    pub popularity: i64,
    pub tags: Vec<String>,
    pub comments: Vec<CommentSummary>,
}

impl From<ArticleDetail> for ArticleResponse {
    fn from(detail: ArticleDetail) -> Self {
        let article = detail.article;
        let text = detail
            .paragraphs
            .into_iter()
            .map(|p| (p.title, serde_json::Value::String(p.text)))
            .collect();

        Self {
            id: article.id,
            url: format!("/articles/{}", article.id),
            author: article.author_display().to_string(),
            title: article.title,
            for_display: article.for_display,
            text,
            pub_date: article.pub_date,
            views: article.views,
            likes: article.likes,
            popularity: article.popularity,
            tags: detail.tags.into_iter().map(|t| t.name).collect(),
            comments: detail.comments.into_iter().map(CommentSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub article_id: i64,
    pub author: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub likes: i64,
    pub dislikes: i64,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            article_id: comment.article_id,
            author: comment.author_name,
            text: comment.text,
            date: comment.pub_date,
            likes: comment.likes,
            dislikes: comment.dislikes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub pub_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

impl From<Image> for ImageResponse {
    fn from(image: Image) -> Self {
        Self {
            id: image.id,
            url: image.url(),
            name: image.name,
            pub_date: image.pub_date,
            tags: None,
        }
    }
}

impl ImageResponse {
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = Some(tags);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_id: i64,
    pub is_editor: bool,
    pub is_editor_in_chief: bool,
}

impl From<CurrentUser> for UserResponse {
    fn from(current: CurrentUser) -> Self {
        Self {
            id: current.user.id,
            username: current.user.username,
            email: current.user.email,
            first_name: current.user.first_name,
            last_name: current.user.last_name,
            profile_id: current.profile.id,
            is_editor: current.profile.is_editor,
            is_editor_in_chief: current.profile.is_editor_in_chief,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, Paragraph};

    #[test]
    fn test_article_response_shape() {
        let now = Utc::now();
        let detail = ArticleDetail {
            article: Article {
                id: 7,
                title: "Tides".into(),
                author_id: None,
                author_name: None,
                for_display: true,
                popularity: 4,
                pub_date: now,
                likes: 2,
                views: 3,
            },
            paragraphs: vec![Paragraph {
                id: 1,
                article_id: 7,
                title: "Moon".into(),
                text: "Gravity.".into(),
                is_lead: true,
                position: 0,
            }],
            images: vec![],
            tags: vec![Tag { id: 1, name: "Science".into(), major: true }],
            comments: vec![Comment {
                id: 1,
                article_id: 7,
                author_id: 2,
                author_name: "reader".into(),
                text: "Nice".into(),
                pub_date: now,
                likes: 1,
                dislikes: 0,
            }],
        };

        let json = serde_json::to_value(ArticleResponse::from(detail)).unwrap();
        assert_eq!(json["url"], "/articles/7");
        assert_eq!(json["author"], "unknown");
        assert_eq!(json["text"], serde_json::json!({ "Moon": "Gravity." }));
        assert_eq!(json["views"], 3);
        assert_eq!(json["likes"], 2);
        assert_eq!(json["comments"][0]["author"], "reader");
        assert_eq!(json["comments"][0]["likes"], 1);
        assert_eq!(json["tags"], serde_json::json!(["Science"]));
    }
}
