//! Comment service

use crate::db::repositories::{ArticleRepository, CommentRepository};
use crate::models::{Comment, ListParams, PagedResult, Reaction};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Upper bound on comment length, in characters
pub const MAX_COMMENT_LENGTH: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    articles: Arc<dyn ArticleRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, articles: Arc<dyn ArticleRepository>) -> Self {
        Self { repo, articles }
    }

    /// Hidden articles are reported missing to everyone but editors
    async fn ensure_article_visible(&self, article_id: i64, is_editor: bool) -> Result<(), CommentServiceError> {
        match self.articles.get_by_id(article_id).await? {
            Some(article) if article.is_visible_to(is_editor) => Ok(()),
            _ => Err(CommentServiceError::NotFound(format!(
                "Article {} not found",
                article_id
            ))),
        }
    }

    pub async fn create(
        &self,
        article_id: i64,
        author_id: i64,
        is_editor: bool,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        self.ensure_article_visible(article_id, is_editor).await?;
        let text = validate_text(text)?;

        let comment = self
            .repo
            .create(article_id, author_id, &text, Utc::now())
            .await
            .context("Failed to create comment")?;
        tracing::debug!("Comment {} added to article {}", comment.id, article_id);
        Ok(comment)
    }

    pub async fn get(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or_else(|| CommentServiceError::NotFound(format!("Comment {} not found", id)))
    }

    /// A comment whose article the caller may see
    pub async fn get_visible(&self, id: i64, is_editor: bool) -> Result<Comment, CommentServiceError> {
        let comment = self.get(id).await?;
        self.ensure_article_visible(comment.article_id, is_editor)
            .await
            .map_err(|_| CommentServiceError::NotFound(format!("Comment {} not found", id)))?;
        Ok(comment)
    }

    pub async fn list(
        &self,
        article_id: Option<i64>,
        is_editor: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        if let Some(article_id) = article_id {
            self.ensure_article_visible(article_id, is_editor).await?;
        }
        let (items, total) = self.repo.list(article_id, !is_editor, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_for_article(&self, article_id: i64) -> Result<Vec<Comment>, CommentServiceError> {
        Ok(self.repo.list_for_article(article_id).await?)
    }

    /// Edit the text. Only the author or an editor may do this.
    pub async fn update_text(
        &self,
        id: i64,
        user_id: i64,
        is_editor: bool,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let comment = self.get(id).await?;
        ensure_can_modify(&comment, user_id, is_editor)?;
        let text = validate_text(text)?;

        self.repo.update_text(id, &text).await?;
        self.get(id).await
    }

    /// Delete a comment. Only the author or an editor may do this.
    pub async fn delete(&self, id: i64, user_id: i64, is_editor: bool) -> Result<(), CommentServiceError> {
        let comment = self.get(id).await?;
        ensure_can_modify(&comment, user_id, is_editor)?;
        self.repo.delete(id).await?;
        Ok(())
    }

    /// Like or dislike; the opposite reaction from the same user is withdrawn
    pub async fn react(
        &self,
        id: i64,
        user_id: i64,
        is_editor: bool,
        reaction: Reaction,
    ) -> Result<Comment, CommentServiceError> {
        self.get_visible(id, is_editor).await?;
        self.repo.set_reaction(id, user_id, reaction).await?;
        self.get(id).await
    }
}

/// Whether `user_id` may edit or delete the comment
pub fn can_modify(comment: &Comment, user_id: i64, is_editor: bool) -> bool {
    is_editor || comment.author_id == user_id
}

fn ensure_can_modify(comment: &Comment, user_id: i64, is_editor: bool) -> Result<(), CommentServiceError> {
    if can_modify(comment, user_id, is_editor) {
        Ok(())
    } else {
        Err(CommentServiceError::Forbidden(
            "Only the author or an editor may change this comment".to_string(),
        ))
    }
}

fn validate_text(text: &str) -> Result<String, CommentServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommentServiceError::ValidationError(
            "Comment cannot be empty".to_string(),
        ));
    }
    if text.chars().count() > MAX_COMMENT_LENGTH {
        return Err(CommentServiceError::ValidationError(format!(
            "Comment cannot be longer than {} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(text.to_string())
}
