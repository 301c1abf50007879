//! Paragraph service
//!
//! An article has at most one lead paragraph.

use crate::cache::{MemoryCache, HOME_PREFIX};
use crate::db::repositories::{ArticleRepository, ParagraphRepository};
use crate::models::{
    CreateParagraphInput, ListParams, PagedResult, Paragraph, UpdateParagraphInput,
    DEFAULT_PARAGRAPH_TITLE,
};
use anyhow::Context;
use std::sync::Arc;

const LEAD_TAKEN: &str = "Article already has a lead paragraph";

#[derive(Debug, thiserror::Error)]
pub enum ParagraphServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ParagraphService {
    repo: Arc<dyn ParagraphRepository>,
    articles: Arc<dyn ArticleRepository>,
    cache: Arc<MemoryCache>,
}

impl ParagraphService {
    pub fn new(
        repo: Arc<dyn ParagraphRepository>,
        articles: Arc<dyn ArticleRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self { repo, articles, cache }
    }

    pub async fn create(&self, input: CreateParagraphInput) -> Result<Paragraph, ParagraphServiceError> {
        if self.articles.get_by_id(input.article_id).await?.is_none() {
            return Err(ParagraphServiceError::NotFound(format!(
                "Article {} not found",
                input.article_id
            )));
        }
        if input.is_lead && self.repo.find_lead(input.article_id, None).await?.is_some() {
            return Err(ParagraphServiceError::ValidationError(LEAD_TAKEN.to_string()));
        }

        let title = match input.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => DEFAULT_PARAGRAPH_TITLE.to_string(),
        };
        let text = input.text.unwrap_or_default();

        let paragraph = self
            .repo
            .create(input.article_id, &title, &text, input.is_lead)
            .await
            .context("Failed to create paragraph")?;
        self.invalidate_home().await;
        Ok(paragraph)
    }

    pub async fn get(&self, id: i64) -> Result<Paragraph, ParagraphServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get paragraph")?
            .ok_or_else(|| ParagraphServiceError::NotFound(format!("Paragraph {} not found", id)))
    }

    /// A paragraph whose article the caller may see
    pub async fn get_visible(&self, id: i64, is_editor: bool) -> Result<Paragraph, ParagraphServiceError> {
        let paragraph = self.get(id).await?;
        if !self.article_visible(paragraph.article_id, is_editor).await? {
            return Err(ParagraphServiceError::NotFound(format!("Paragraph {} not found", id)));
        }
        Ok(paragraph)
    }

    async fn article_visible(&self, article_id: i64, is_editor: bool) -> Result<bool, ParagraphServiceError> {
        Ok(self
            .articles
            .get_by_id(article_id)
            .await?
            .is_some_and(|article| article.is_visible_to(is_editor)))
    }

    pub async fn update(&self, id: i64, input: UpdateParagraphInput) -> Result<Paragraph, ParagraphServiceError> {
        let mut paragraph = self.get(id).await?;

        if let Some(title) = input.title {
            let title = title.trim();
            paragraph.title = if title.is_empty() {
                DEFAULT_PARAGRAPH_TITLE.to_string()
            } else {
                title.to_string()
            };
        }
        if let Some(text) = input.text {
            paragraph.text = text;
        }
        if let Some(position) = input.position {
            paragraph.position = position;
        }
        if let Some(is_lead) = input.is_lead {
            if is_lead
                && self
                    .repo
                    .find_lead(paragraph.article_id, Some(id))
                    .await?
                    .is_some()
            {
                return Err(ParagraphServiceError::ValidationError(LEAD_TAKEN.to_string()));
            }
            paragraph.is_lead = is_lead;
        }

        let updated = self.repo.update(&paragraph).await.context("Failed to update paragraph")?;
        self.invalidate_home().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<Paragraph, ParagraphServiceError> {
        let paragraph = self.get(id).await?;
        self.repo.delete(id).await.context("Failed to delete paragraph")?;
        self.invalidate_home().await;
        Ok(paragraph)
    }

    pub async fn list_for_article(&self, article_id: i64) -> Result<Vec<Paragraph>, ParagraphServiceError> {
        Ok(self.repo.list_for_article(article_id).await?)
    }

    pub async fn list(
        &self,
        article_id: Option<i64>,
        is_editor: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Paragraph>, ParagraphServiceError> {
        if let Some(article_id) = article_id {
            if !self.article_visible(article_id, is_editor).await? {
                return Err(ParagraphServiceError::NotFound(format!(
                    "Article {} not found",
                    article_id
                )));
            }
        }
        let (items, total) = self.repo.list(article_id, !is_editor, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn invalidate_home(&self) {
        if let Err(e) = self.cache.delete_prefix(HOME_PREFIX).await {
            tracing::warn!("Failed to invalidate home cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::test_support::{insert_article, setup_pool};
    use crate::db::repositories::{SqlxArticleRepository, SqlxParagraphRepository};
    use crate::db::DynDatabasePool;

    async fn setup_test_service() -> (DynDatabasePool, ParagraphService) {
        let pool = setup_pool().await;
        let service = ParagraphService::new(
            SqlxParagraphRepository::boxed(pool.clone()),
            SqlxArticleRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_defaults() {
        let (pool, service) = setup_test_service().await;
        let article = insert_article(&pool, None, "Story", true).await;

        let paragraph = service.create(CreateParagraphInput::new(article)).await.unwrap();
        assert_eq!(paragraph.title, "paragraph");
        assert_eq!(paragraph.text, "");
        assert!(!paragraph.is_lead);
    }

    #[tokio::test]
    async fn test_second_lead_rejected() {
        let (pool, service) = setup_test_service().await;
        let article = insert_article(&pool, None, "Story", true).await;

        service
            .create(CreateParagraphInput::new(article).with_title("Lead").lead())
            .await
            .unwrap();
        let result = service
            .create(CreateParagraphInput::new(article).with_title("Another").lead())
            .await;
        match result {
            Err(ParagraphServiceError::ValidationError(msg)) => assert_eq!(msg, LEAD_TAKEN),
            other => panic!("expected validation error, got {:?}", other),
        }

        // Other articles are unaffected
        let other = insert_article(&pool, None, "Other", true).await;
        assert!(service.create(CreateParagraphInput::new(other).lead()).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_lead_rule() {
        let (pool, service) = setup_test_service().await;
        let article = insert_article(&pool, None, "Story", true).await;

        let lead = service.create(CreateParagraphInput::new(article).lead()).await.unwrap();
        let body = service
            .create(CreateParagraphInput::new(article).with_text("Body"))
            .await
            .unwrap();

        // Re-saving the existing lead is fine
        let lead = service
            .update(lead.id, UpdateParagraphInput { is_lead: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert!(lead.is_lead);

        assert!(matches!(
            service
                .update(body.id, UpdateParagraphInput { is_lead: Some(true), ..Default::default() })
                .await,
            Err(ParagraphServiceError::ValidationError(_))
        ));

        service
            .update(lead.id, UpdateParagraphInput { is_lead: Some(false), ..Default::default() })
            .await
            .unwrap();
        let body = service
            .update(body.id, UpdateParagraphInput { is_lead: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert!(body.is_lead);
    }

    #[tokio::test]
    async fn test_missing_article() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(
            service.create(CreateParagraphInput::new(42)).await,
            Err(ParagraphServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let (pool, service) = setup_test_service().await;
        let article = insert_article(&pool, None, "Story", true).await;
        let first = service.create(CreateParagraphInput::new(article).with_title("One")).await.unwrap();
        service.create(CreateParagraphInput::new(article).with_title("Two")).await.unwrap();

        service.delete(first.id).await.unwrap();
        let remaining = service.list_for_article(article).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Two");
    }

    #[tokio::test]
    async fn test_hidden_article_paragraphs_need_an_editor() {
        let (pool, service) = setup_test_service().await;
        let shown = insert_article(&pool, None, "Shown", true).await;
        let draft = insert_article(&pool, None, "Draft", false).await;
        service.create(CreateParagraphInput::new(shown)).await.unwrap();
        let secret = service.create(CreateParagraphInput::new(draft).with_title("Secret")).await.unwrap();

        let params = ListParams::default();
        assert!(matches!(
            service.list(Some(draft), false, &params).await,
            Err(ParagraphServiceError::NotFound(_))
        ));
        assert_eq!(service.list(Some(draft), true, &params).await.unwrap().total, 1);
        assert_eq!(service.list(None, false, &params).await.unwrap().total, 1);
        assert_eq!(service.list(None, true, &params).await.unwrap().total, 2);

        assert!(matches!(
            service.get_visible(secret.id, false).await,
            Err(ParagraphServiceError::NotFound(_))
        ));
        assert_eq!(service.get_visible(secret.id, true).await.unwrap().title, "Secret");
    }
}
