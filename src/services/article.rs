//! Article service
//!
//! Articles are assembled from paragraphs, images, tags and comments. The
//! home page listing is cached per page and dropped on every content write.

use crate::cache::{MemoryCache, HOME_PREFIX};
use crate::db::repositories::{
    ArticleRepository, CommentRepository, ImageRepository, ParagraphRepository, TagRepository,
};
use crate::models::{
    Article, ArticleFilter, ArticleImage, Comment, CreateArticleInput, ListParams, PagedResult,
    Paragraph, Tag, UpdateArticleInput, DEFAULT_ARTICLE_TITLE, DEFAULT_PARAGRAPH_TITLE,
};
use crate::services::generator::GeneratedArticle;
use crate::services::image::pick_lead_photo;
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Everything the detail page and the API show for one article
#[derive(Debug, Clone, Serialize)]
pub struct ArticleDetail {
    pub article: Article,
    pub paragraphs: Vec<Paragraph>,
    pub images: Vec<ArticleImage>,
    pub tags: Vec<Tag>,
    pub comments: Vec<Comment>,
}

impl ArticleDetail {
    pub fn lead_paragraph(&self) -> Option<&Paragraph> {
        self.paragraphs.iter().find(|p| p.is_lead)
    }

    /// Paragraphs other than the lead, in order
    pub fn body(&self) -> impl Iterator<Item = &Paragraph> {
        self.paragraphs.iter().filter(|p| !p.is_lead)
    }

    pub fn lead_image(&self) -> Option<&ArticleImage> {
        self.images.iter().find(|i| i.is_lead)
    }
}

/// Home page entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCard {
    pub article: Article,
    pub lead: Option<Paragraph>,
    /// URL of the lead photo, falling back to the first library image
    pub photo: Option<String>,
}

pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    paragraphs: Arc<dyn ParagraphRepository>,
    images: Arc<dyn ImageRepository>,
    tags: Arc<dyn TagRepository>,
    comments: Arc<dyn CommentRepository>,
    cache: Arc<MemoryCache>,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        paragraphs: Arc<dyn ParagraphRepository>,
        images: Arc<dyn ImageRepository>,
        tags: Arc<dyn TagRepository>,
        comments: Arc<dyn CommentRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            paragraphs,
            images,
            tags,
            comments,
            cache,
        }
    }

    /// Create an article published now. A blank title becomes "New article".
    pub async fn create(
        &self,
        input: CreateArticleInput,
        author_id: Option<i64>,
    ) -> Result<Article, ArticleServiceError> {
        let title = title_or_default(input.title.as_deref());
        let article = self
            .repo
            .create(&title, author_id, input.for_display, Utc::now())
            .await
            .context("Failed to create article")?;

        tracing::info!("Created article {} \"{}\"", article.id, article.title);
        self.invalidate_home().await;
        Ok(article)
    }

    /// Save a generated article as a hidden draft.
    ///
    /// The first generated paragraph becomes the lead.
    pub async fn create_generated(
        &self,
        generated: &GeneratedArticle,
        author_id: Option<i64>,
    ) -> Result<ArticleDetail, ArticleServiceError> {
        let article = self
            .create(
                CreateArticleInput {
                    title: Some(generated.title().to_string()),
                    for_display: false,
                },
                author_id,
            )
            .await?;

        for (index, (title, text)) in generated.paragraphs().into_iter().enumerate() {
            let title = match title.trim() {
                "" => DEFAULT_PARAGRAPH_TITLE.to_string(),
                trimmed => trimmed.to_string(),
            };
            self.paragraphs
                .create(article.id, &title, &text, index == 0)
                .await
                .context("Failed to store generated paragraph")?;
        }

        self.detail(article.id).await
    }

    pub async fn get(&self, id: i64) -> Result<Article, ArticleServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ArticleServiceError::NotFound(format!("Article {} not found", id)))
    }

    /// Like `get`, but undisplayed articles are missing for non-editors
    pub async fn ensure_visible(&self, id: i64, is_editor: bool) -> Result<Article, ArticleServiceError> {
        let article = self.get(id).await?;
        if article.is_visible_to(is_editor) {
            Ok(article)
        } else {
            Err(ArticleServiceError::NotFound(format!("Article {} not found", id)))
        }
    }

    pub async fn update(&self, id: i64, input: UpdateArticleInput) -> Result<Article, ArticleServiceError> {
        let mut article = self.get(id).await?;
        if let Some(title) = input.title {
            article.title = title_or_default(Some(&title));
        }
        if let Some(for_display) = input.for_display {
            article.for_display = for_display;
        }

        self.repo
            .update(id, &article.title, article.for_display)
            .await
            .context("Failed to update article")?;
        self.invalidate_home().await;
        self.get(id).await
    }

    /// Delete an article with its paragraphs, links and comments
    pub async fn delete(&self, id: i64) -> Result<Article, ArticleServiceError> {
        let article = self.get(id).await?;
        self.repo.delete(id).await.context("Failed to delete article")?;
        tracing::info!("Deleted article {}", id);
        self.invalidate_home().await;
        Ok(article)
    }

    pub async fn list(
        &self,
        filter: &ArticleFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_by_tag(&self, tag_id: i64, only_displayed: bool) -> Result<Vec<Article>, ArticleServiceError> {
        Ok(self.repo.list_by_tag(tag_id, only_displayed).await?)
    }

    pub async fn list_by_author(&self, author_id: i64) -> Result<Vec<Article>, ArticleServiceError> {
        Ok(self.repo.list_by_author(author_id).await?)
    }

    /// Add the user to the article's fans
    pub async fn like(&self, id: i64, user_id: i64) -> Result<Article, ArticleServiceError> {
        self.get(id).await?;
        self.repo.add_fan(id, user_id).await?;
        self.get(id).await
    }

    /// Remove the user from the article's fans
    pub async fn dislike(&self, id: i64, user_id: i64) -> Result<Article, ArticleServiceError> {
        self.get(id).await?;
        self.repo.remove_fan(id, user_id).await?;
        self.get(id).await
    }

    pub async fn is_fan(&self, id: i64, user_id: i64) -> Result<bool, ArticleServiceError> {
        Ok(self.repo.is_fan(id, user_id).await?)
    }

    /// Count a page view. Signed-in viewers are also recorded as visitors, once each.
    pub async fn record_view(&self, id: i64, viewer: Option<i64>) -> Result<(), ArticleServiceError> {
        self.repo.increment_popularity(id).await?;
        if let Some(user_id) = viewer {
            self.repo.add_visitor(id, user_id).await?;
        }
        Ok(())
    }

    pub async fn detail(&self, id: i64) -> Result<ArticleDetail, ArticleServiceError> {
        let article = self.get(id).await?;
        let paragraphs = self.paragraphs.list_for_article(id).await?;
        let images = self.images.list_for_article(id).await?;
        let tags = self.tags.get_by_article_id(id).await?;
        let comments = self.comments.list_for_article(id).await?;

        Ok(ArticleDetail {
            article,
            paragraphs,
            images,
            tags,
            comments,
        })
    }

    /// Displayed articles for the home page, each with its lead paragraph and photo
    pub async fn home(&self, params: &ListParams) -> Result<PagedResult<ArticleCard>, ArticleServiceError> {
        let key = format!("{}{}:{}", HOME_PREFIX, params.page, params.per_page);
        match self.cache.get::<PagedResult<ArticleCard>>(&key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable home cache entry: {}", e),
        }

        let filter = ArticleFilter {
            only_displayed: true,
            ..Default::default()
        };
        let (articles, total) = self.repo.list(&filter, params).await?;
        let fallback = self.images.first().await?;

        let mut cards = Vec::with_capacity(articles.len());
        for article in articles {
            let lead = self.paragraphs.find_lead(article.id, None).await?;
            let attached = self.images.list_for_article(article.id).await?;
            let photo = pick_lead_photo(&attached, fallback.as_ref());
            cards.push(ArticleCard { article, lead, photo });
        }

        let result = PagedResult::new(cards, total, params);
        if let Err(e) = self.cache.set(&key, &result).await {
            tracing::warn!("Failed to cache home page: {}", e);
        }
        Ok(result)
    }

    async fn invalidate_home(&self) {
        if let Err(e) = self.cache.delete_prefix(HOME_PREFIX).await {
            tracing::warn!("Failed to invalidate home cache: {}", e);
        }
    }
}

fn title_or_default(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => DEFAULT_ARTICLE_TITLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::test_support::{insert_image, insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxArticleRepository, SqlxCommentRepository, SqlxImageRepository, SqlxParagraphRepository,
        SqlxTagRepository,
    };
    use crate::db::DynDatabasePool;

    async fn setup_test_service() -> (DynDatabasePool, ArticleService) {
        let pool = setup_pool().await;
        let service = ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxParagraphRepository::boxed(pool.clone()),
            SqlxImageRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let (_pool, service) = setup_test_service().await;

        let before = Utc::now();
        let article = service.create(CreateArticleInput::default(), None).await.unwrap();
        assert_eq!(article.title, "New article");
        assert!(!article.for_display);
        assert_eq!(article.popularity, 0);
        assert!(article.pub_date >= before - chrono::Duration::seconds(1));
        assert!(article.published_today());

        let titled = service
            .create(CreateArticleInput::new("  Harbor news ").with_display(true), None)
            .await
            .unwrap();
        assert_eq!(titled.title, "Harbor news");
        assert!(titled.for_display);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, service) = setup_test_service().await;
        let article = service.create(CreateArticleInput::new("Draft"), None).await.unwrap();

        let updated = service
            .update(
                article.id,
                UpdateArticleInput {
                    title: Some("Final".to_string()),
                    for_display: Some(true),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Final");
        assert!(updated.for_display);

        service.delete(article.id).await.unwrap();
        assert!(matches!(
            service.get(article.id).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_like_dislike_and_views() {
        let (pool, service) = setup_test_service().await;
        let reader = insert_user(&pool, "reader").await;
        let article = service.create(CreateArticleInput::new("Story"), None).await.unwrap();

        let liked = service.like(article.id, reader).await.unwrap();
        assert_eq!(liked.likes, 1);
        assert!(service.is_fan(article.id, reader).await.unwrap());
        assert_eq!(service.like(article.id, reader).await.unwrap().likes, 1);

        let disliked = service.dislike(article.id, reader).await.unwrap();
        assert_eq!(disliked.likes, 0);

        service.record_view(article.id, None).await.unwrap();
        service.record_view(article.id, Some(reader)).await.unwrap();
        service.record_view(article.id, Some(reader)).await.unwrap();
        let viewed = service.get(article.id).await.unwrap();
        assert_eq!(viewed.popularity, 3);
        assert_eq!(viewed.views, 1);
    }

    #[tokio::test]
    async fn test_create_generated_sets_first_lead() {
        let (_pool, service) = setup_test_service().await;
        let generated = GeneratedArticle::from_fields([
            ("title", "Tides"),
            ("paragraph1_title", "Moon"),
            ("paragraph1_text", "Gravity pulls."),
            ("paragraph2_title", ""),
            ("paragraph2_text", "Water moves."),
        ]);

        let detail = service.create_generated(&generated, None).await.unwrap();
        assert_eq!(detail.article.title, "Tides");
        assert!(!detail.article.for_display);
        assert_eq!(detail.paragraphs.len(), 2);
        assert_eq!(detail.lead_paragraph().map(|p| p.title.as_str()), Some("Moon"));
        let body: Vec<&str> = detail.body().map(|p| p.title.as_str()).collect();
        assert_eq!(body, vec!["paragraph"]);
    }

    #[tokio::test]
    async fn test_home_uses_fallback_photo_and_refreshes() {
        let (pool, service) = setup_test_service().await;
        let image = insert_image(&pool, "library").await;
        service
            .create(CreateArticleInput::new("Hidden"), None)
            .await
            .unwrap();
        let shown = service
            .create(CreateArticleInput::new("Shown").with_display(true), None)
            .await
            .unwrap();

        let home = service.home(&ListParams::default()).await.unwrap();
        assert_eq!(home.total, 1);
        assert_eq!(home.items[0].article.id, shown.id);
        assert_eq!(
            home.items[0].photo.as_deref(),
            Some("/media/article_images/library.jpg")
        );
        assert!(image > 0);

        // A write drops the cached page
        service
            .create(CreateArticleInput::new("Second").with_display(true), None)
            .await
            .unwrap();
        assert_eq!(service.home(&ListParams::default()).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_ensure_visible_hides_drafts_from_readers() {
        let (_pool, service) = setup_test_service().await;
        let draft = service.create(CreateArticleInput::new("Draft"), None).await.unwrap();

        assert!(matches!(
            service.ensure_visible(draft.id, false).await,
            Err(ArticleServiceError::NotFound(_))
        ));
        assert_eq!(service.ensure_visible(draft.id, true).await.unwrap().id, draft.id);
    }
}
