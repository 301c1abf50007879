//! Tag service
//!
//! Tags are normalized before they are stored, so "  politics" and
//! "POLITICS" name the same row. The full list is cached.

use crate::cache::{MemoryCache, TAG_LIST_KEY, TAG_PREFIX};
use crate::db::repositories::TagRepository;
use crate::models::{normalize_tag_name, Tag, TagWithCount};
use anyhow::Context;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Tag not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: Arc<MemoryCache>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    /// Create a tag, or return the existing one with the same normalized name
    pub async fn create_or_get(&self, name: &str, major: bool) -> Result<Tag, TagServiceError> {
        let name = normalize_tag_name(name);
        if name.is_empty() {
            return Err(TagServiceError::ValidationError(
                "Tag name cannot be empty".to_string(),
            ));
        }

        if let Some(existing) = self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to check existing tag")?
        {
            return Ok(existing);
        }

        let created = self.repo.create(&name, major).await.context("Failed to create tag")?;
        self.invalidate().await;
        tracing::debug!("Created tag '{}'", created.name);
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag by ID")?
            .ok_or_else(|| TagServiceError::NotFound(format!("Tag {} not found", id)))
    }

    /// Look up by name, normalizing it first
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Tag>, TagServiceError> {
        Ok(self
            .repo
            .get_by_name(&normalize_tag_name(name))
            .await
            .context("Failed to get tag by name")?)
    }

    /// All tags ordered by name, served from cache when warm
    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        if let Ok(Some(tags)) = self.cache.get::<Vec<Tag>>(TAG_LIST_KEY).await {
            return Ok(tags);
        }

        let tags = self.repo.list().await.context("Failed to list tags")?;
        if let Err(e) = self.cache.set(TAG_LIST_KEY, &tags).await {
            tracing::warn!("Failed to cache tag list: {}", e);
        }
        Ok(tags)
    }

    /// Major tags, offered as categories in listing filters
    pub async fn categories(&self) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.list().await?.into_iter().filter(|t| t.major).collect())
    }

    pub async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, TagServiceError> {
        Ok(self
            .repo
            .list_with_counts()
            .await
            .context("Failed to list tags with counts")?)
    }

    /// Rename and/or change the major flag
    pub async fn update(&self, id: i64, name: Option<&str>, major: Option<bool>) -> Result<Tag, TagServiceError> {
        let mut tag = self.get_by_id(id).await?;

        if let Some(name) = name {
            let name = normalize_tag_name(name);
            if name.is_empty() {
                return Err(TagServiceError::ValidationError(
                    "Tag name cannot be empty".to_string(),
                ));
            }
            if let Some(other) = self.repo.get_by_name(&name).await? {
                if other.id != id {
                    return Err(TagServiceError::ValidationError(format!(
                        "Tag '{}' already exists",
                        name
                    )));
                }
            }
            tag.name = name;
        }
        if let Some(major) = major {
            tag.major = major;
        }

        let updated = self.repo.update(&tag).await.context("Failed to update tag")?;
        self.invalidate().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        self.get_by_id(id).await?;
        self.repo.delete(id).await.context("Failed to delete tag")?;
        self.invalidate().await;
        Ok(())
    }

    /// Tag an article by name, creating the tag when needed
    pub async fn attach_to_article(&self, article_id: i64, name: &str) -> Result<Tag, TagServiceError> {
        let tag = self.create_or_get(name, false).await?;
        self.repo.add_to_article(tag.id, article_id).await?;
        Ok(tag)
    }

    pub async fn detach_from_article(&self, article_id: i64, tag_id: i64) -> Result<(), TagServiceError> {
        self.repo.remove_from_article(tag_id, article_id).await?;
        Ok(())
    }

    pub async fn for_article(&self, article_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.repo.get_by_article_id(article_id).await?)
    }

    /// Tag an image by name, creating the tag when needed
    pub async fn attach_to_image(&self, image_id: i64, name: &str) -> Result<Tag, TagServiceError> {
        let tag = self.create_or_get(name, false).await?;
        self.repo.add_to_image(tag.id, image_id).await?;
        Ok(tag)
    }

    pub async fn detach_from_image(&self, image_id: i64, tag_id: i64) -> Result<(), TagServiceError> {
        self.repo.remove_from_image(tag_id, image_id).await?;
        Ok(())
    }

    pub async fn for_image(&self, image_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.repo.get_by_image_id(image_id).await?)
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_prefix(TAG_PREFIX).await {
            tracing::warn!("Failed to invalidate tag cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::test_support::{insert_article, insert_image, setup_pool};
    use crate::db::repositories::SqlxTagRepository;
    use crate::db::DynDatabasePool;

    async fn setup_test_service() -> (DynDatabasePool, TagService) {
        let pool = setup_pool().await;
        let service = TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_create_normalizes_and_reuses() {
        let (_pool, service) = setup_test_service().await;

        let first = service.create_or_get("   test tag1", false).await.unwrap();
        assert_eq!(first.name, "Test tag1");
        assert!(!first.major);

        let again = service.create_or_get("TEST TAG1 ", true).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(
            service.create_or_get("   ", false).await,
            Err(TagServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_list_cache_is_invalidated() {
        let (_pool, service) = setup_test_service().await;
        service.create_or_get("Politics", true).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);

        service.create_or_get("Sport", false).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 2);
        assert_eq!(service.categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, service) = setup_test_service().await;
        let tag = service.create_or_get("Politics", false).await.unwrap();
        let other = service.create_or_get("Sport", false).await.unwrap();

        let renamed = service.update(tag.id, Some("world politics"), Some(true)).await.unwrap();
        assert_eq!(renamed.name, "World politics");
        assert!(renamed.major);

        assert!(matches!(
            service.update(other.id, Some("WORLD POLITICS"), None).await,
            Err(TagServiceError::ValidationError(_))
        ));

        service.delete(tag.id).await.unwrap();
        assert!(matches!(service.get_by_id(tag.id).await, Err(TagServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_attach_to_article_and_image() {
        let (pool, service) = setup_test_service().await;
        let article = insert_article(&pool, None, "Story", true).await;
        let image = insert_image(&pool, "photo").await;

        let tag = service.attach_to_article(article, " sport").await.unwrap();
        service.attach_to_image(image, "SPORT").await.unwrap();

        assert_eq!(service.for_article(article).await.unwrap(), vec![tag.clone()]);
        assert_eq!(service.for_image(image).await.unwrap(), vec![tag.clone()]);

        service.detach_from_article(article, tag.id).await.unwrap();
        service.detach_from_image(image, tag.id).await.unwrap();
        assert!(service.for_article(article).await.unwrap().is_empty());
        assert!(service.for_image(image).await.unwrap().is_empty());
    }
}
