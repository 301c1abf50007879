//! Image service
//!
//! Uploads land in `<upload.path>/article_images/<uuid>.<ext>`. Images
//! uploaded without a name are named after their publication time.

use crate::cache::{MemoryCache, HOME_PREFIX};
use crate::config::UploadConfig;
use crate::db::repositories::{ArticleRepository, ImageRepository};
use crate::models::{
    default_image_name, Article, ArticleImage, Image, ImageFilter, ListParams, PagedResult,
    IMAGE_UPLOAD_DIR,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ImageServiceError {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Photo URL for an article: its lead image, any attached image, then the
/// library fallback.
pub fn pick_lead_photo(attached: &[ArticleImage], fallback: Option<&Image>) -> Option<String> {
    attached
        .iter()
        .find(|image| image.is_lead)
        .or_else(|| attached.first())
        .map(ArticleImage::url)
        .or_else(|| fallback.map(Image::url))
}

pub struct ImageService {
    repo: Arc<dyn ImageRepository>,
    articles: Arc<dyn ArticleRepository>,
    config: UploadConfig,
    cache: Arc<MemoryCache>,
}

impl ImageService {
    pub fn new(
        repo: Arc<dyn ImageRepository>,
        articles: Arc<dyn ArticleRepository>,
        config: UploadConfig,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            articles,
            config,
            cache,
        }
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.config
    }

    /// Store an uploaded file and create its image row.
    ///
    /// A blank `name` is replaced by the auto-generated one.
    pub async fn upload(
        &self,
        data: &[u8],
        content_type: &str,
        name: Option<&str>,
    ) -> Result<Image, ImageServiceError> {
        if !self.config.is_type_allowed(content_type) {
            return Err(ImageServiceError::ValidationError(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                self.config.allowed_types.join(", ")
            )));
        }
        if data.is_empty() {
            return Err(ImageServiceError::ValidationError(
                "No file provided".to_string(),
            ));
        }
        if data.len() as u64 > self.config.max_file_size {
            return Err(ImageServiceError::ValidationError(format!(
                "File too large. Maximum size: {} MB",
                self.config.max_file_size / 1024 / 1024
            )));
        }

        let dir = self.config.path.join(IMAGE_UPLOAD_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;

        let filename = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(content_type));
        let file_path = dir.join(&filename);
        fs::write(&file_path, data)
            .await
            .context("Failed to save uploaded file")?;

        let pub_date = Utc::now();
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_image_name(pub_date),
        };
        let photo = format!("{}/{}", IMAGE_UPLOAD_DIR, filename);

        let image = match self.repo.create(&name, &photo, pub_date).await {
            Ok(image) => image,
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&file_path).await {
                    tracing::warn!("Failed to remove orphaned upload {}: {}", file_path.display(), remove_err);
                }
                return Err(e.into());
            }
        };
        tracing::info!("Uploaded image {} as {}", image.id, photo);
        // The home page falls back to the first library image
        self.invalidate_home().await;
        Ok(image)
    }

    pub async fn get(&self, id: i64) -> Result<Image, ImageServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get image")?
            .ok_or_else(|| ImageServiceError::NotFound(format!("Image {} not found", id)))
    }

    /// Rename an image; a blank name falls back to the generated one
    pub async fn rename(&self, id: i64, name: &str) -> Result<Image, ImageServiceError> {
        let mut image = self.get(id).await?;
        image.name = match name.trim() {
            "" => image.get_name(),
            trimmed => trimmed.to_string(),
        };
        self.repo.rename(id, &image.name).await?;
        Ok(image)
    }

    /// Delete the row and its file. A missing file is only logged.
    pub async fn delete(&self, id: i64) -> Result<(), ImageServiceError> {
        let image = self.get(id).await?;
        self.repo.delete(id).await?;

        let path = self.config.path.join(&image.photo);
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!("Failed to remove image file {}: {}", path.display(), e);
        }
        self.invalidate_home().await;
        Ok(())
    }

    /// Attach to an article; a lead assignment replaces the previous lead
    pub async fn assign(&self, image_id: i64, article_id: i64, lead: bool) -> Result<(), ImageServiceError> {
        self.get(image_id).await?;
        self.ensure_article(article_id).await?;

        if lead {
            self.repo.clear_lead(article_id).await?;
        }
        self.repo.attach(article_id, image_id, lead).await?;
        self.invalidate_home().await;
        Ok(())
    }

    pub async fn unassign(&self, image_id: i64, article_id: i64) -> Result<(), ImageServiceError> {
        self.repo.detach(article_id, image_id).await?;
        self.invalidate_home().await;
        Ok(())
    }

    pub async fn list(
        &self,
        filter: &ImageFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Image>, ImageServiceError> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_by_tag(&self, tag_id: i64) -> Result<Vec<Image>, ImageServiceError> {
        Ok(self.repo.list_by_tag(tag_id).await?)
    }

    pub async fn for_article(&self, article_id: i64) -> Result<Vec<ArticleImage>, ImageServiceError> {
        Ok(self.repo.list_for_article(article_id).await?)
    }

    /// Articles the image is attached to
    pub async fn articles_using(&self, image_id: i64) -> Result<Vec<Article>, ImageServiceError> {
        Ok(self.articles.list_by_image(image_id).await?)
    }

    pub async fn first(&self) -> Result<Option<Image>, ImageServiceError> {
        Ok(self.repo.first().await?)
    }

    /// Photo URL shown for an article, falling back to the first library image
    pub async fn lead_photo_for(&self, article_id: i64) -> Result<Option<String>, ImageServiceError> {
        let attached = self.repo.list_for_article(article_id).await?;
        let fallback = if attached.is_empty() {
            self.repo.first().await?
        } else {
            None
        };
        Ok(pick_lead_photo(&attached, fallback.as_ref()))
    }

    async fn ensure_article(&self, article_id: i64) -> Result<(), ImageServiceError> {
        if self.articles.get_by_id(article_id).await?.is_none() {
            return Err(ImageServiceError::NotFound(format!(
                "Article {} not found",
                article_id
            )));
        }
        Ok(())
    }

    async fn invalidate_home(&self) {
        if let Err(e) = self.cache.delete_prefix(HOME_PREFIX).await {
            tracing::warn!("Failed to invalidate home cache: {}", e);
        }
    }
}
