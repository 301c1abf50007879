//! Tag repository
//!
//! Tags plus their many-to-many links to articles and images.

use crate::db::{insert_ignore, with_pool, DynDatabasePool, InsertId};
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Insert a tag. The name must already be normalized.
    async fn create(&self, name: &str, major: bool) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Exact lookup on the normalized name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// All tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Tags with article and image counts, ordered by name
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;

    async fn update(&self, tag: &Tag) -> Result<Tag>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn add_to_article(&self, tag_id: i64, article_id: i64) -> Result<()>;

    async fn remove_from_article(&self, tag_id: i64, article_id: i64) -> Result<()>;

    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>>;

    async fn add_to_image(&self, tag_id: i64, image_id: i64) -> Result<()>;

    async fn remove_from_image(&self, tag_id: i64, image_id: i64) -> Result<()>;

    async fn get_by_image_id(&self, image_id: i64) -> Result<Vec<Tag>>;
}

/// SQLx-based tag repository, SQLite or MySQL
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, name: &str, major: bool) -> Result<Tag> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO tags (name, major) VALUES (?, ?)")
                .bind(name)
                .bind(major)
                .execute(pool)
                .await
                .context("Failed to create tag")?
                .inserted_id()
        });

        Ok(Tag {
            id,
            name: name.to_string(),
            major,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let tag = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>("SELECT id, name, major FROM tags WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get tag by ID")?
        });
        Ok(tag)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let tag = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>("SELECT id, name, major FROM tags WHERE name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await
                .context("Failed to get tag by name")?
        });
        Ok(tag)
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let tags = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>("SELECT id, name, major FROM tags ORDER BY name")
                .fetch_all(pool)
                .await
                .context("Failed to list tags")?
        });
        Ok(tags)
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        let tags = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, TagWithCount>(
                r#"
                SELECT t.id, t.name, t.major,
                       (SELECT COUNT(*) FROM article_tags at WHERE at.tag_id = t.id) AS article_count,
                       (SELECT COUNT(*) FROM image_tags it WHERE it.tag_id = t.id) AS image_count
                FROM tags t
                ORDER BY t.name
                "#,
            )
            .fetch_all(pool)
            .await
            .context("Failed to list tags with counts")?
        });
        Ok(tags)
    }

    async fn update(&self, tag: &Tag) -> Result<Tag> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE tags SET name = ?, major = ? WHERE id = ?")
                .bind(&tag.name)
                .bind(tag.major)
                .bind(tag.id)
                .execute(pool)
                .await
                .context("Failed to update tag")?;
        });
        Ok(tag.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete tag")?;
        });
        Ok(())
    }

    async fn add_to_article(&self, tag_id: i64, article_id: i64) -> Result<()> {
        let sql = format!(
            "{} INTO article_tags (article_id, tag_id) VALUES (?, ?)",
            insert_ignore(&self.pool)
        );
        with_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(article_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .context("Failed to add tag to article")?;
        });
        Ok(())
    }

    async fn remove_from_article(&self, tag_id: i64, article_id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM article_tags WHERE article_id = ? AND tag_id = ?")
                .bind(article_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .context("Failed to remove tag from article")?;
        });
        Ok(())
    }

    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>> {
        let tags = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>(
                r#"
                SELECT t.id, t.name, t.major
                FROM tags t
                INNER JOIN article_tags at ON at.tag_id = t.id
                WHERE at.article_id = ?
                ORDER BY t.name
                "#,
            )
            .bind(article_id)
            .fetch_all(pool)
            .await
            .context("Failed to get tags for article")?
        });
        Ok(tags)
    }

    async fn add_to_image(&self, tag_id: i64, image_id: i64) -> Result<()> {
        let sql = format!(
            "{} INTO image_tags (image_id, tag_id) VALUES (?, ?)",
            insert_ignore(&self.pool)
        );
        with_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(image_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .context("Failed to add tag to image")?;
        });
        Ok(())
    }

    async fn remove_from_image(&self, tag_id: i64, image_id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM image_tags WHERE image_id = ? AND tag_id = ?")
                .bind(image_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .context("Failed to remove tag from image")?;
        });
        Ok(())
    }

    async fn get_by_image_id(&self, image_id: i64) -> Result<Vec<Tag>> {
        let tags = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>(
                r#"
                SELECT t.id, t.name, t.major
                FROM tags t
                INNER JOIN image_tags it ON it.tag_id = t.id
                WHERE it.image_id = ?
                ORDER BY t.name
                "#,
            )
            .bind(image_id)
            .fetch_all(pool)
            .await
            .context("Failed to get tags for image")?
        });
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_article, insert_image, insert_user, setup_pool};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = setup_pool().await;
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get_tag() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create("Rust", false).await.unwrap();
        assert!(created.id > 0);
        assert!(!created.major);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id, created);

        let by_name = repo.get_by_name("Rust").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert!(repo.get_by_name("Go").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_fails() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create("Rust", false).await.unwrap();
        assert!(repo.create("Rust", true).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let mut tag = repo.create("Politics", false).await.unwrap();

        tag.major = true;
        repo.update(&tag).await.unwrap();
        assert!(repo.get_by_id(tag.id).await.unwrap().unwrap().major);

        repo.delete(tag.id).await.unwrap();
        assert!(repo.get_by_id(tag.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_article_and_image_links() {
        let (pool, repo) = setup_test_repo().await;
        let user = insert_user(&pool, "author").await;
        let article = insert_article(&pool, Some(user), "Article", true).await;
        let image = insert_image(&pool, "photo").await;

        let tag = repo.create("Sport", false).await.unwrap();
        repo.add_to_article(tag.id, article).await.unwrap();
        // Linking twice is a no-op
        repo.add_to_article(tag.id, article).await.unwrap();
        repo.add_to_image(tag.id, image).await.unwrap();

        assert_eq!(repo.get_by_article_id(article).await.unwrap(), vec![tag.clone()]);
        assert_eq!(repo.get_by_image_id(image).await.unwrap(), vec![tag.clone()]);

        let counts = repo.list_with_counts().await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].article_count, 1);
        assert_eq!(counts[0].image_count, 1);

        repo.remove_from_article(tag.id, article).await.unwrap();
        repo.remove_from_image(tag.id, image).await.unwrap();
        assert!(repo.get_by_article_id(article).await.unwrap().is_empty());
        assert!(repo.get_by_image_id(image).await.unwrap().is_empty());
    }
}
