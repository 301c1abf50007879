//! Image repository
//!
//! The image library and its attachments to articles. An attachment may be
//! flagged as the article's lead image.

use super::{bind_values, placeholders, SqlValue, WhereClause};
use crate::db::{insert_ignore, with_pool, DynDatabasePool, InsertId};
use crate::models::{ArticleImage, Image, ImageFilter, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const IMAGE_SELECT: &str = "SELECT i.id, i.name, i.photo, i.pub_date FROM images i";

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn create(&self, name: &str, photo: &str, pub_date: DateTime<Utc>) -> Result<Image>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Image>>;

    async fn rename(&self, id: i64, name: &str) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Filtered page of images, newest first, plus the total match count
    async fn list(&self, filter: &ImageFilter, params: &ListParams) -> Result<(Vec<Image>, i64)>;

    async fn list_by_tag(&self, tag_id: i64) -> Result<Vec<Image>>;

    /// The oldest image in the library
    async fn first(&self) -> Result<Option<Image>>;

    /// Attach an image to an article, or update the lead flag of an existing link
    async fn attach(&self, article_id: i64, image_id: i64, is_lead: bool) -> Result<()>;

    async fn detach(&self, article_id: i64, image_id: i64) -> Result<()>;

    /// Drop the lead flag from every image of the article
    async fn clear_lead(&self, article_id: i64) -> Result<()>;

    /// Attached images, lead image first
    async fn list_for_article(&self, article_id: i64) -> Result<Vec<ArticleImage>>;
}

/// SQLx-based image repository, SQLite or MySQL
pub struct SqlxImageRepository {
    pool: DynDatabasePool,
}

impl SqlxImageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ImageRepository> {
        Arc::new(Self::new(pool))
    }
}

fn filter_clause(filter: &ImageFilter, now: DateTime<Utc>) -> WhereClause {
    let mut clause = WhereClause::default();

    if !filter.search.is_empty() {
        let mut condition = format!(
            "(EXISTS (SELECT 1 FROM image_tags sit INNER JOIN tags st ON st.id = sit.tag_id \
             WHERE sit.image_id = i.id AND st.name IN ({}))",
            placeholders(filter.search.len())
        );
        let mut values: Vec<SqlValue> = filter
            .search
            .iter()
            .map(|word| SqlValue::Text(word.clone()))
            .collect();
        for word in &filter.search {
            condition.push_str(" OR LOWER(i.name) LIKE ?");
            values.push(SqlValue::Text(format!("%{}%", word.to_lowercase())));
        }
        condition.push(')');
        clause.push(condition, values);
    }

    if let Some(category) = &filter.category {
        clause.push(
            "EXISTS (SELECT 1 FROM image_tags cit INNER JOIN tags ct ON ct.id = cit.tag_id \
             WHERE cit.image_id = i.id AND ct.name = ?)",
            [SqlValue::Text(category.clone())],
        );
    }

    if let Some(period) = filter.pub_period {
        clause.push("i.pub_date >= ?", [SqlValue::Time(period.cutoff(now))]);
    }

    clause
}

#[async_trait]
impl ImageRepository for SqlxImageRepository {
    async fn create(&self, name: &str, photo: &str, pub_date: DateTime<Utc>) -> Result<Image> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO images (name, photo, pub_date) VALUES (?, ?, ?)")
                .bind(name)
                .bind(photo)
                .bind(pub_date)
                .execute(pool)
                .await
                .context("Failed to create image")?
                .inserted_id()
        });

        Ok(Image {
            id,
            name: name.to_string(),
            photo: photo.to_string(),
            pub_date,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Image>> {
        let sql = format!("{} WHERE i.id = ?", IMAGE_SELECT);
        let image = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Image>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get image by ID")?
        });
        Ok(image)
    }

    async fn rename(&self, id: i64, name: &str) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE images SET name = ? WHERE id = ?")
                .bind(name)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to rename image")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM images WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete image")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &ImageFilter, params: &ListParams) -> Result<(Vec<Image>, i64)> {
        let clause = filter_clause(filter, Utc::now());
        let where_sql = clause.sql();
        let count_sql = format!("SELECT COUNT(*) FROM images i{}", where_sql);
        let list_sql = format!(
            "{}{} ORDER BY i.pub_date DESC, i.id DESC LIMIT ? OFFSET ?",
            IMAGE_SELECT, where_sql
        );

        let total: i64 = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), clause.values)
                .fetch_one(pool)
                .await
                .context("Failed to count images")?
        });

        let images = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_as::<_, Image>(&list_sql), clause.values)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list images")?
        });

        Ok((images, total))
    }

    async fn list_by_tag(&self, tag_id: i64) -> Result<Vec<Image>> {
        let sql = format!(
            "{} INNER JOIN image_tags it ON it.image_id = i.id WHERE it.tag_id = ? ORDER BY i.pub_date DESC, i.id DESC",
            IMAGE_SELECT
        );
        let images = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Image>(&sql)
                .bind(tag_id)
                .fetch_all(pool)
                .await
                .context("Failed to list images by tag")?
        });
        Ok(images)
    }

    async fn first(&self) -> Result<Option<Image>> {
        let sql = format!("{} ORDER BY i.id LIMIT 1", IMAGE_SELECT);
        let image = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Image>(&sql)
                .fetch_optional(pool)
                .await
                .context("Failed to get first image")?
        });
        Ok(image)
    }

    async fn attach(&self, article_id: i64, image_id: i64, is_lead: bool) -> Result<()> {
        let sql = format!(
            "{} INTO article_images (article_id, image_id, is_lead) VALUES (?, ?, ?)",
            insert_ignore(&self.pool)
        );
        with_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(article_id)
                .bind(image_id)
                .bind(is_lead)
                .execute(pool)
                .await
                .context("Failed to attach image")?;
        });
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE article_images SET is_lead = ? WHERE article_id = ? AND image_id = ?")
                .bind(is_lead)
                .bind(article_id)
                .bind(image_id)
                .execute(pool)
                .await
                .context("Failed to set lead image")?;
        });
        Ok(())
    }

    async fn detach(&self, article_id: i64, image_id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM article_images WHERE article_id = ? AND image_id = ?")
                .bind(article_id)
                .bind(image_id)
                .execute(pool)
                .await
                .context("Failed to detach image")?;
        });
        Ok(())
    }

    async fn clear_lead(&self, article_id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE article_images SET is_lead = ? WHERE article_id = ?")
                .bind(false)
                .bind(article_id)
                .execute(pool)
                .await
                .context("Failed to clear lead image")?;
        });
        Ok(())
    }

    async fn list_for_article(&self, article_id: i64) -> Result<Vec<ArticleImage>> {
        let images = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, ArticleImage>(
                r#"
                SELECT i.id, i.name, i.photo, i.pub_date, ai.is_lead
                FROM images i
                INNER JOIN article_images ai ON ai.image_id = i.id
                WHERE ai.article_id = ?
                ORDER BY ai.is_lead DESC, i.id
                "#,
            )
            .bind(article_id)
            .fetch_all(pool)
            .await
            .context("Failed to list article images")?
        });
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_article, setup_pool};
    use crate::db::repositories::{SqlxTagRepository, TagRepository};

    #[tokio::test]
    async fn test_create_rename_delete() {
        let pool = setup_pool().await;
        let repo = SqlxImageRepository::new(pool);

        let image = repo
            .create("default", "article_images/a.jpg", Utc::now())
            .await
            .unwrap();
        assert_eq!(repo.first().await.unwrap().map(|i| i.id), Some(image.id));

        repo.rename(image.id, "Parliament").await.unwrap();
        assert_eq!(repo.get_by_id(image.id).await.unwrap().unwrap().name, "Parliament");

        repo.delete(image.id).await.unwrap();
        assert!(repo.get_by_id(image.id).await.unwrap().is_none());
        assert!(repo.first().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attach_and_lead() {
        let pool = setup_pool().await;
        let article = insert_article(&pool, None, "Story", true).await;
        let repo = SqlxImageRepository::new(pool);
        let a = repo.create("a", "article_images/a.jpg", Utc::now()).await.unwrap();
        let b = repo.create("b", "article_images/b.jpg", Utc::now()).await.unwrap();

        repo.attach(article, a.id, false).await.unwrap();
        repo.attach(article, b.id, true).await.unwrap();

        let attached = repo.list_for_article(article).await.unwrap();
        assert_eq!(attached.len(), 2);
        assert_eq!(attached[0].id, b.id);
        assert!(attached[0].is_lead);

        repo.clear_lead(article).await.unwrap();
        repo.attach(article, a.id, true).await.unwrap();
        let attached = repo.list_for_article(article).await.unwrap();
        assert_eq!(attached[0].id, a.id);
        assert_eq!(attached.iter().filter(|i| i.is_lead).count(), 1);

        repo.detach(article, a.id).await.unwrap();
        assert_eq!(repo.list_for_article(article).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_search() {
        let pool = setup_pool().await;
        let tags = SqlxTagRepository::new(pool.clone());
        let repo = SqlxImageRepository::new(pool);

        let image = repo.create("default", "article_images/a.jpg", Utc::now()).await.unwrap();
        repo.create("Harbor at dawn", "article_images/b.jpg", Utc::now()).await.unwrap();
        let tag = tags.create("Tag", false).await.unwrap();
        tags.add_to_image(tag.id, image.id).await.unwrap();

        let params = ListParams::default();
        let (all, total) = repo.list(&ImageFilter::default(), &params).await.unwrap();
        assert_eq!((all.len(), total), (2, 2));

        let by_tag = ImageFilter {
            search: vec!["Tag".into()],
            ..Default::default()
        };
        let (found, _) = repo.list(&by_tag, &params).await.unwrap();
        assert_eq!(found.iter().map(|i| i.id).collect::<Vec<_>>(), vec![image.id]);

        let by_name = ImageFilter {
            search: vec!["Harbor".into()],
            ..Default::default()
        };
        assert_eq!(repo.list(&by_name, &params).await.unwrap().1, 1);

        let missing = ImageFilter {
            search: vec!["Error".into()],
            ..Default::default()
        };
        assert_eq!(repo.list(&missing, &params).await.unwrap().1, 0);

        let tagged = repo.list_by_tag(tag.id).await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, image.id);
    }
}
