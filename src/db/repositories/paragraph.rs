//! Paragraph repository

use super::{bind_values, SqlValue, WhereClause};
use crate::db::{with_pool, DynDatabasePool, InsertId};
use crate::models::{ListParams, Paragraph};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const PARAGRAPH_COLUMNS: &str = "id, article_id, title, text, is_lead, position";

#[async_trait]
pub trait ParagraphRepository: Send + Sync {
    /// Append a paragraph after the article's existing ones
    async fn create(&self, article_id: i64, title: &str, text: &str, is_lead: bool) -> Result<Paragraph>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Paragraph>>;

    async fn update(&self, paragraph: &Paragraph) -> Result<Paragraph>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Paragraphs in display order
    async fn list_for_article(&self, article_id: i64) -> Result<Vec<Paragraph>>;

    /// One page of paragraphs, optionally restricted to an article and to
    /// displayed articles
    async fn list(
        &self,
        article_id: Option<i64>,
        only_displayed: bool,
        params: &ListParams,
    ) -> Result<(Vec<Paragraph>, i64)>;

    /// The article's lead paragraph, ignoring `except_id`
    async fn find_lead(&self, article_id: i64, except_id: Option<i64>) -> Result<Option<Paragraph>>;
}

/// SQLx-based paragraph repository, SQLite or MySQL
pub struct SqlxParagraphRepository {
    pool: DynDatabasePool,
}

impl SqlxParagraphRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ParagraphRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ParagraphRepository for SqlxParagraphRepository {
    async fn create(&self, article_id: i64, title: &str, text: &str, is_lead: bool) -> Result<Paragraph> {
        let position = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM paragraphs WHERE article_id = ?",
            )
            .bind(article_id)
            .fetch_one(pool)
            .await
            .context("Failed to get next paragraph position")?
        });

        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO paragraphs (article_id, title, text, is_lead, position) VALUES (?, ?, ?, ?, ?)")
                .bind(article_id)
                .bind(title)
                .bind(text)
                .bind(is_lead)
                .bind(position)
                .execute(pool)
                .await
                .context("Failed to create paragraph")?
                .inserted_id()
        });

        Ok(Paragraph {
            id,
            article_id,
            title: title.to_string(),
            text: text.to_string(),
            is_lead,
            position,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Paragraph>> {
        let sql = format!("SELECT {} FROM paragraphs WHERE id = ?", PARAGRAPH_COLUMNS);
        let paragraph = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Paragraph>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get paragraph by ID")?
        });
        Ok(paragraph)
    }

    async fn update(&self, paragraph: &Paragraph) -> Result<Paragraph> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE paragraphs SET title = ?, text = ?, is_lead = ?, position = ? WHERE id = ?")
                .bind(&paragraph.title)
                .bind(&paragraph.text)
                .bind(paragraph.is_lead)
                .bind(paragraph.position)
                .bind(paragraph.id)
                .execute(pool)
                .await
                .context("Failed to update paragraph")?;
        });
        Ok(paragraph.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM paragraphs WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete paragraph")?;
        });
        Ok(())
    }

    async fn list_for_article(&self, article_id: i64) -> Result<Vec<Paragraph>> {
        let sql = format!(
            "SELECT {} FROM paragraphs WHERE article_id = ? ORDER BY position, id",
            PARAGRAPH_COLUMNS
        );
        let paragraphs = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Paragraph>(&sql)
                .bind(article_id)
                .fetch_all(pool)
                .await
                .context("Failed to list paragraphs")?
        });
        Ok(paragraphs)
    }

    async fn list(
        &self,
        article_id: Option<i64>,
        only_displayed: bool,
        params: &ListParams,
    ) -> Result<(Vec<Paragraph>, i64)> {
        let mut clause = WhereClause::default();
        if let Some(article_id) = article_id {
            clause.push("article_id = ?", [SqlValue::Int(article_id)]);
        }
        if only_displayed {
            clause.push(
                "article_id IN (SELECT id FROM articles WHERE for_display = ?)",
                [SqlValue::Bool(true)],
            );
        }
        let where_sql = clause.sql();
        let count_sql = format!("SELECT COUNT(*) FROM paragraphs{}", where_sql);
        let list_sql = format!(
            "SELECT {} FROM paragraphs{} ORDER BY article_id, position, id LIMIT ? OFFSET ?",
            PARAGRAPH_COLUMNS, where_sql
        );

        let total: i64 = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), clause.values)
                .fetch_one(pool)
                .await
                .context("Failed to count paragraphs")?
        });
        let paragraphs = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_as::<_, Paragraph>(&list_sql), clause.values)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list paragraphs")?
        });
        Ok((paragraphs, total))
    }

    async fn find_lead(&self, article_id: i64, except_id: Option<i64>) -> Result<Option<Paragraph>> {
        let sql = format!(
            "SELECT {} FROM paragraphs WHERE article_id = ? AND is_lead = ? AND id <> ? LIMIT 1",
            PARAGRAPH_COLUMNS
        );
        let lead = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Paragraph>(&sql)
                .bind(article_id)
                .bind(true)
                .bind(except_id.unwrap_or(0))
                .fetch_optional(pool)
                .await
                .context("Failed to find lead paragraph")?
        });
        Ok(lead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_article, setup_pool};

    #[tokio::test]
    async fn test_create_orders_by_position() {
        let pool = setup_pool().await;
        let article = insert_article(&pool, None, "Story", true).await;
        let repo = SqlxParagraphRepository::new(pool);

        let first = repo.create(article, "Intro", "Once", false).await.unwrap();
        let second = repo.create(article, "Body", "Then", false).await.unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);

        let listed = repo.list_for_article(article).await.unwrap();
        assert_eq!(listed, vec![first, second]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = setup_pool().await;
        let article = insert_article(&pool, None, "Story", true).await;
        let repo = SqlxParagraphRepository::new(pool);

        let mut paragraph = repo.create(article, "paragraph", "", false).await.unwrap();
        paragraph.text = "Rewritten".into();
        repo.update(&paragraph).await.unwrap();
        assert_eq!(repo.get_by_id(paragraph.id).await.unwrap().unwrap().text, "Rewritten");

        repo.delete(paragraph.id).await.unwrap();
        assert!(repo.get_by_id(paragraph.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_lead() {
        let pool = setup_pool().await;
        let article = insert_article(&pool, None, "Story", true).await;
        let repo = SqlxParagraphRepository::new(pool);

        assert!(repo.find_lead(article, None).await.unwrap().is_none());

        let lead = repo.create(article, "Lead", "", true).await.unwrap();
        assert_eq!(repo.find_lead(article, None).await.unwrap(), Some(lead.clone()));
        assert!(repo.find_lead(article, Some(lead.id)).await.unwrap().is_none());

        // A second lead violates the unique index
        assert!(repo.create(article, "Other", "", true).await.is_err());
    }

    #[tokio::test]
    async fn test_paged_list() {
        let pool = setup_pool().await;
        let first = insert_article(&pool, None, "First", true).await;
        let second = insert_article(&pool, None, "Second", true).await;
        let hidden = insert_article(&pool, None, "Hidden", false).await;
        let repo = SqlxParagraphRepository::new(pool);
        for i in 0..3 {
            repo.create(first, &format!("p{}", i), "", false).await.unwrap();
        }
        repo.create(second, "other", "", false).await.unwrap();

        let (page, total) = repo.list(None, true, &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(page.len(), 2);

        let (only_second, total) = repo.list(Some(second), false, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(only_second[0].title, "other");

        repo.create(hidden, "secret", "", false).await.unwrap();
        assert_eq!(repo.list(None, true, &ListParams::default()).await.unwrap().1, 4);
        assert_eq!(repo.list(None, false, &ListParams::default()).await.unwrap().1, 5);
        assert_eq!(repo.list(Some(hidden), true, &ListParams::default()).await.unwrap().1, 0);
        assert_eq!(repo.list(Some(hidden), false, &ListParams::default()).await.unwrap().1, 1);
    }
}
