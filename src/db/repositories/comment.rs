//! Comment repository
//!
//! Reader comments with like/dislike reactions.

use super::{bind_values, SqlValue, WhereClause};
use crate::db::{insert_ignore, with_pool, DynDatabasePool, InsertId};
use crate::models::{Comment, ListParams, Reaction};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.article_id, c.author_id, u.username AS author_name, c.text, c.pub_date,
           (SELECT COUNT(*) FROM comment_fans f WHERE f.comment_id = c.id) AS likes,
           (SELECT COUNT(*) FROM comment_haters h WHERE h.comment_id = c.id) AS dislikes
    FROM comments c
    INNER JOIN users u ON u.id = c.author_id
"#;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, article_id: i64, author_id: i64, text: &str, pub_date: DateTime<Utc>) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    async fn update_text(&self, id: i64, text: &str) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Comments of an article, oldest first
    async fn list_for_article(&self, article_id: i64) -> Result<Vec<Comment>>;

    /// One page of comments, newest first, optionally for one article and
    /// only under displayed articles
    async fn list(
        &self,
        article_id: Option<i64>,
        only_displayed: bool,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)>;

    /// Record a reaction. Liking clears a previous dislike and vice versa.
    async fn set_reaction(&self, comment_id: i64, user_id: i64, reaction: Reaction) -> Result<()>;
}

/// SQLx-based comment repository, SQLite or MySQL
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, article_id: i64, author_id: i64, text: &str, pub_date: DateTime<Utc>) -> Result<Comment> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO comments (article_id, author_id, text, pub_date) VALUES (?, ?, ?, ?)")
                .bind(article_id)
                .bind(author_id)
                .bind(text)
                .bind(pub_date)
                .execute(pool)
                .await
                .context("Failed to create comment")?
                .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .context("Comment not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("{} WHERE c.id = ?", COMMENT_SELECT);
        let comment = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Comment>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get comment by ID")?
        });
        Ok(comment)
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
                .bind(text)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update comment")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete comment")?;
        });
        Ok(())
    }

    async fn list_for_article(&self, article_id: i64) -> Result<Vec<Comment>> {
        let sql = format!("{} WHERE c.article_id = ? ORDER BY c.pub_date, c.id", COMMENT_SELECT);
        let comments = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Comment>(&sql)
                .bind(article_id)
                .fetch_all(pool)
                .await
                .context("Failed to list comments")?
        });
        Ok(comments)
    }

    async fn list(
        &self,
        article_id: Option<i64>,
        only_displayed: bool,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)> {
        let mut clause = WhereClause::default();
        if let Some(article_id) = article_id {
            clause.push("c.article_id = ?", [SqlValue::Int(article_id)]);
        }
        if only_displayed {
            clause.push(
                "c.article_id IN (SELECT id FROM articles WHERE for_display = ?)",
                [SqlValue::Bool(true)],
            );
        }
        let where_sql = clause.sql();
        let count_sql = format!("SELECT COUNT(*) FROM comments c{}", where_sql);
        let list_sql = format!(
            "{}{} ORDER BY c.pub_date DESC, c.id DESC LIMIT ? OFFSET ?",
            COMMENT_SELECT, where_sql
        );

        let total: i64 = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), clause.values)
                .fetch_one(pool)
                .await
                .context("Failed to count comments")?
        });
        let comments = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_as::<_, Comment>(&list_sql), clause.values)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list comments")?
        });
        Ok((comments, total))
    }

    async fn set_reaction(&self, comment_id: i64, user_id: i64, reaction: Reaction) -> Result<()> {
        let (add_to, remove_from) = match reaction {
            Reaction::Like => ("comment_fans", "comment_haters"),
            Reaction::Dislike => ("comment_haters", "comment_fans"),
        };
        let remove_sql = format!("DELETE FROM {} WHERE comment_id = ? AND user_id = ?", remove_from);
        let add_sql = format!(
            "{} INTO {} (comment_id, user_id) VALUES (?, ?)",
            insert_ignore(&self.pool),
            add_to
        );

        with_pool!(self.pool, |pool| {
            sqlx::query(&remove_sql)
                .bind(comment_id)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to clear comment reaction")?;
        });
        with_pool!(self.pool, |pool| {
            sqlx::query(&add_sql)
                .bind(comment_id)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to record comment reaction")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_article, insert_user, setup_pool};

    #[tokio::test]
    async fn test_create_and_list() {
        let pool = setup_pool().await;
        let reader = insert_user(&pool, "reader").await;
        let article = insert_article(&pool, None, "Story", true).await;
        let repo = SqlxCommentRepository::new(pool);

        let comment = repo.create(article, reader, "Great read", Utc::now()).await.unwrap();
        assert_eq!(comment.author_name, "reader");
        assert_eq!((comment.likes, comment.dislikes), (0, 0));

        let listed = repo.list_for_article(article).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "Great read");
        let (page, total) = repo.list(Some(article), true, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].id, comment.id);
        assert_eq!(repo.list(Some(article + 1), false, &ListParams::default()).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn test_list_can_skip_hidden_articles() {
        let pool = setup_pool().await;
        let reader = insert_user(&pool, "reader").await;
        let shown = insert_article(&pool, None, "Shown", true).await;
        let hidden = insert_article(&pool, None, "Hidden", false).await;
        let repo = SqlxCommentRepository::new(pool);
        repo.create(shown, reader, "visible", Utc::now()).await.unwrap();
        repo.create(hidden, reader, "secret", Utc::now()).await.unwrap();

        let (page, total) = repo.list(None, true, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].text, "visible");
        assert_eq!(repo.list(None, false, &ListParams::default()).await.unwrap().1, 2);
        assert_eq!(repo.list(Some(hidden), true, &ListParams::default()).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn test_reactions_are_exclusive() {
        let pool = setup_pool().await;
        let reader = insert_user(&pool, "reader").await;
        let other = insert_user(&pool, "other").await;
        let article = insert_article(&pool, None, "Story", true).await;
        let repo = SqlxCommentRepository::new(pool);
        let comment = repo.create(article, reader, "text", Utc::now()).await.unwrap();

        repo.set_reaction(comment.id, other, Reaction::Like).await.unwrap();
        repo.set_reaction(comment.id, other, Reaction::Like).await.unwrap();
        let stored = repo.get_by_id(comment.id).await.unwrap().unwrap();
        assert_eq!((stored.likes, stored.dislikes), (1, 0));

        repo.set_reaction(comment.id, other, Reaction::Dislike).await.unwrap();
        let stored = repo.get_by_id(comment.id).await.unwrap().unwrap();
        assert_eq!((stored.likes, stored.dislikes), (0, 1));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = setup_pool().await;
        let reader = insert_user(&pool, "reader").await;
        let article = insert_article(&pool, None, "Story", true).await;
        let repo = SqlxCommentRepository::new(pool);
        let comment = repo.create(article, reader, "typo", Utc::now()).await.unwrap();

        repo.update_text(comment.id, "fixed").await.unwrap();
        assert_eq!(repo.get_by_id(comment.id).await.unwrap().unwrap().text, "fixed");

        repo.delete(comment.id).await.unwrap();
        assert!(repo.get_by_id(comment.id).await.unwrap().is_none());
    }
}
