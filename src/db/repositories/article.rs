//! Article repository
//!
//! Articles with their fan and visitor counters. Listing supports tag/title
//! search, category, author and publication window filters.

use super::{bind_values, placeholders, SqlValue, WhereClause};
use crate::db::{insert_ignore, with_pool, DynDatabasePool, InsertId};
use crate::models::{Article, ArticleFilter, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const ARTICLE_SELECT: &str = r#"
    SELECT a.id, a.title, a.author_id, u.username AS author_name,
           a.for_display, a.popularity, a.pub_date,
           (SELECT COUNT(*) FROM article_fans f WHERE f.article_id = a.id) AS likes,
           (SELECT COUNT(*) FROM article_visitors v WHERE v.article_id = a.id) AS views
    FROM articles a
    LEFT JOIN users u ON u.id = a.author_id
"#;

const ARTICLE_ORDER: &str = " ORDER BY a.pub_date DESC, a.id DESC";

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create(
        &self,
        title: &str,
        author_id: Option<i64>,
        for_display: bool,
        pub_date: DateTime<Utc>,
    ) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn update(&self, id: i64, title: &str, for_display: bool) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Filtered page of articles, newest first, plus the total match count
    async fn list(&self, filter: &ArticleFilter, params: &ListParams) -> Result<(Vec<Article>, i64)>;

    async fn list_by_tag(&self, tag_id: i64, only_displayed: bool) -> Result<Vec<Article>>;

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Article>>;

    /// Articles an image is attached to
    async fn list_by_image(&self, image_id: i64) -> Result<Vec<Article>>;

    async fn add_fan(&self, article_id: i64, user_id: i64) -> Result<()>;

    async fn remove_fan(&self, article_id: i64, user_id: i64) -> Result<()>;

    async fn is_fan(&self, article_id: i64, user_id: i64) -> Result<bool>;

    /// Record a distinct visitor; repeated visits are ignored
    async fn add_visitor(&self, article_id: i64, user_id: i64) -> Result<()>;

    async fn increment_popularity(&self, article_id: i64) -> Result<()>;
}

/// SQLx-based article repository, SQLite or MySQL
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_where(&self, clause: &WhereClause) -> Result<Vec<Article>> {
        let sql = format!("{}{}{}", ARTICLE_SELECT, clause.sql(), ARTICLE_ORDER);
        let articles = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_as::<_, Article>(&sql), clause.values)
                .fetch_all(pool)
                .await
                .context("Failed to list articles")?
        });
        Ok(articles)
    }
}

/// Translate an [`ArticleFilter`] into SQL conditions
fn filter_clause(filter: &ArticleFilter, now: DateTime<Utc>) -> WhereClause {
    let mut clause = WhereClause::default();

    if filter.only_displayed {
        clause.push("a.for_display = ?", [SqlValue::Bool(true)]);
    }

    if !filter.search.is_empty() {
        let mut condition = format!(
            "(EXISTS (SELECT 1 FROM article_tags sat INNER JOIN tags st ON st.id = sat.tag_id \
             WHERE sat.article_id = a.id AND st.name IN ({}))",
            placeholders(filter.search.len())
        );
        let mut values: Vec<SqlValue> = filter
            .search
            .iter()
            .map(|word| SqlValue::Text(word.clone()))
            .collect();
        for word in &filter.search {
            condition.push_str(" OR LOWER(a.title) LIKE ?");
            values.push(SqlValue::Text(format!("%{}%", word.to_lowercase())));
        }
        condition.push(')');
        clause.push(condition, values);
    }

    if let Some(category) = &filter.category {
        clause.push(
            "EXISTS (SELECT 1 FROM article_tags cat INNER JOIN tags ct ON ct.id = cat.tag_id \
             WHERE cat.article_id = a.id AND ct.name = ?)",
            [SqlValue::Text(category.clone())],
        );
    }

    if let Some(author) = &filter.author {
        clause.push("u.username = ?", [SqlValue::Text(author.clone())]);
    }

    if let Some(period) = filter.pub_period {
        clause.push("a.pub_date >= ?", [SqlValue::Time(period.cutoff(now))]);
    }

    clause
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(
        &self,
        title: &str,
        author_id: Option<i64>,
        for_display: bool,
        pub_date: DateTime<Utc>,
    ) -> Result<Article> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO articles (title, author_id, for_display, popularity, pub_date) VALUES (?, ?, ?, 0, ?)")
                .bind(title)
                .bind(author_id)
                .bind(for_display)
                .bind(pub_date)
                .execute(pool)
                .await
                .context("Failed to create article")?
                .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .context("Article not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("{} WHERE a.id = ?", ARTICLE_SELECT);
        let article = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Article>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get article by ID")?
        });
        Ok(article)
    }

    async fn update(&self, id: i64, title: &str, for_display: bool) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE articles SET title = ?, for_display = ? WHERE id = ?")
                .bind(title)
                .bind(for_display)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update article")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM articles WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete article")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &ArticleFilter, params: &ListParams) -> Result<(Vec<Article>, i64)> {
        let clause = filter_clause(filter, Utc::now());
        let where_sql = clause.sql();

        let count_sql = format!(
            "SELECT COUNT(*) FROM articles a LEFT JOIN users u ON u.id = a.author_id{}",
            where_sql
        );
        let list_sql = format!(
            "{}{}{} LIMIT ? OFFSET ?",
            ARTICLE_SELECT, where_sql, ARTICLE_ORDER
        );

        let total: i64 = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), clause.values)
                .fetch_one(pool)
                .await
                .context("Failed to count articles")?
        });

        let articles = with_pool!(self.pool, |pool| {
            bind_values!(sqlx::query_as::<_, Article>(&list_sql), clause.values)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list articles")?
        });

        Ok((articles, total))
    }

    async fn list_by_tag(&self, tag_id: i64, only_displayed: bool) -> Result<Vec<Article>> {
        let mut clause = WhereClause::default();
        clause.push(
            "EXISTS (SELECT 1 FROM article_tags at WHERE at.article_id = a.id AND at.tag_id = ?)",
            [SqlValue::Int(tag_id)],
        );
        if only_displayed {
            clause.push("a.for_display = ?", [SqlValue::Bool(true)]);
        }
        self.fetch_where(&clause).await
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Article>> {
        let mut clause = WhereClause::default();
        clause.push("a.author_id = ?", [SqlValue::Int(author_id)]);
        self.fetch_where(&clause).await
    }

    async fn list_by_image(&self, image_id: i64) -> Result<Vec<Article>> {
        let mut clause = WhereClause::default();
        clause.push(
            "EXISTS (SELECT 1 FROM article_images ai WHERE ai.article_id = a.id AND ai.image_id = ?)",
            [SqlValue::Int(image_id)],
        );
        self.fetch_where(&clause).await
    }

    async fn add_fan(&self, article_id: i64, user_id: i64) -> Result<()> {
        let sql = format!(
            "{} INTO article_fans (article_id, user_id) VALUES (?, ?)",
            insert_ignore(&self.pool)
        );
        with_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(article_id)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to add article fan")?;
        });
        Ok(())
    }

    async fn remove_fan(&self, article_id: i64, user_id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM article_fans WHERE article_id = ? AND user_id = ?")
                .bind(article_id)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to remove article fan")?;
        });
        Ok(())
    }

    async fn is_fan(&self, article_id: i64, user_id: i64) -> Result<bool> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM article_fans WHERE article_id = ? AND user_id = ?",
            )
            .bind(article_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to check article fan")?
        });
        Ok(count > 0)
    }

    async fn add_visitor(&self, article_id: i64, user_id: i64) -> Result<()> {
        let sql = format!(
            "{} INTO article_visitors (article_id, user_id) VALUES (?, ?)",
            insert_ignore(&self.pool)
        );
        with_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(article_id)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to record article visitor")?;
        });
        Ok(())
    }

    async fn increment_popularity(&self, article_id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE articles SET popularity = popularity + 1 WHERE id = ?")
                .bind(article_id)
                .execute(pool)
                .await
                .context("Failed to increment popularity")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{SqlxTagRepository, TagRepository};
    use crate::models::PubPeriod;
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxArticleRepository) {
        let pool = setup_pool().await;
        let repo = SqlxArticleRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (pool, repo) = setup_test_repo().await;
        let author = insert_user(&pool, "writer").await;

        let article = repo.create("Budget vote", Some(author), true, Utc::now()).await.unwrap();
        assert_eq!(article.title, "Budget vote");
        assert_eq!(article.author_display(), "writer");
        assert_eq!(article.likes, 0);
        assert_eq!(article.views, 0);
        assert_eq!(article.popularity, 0);

        assert!(repo.get_by_id(article.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let article = repo.create("Draft", None, false, Utc::now()).await.unwrap();
        assert_eq!(article.author_display(), "unknown");

        repo.update(article.id, "Final", true).await.unwrap();
        let updated = repo.get_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(updated.title, "Final");
        assert!(updated.for_display);

        repo.delete(article.id).await.unwrap();
        assert!(repo.get_by_id(article.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fans_and_visitors() {
        let (pool, repo) = setup_test_repo().await;
        let reader = insert_user(&pool, "reader").await;
        let article = repo.create("Story", None, true, Utc::now()).await.unwrap();

        repo.add_fan(article.id, reader).await.unwrap();
        repo.add_fan(article.id, reader).await.unwrap();
        assert!(repo.is_fan(article.id, reader).await.unwrap());

        repo.add_visitor(article.id, reader).await.unwrap();
        repo.add_visitor(article.id, reader).await.unwrap();
        repo.increment_popularity(article.id).await.unwrap();
        repo.increment_popularity(article.id).await.unwrap();

        let stored = repo.get_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(stored.likes, 1);
        assert_eq!(stored.views, 1);
        assert_eq!(stored.popularity, 2);

        repo.remove_fan(article.id, reader).await.unwrap();
        assert!(!repo.is_fan(article.id, reader).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (pool, repo) = setup_test_repo().await;
        let tags = SqlxTagRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;

        let election = repo.create("Election night", Some(alice), true, Utc::now()).await.unwrap();
        let old = repo
            .create("Harvest report", Some(bob), true, Utc::now() - Duration::days(40))
            .await
            .unwrap();
        repo.create("Hidden draft", Some(alice), false, Utc::now()).await.unwrap();

        let politics = tags.create("Politics", false).await.unwrap();
        tags.add_to_article(politics.id, old.id).await.unwrap();

        let params = ListParams::default();

        let displayed = ArticleFilter {
            only_displayed: true,
            ..Default::default()
        };
        let (items, total) = repo.list(&displayed, &params).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].id, election.id);

        // Tag name or title match
        let search = ArticleFilter {
            search: vec!["Politics".into(), "Election".into()],
            ..displayed.clone()
        };
        let (_, total) = repo.list(&search, &params).await.unwrap();
        assert_eq!(total, 2);

        let category = ArticleFilter {
            category: Some("Politics".into()),
            ..Default::default()
        };
        let (items, _) = repo.list(&category, &params).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, old.id);

        let by_author = ArticleFilter {
            author: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_author, &params).await.unwrap().1, 2);

        let recent = ArticleFilter {
            pub_period: Some(PubPeriod::Month),
            ..Default::default()
        };
        assert_eq!(repo.list(&recent, &params).await.unwrap().1, 2);

        let nothing = ArticleFilter {
            search: vec!["Error".into()],
            ..Default::default()
        };
        assert_eq!(repo.list(&nothing, &params).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let (_pool, repo) = setup_test_repo().await;
        for i in 0..5 {
            repo.create(&format!("Article {}", i), None, true, Utc::now()).await.unwrap();
        }

        let (page, total) = repo
            .list(&ArticleFilter::default(), &ListParams::new(2, 2))
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn test_list_by_tag_and_author() {
        let (pool, repo) = setup_test_repo().await;
        let tags = SqlxTagRepository::new(pool.clone());
        let author = insert_user(&pool, "writer").await;

        let shown = repo.create("Shown", Some(author), true, Utc::now()).await.unwrap();
        let hidden = repo.create("Hidden", Some(author), false, Utc::now()).await.unwrap();
        let sport = tags.create("Sport", false).await.unwrap();
        tags.add_to_article(sport.id, shown.id).await.unwrap();
        tags.add_to_article(sport.id, hidden.id).await.unwrap();

        assert_eq!(repo.list_by_tag(sport.id, true).await.unwrap().len(), 1);
        assert_eq!(repo.list_by_tag(sport.id, false).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_author(author).await.unwrap().len(), 2);
    }
}
