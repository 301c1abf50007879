//! Fixtures shared by repository and service tests

use crate::db::{create_test_pool, migrations, DynDatabasePool};
use chrono::Utc;

/// In-memory SQLite pool with all migrations applied
pub async fn setup_pool() -> DynDatabasePool {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub async fn insert_user(pool: &DynDatabasePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind("hash")
        .execute(pool.as_sqlite().unwrap())
        .await
        .expect("Failed to insert user")
        .last_insert_rowid()
}

pub async fn insert_article(
    pool: &DynDatabasePool,
    author_id: Option<i64>,
    title: &str,
    for_display: bool,
) -> i64 {
    sqlx::query("INSERT INTO articles (title, author_id, for_display, pub_date) VALUES (?, ?, ?, ?)")
        .bind(title)
        .bind(author_id)
        .bind(for_display)
        .bind(Utc::now())
        .execute(pool.as_sqlite().unwrap())
        .await
        .expect("Failed to insert article")
        .last_insert_rowid()
}

pub async fn insert_image(pool: &DynDatabasePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO images (name, photo, pub_date) VALUES (?, ?, ?)")
        .bind(name)
        .bind(format!("article_images/{}.jpg", name))
        .bind(Utc::now())
        .execute(pool.as_sqlite().unwrap())
        .await
        .expect("Failed to insert image")
        .last_insert_rowid()
}
