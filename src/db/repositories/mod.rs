//! Database repositories
//!
//! One repository per entity. Each exposes a trait used by the services and
//! an sqlx implementation that runs on SQLite or MySQL.

pub mod article;
pub mod comment;
pub mod image;
pub mod paragraph;
pub mod session;
pub mod tag;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use image::{ImageRepository, SqlxImageRepository};
pub use paragraph::{ParagraphRepository, SqlxParagraphRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

use chrono::{DateTime, Utc};

/// A value bound into a dynamically assembled query
#[derive(Debug, Clone)]
pub(crate) enum SqlValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
}

/// `AND`-joined conditions with their bound values, in placeholder order
#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    conditions: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl WhereClause {
    pub fn push(&mut self, condition: impl Into<String>, values: impl IntoIterator<Item = SqlValue>) {
        self.conditions.push(condition.into());
        self.values.extend(values);
    }

    /// ` WHERE ...`, or an empty string when there are no conditions
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// `?, ?, ?` for an `IN (...)` list of `n` values
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Bind every [`SqlValue`] in order onto an sqlx query.
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for value in $values.iter() {
            query = match value {
                $crate::db::repositories::SqlValue::Text(v) => query.bind(v.as_str()),
                $crate::db::repositories::SqlValue::Int(v) => query.bind(*v),
                $crate::db::repositories::SqlValue::Bool(v) => query.bind(*v),
                $crate::db::repositories::SqlValue::Time(v) => query.bind(*v),
            };
        }
        query
    }};
}

pub(crate) use bind_values;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_sql() {
        let mut clause = WhereClause::default();
        assert_eq!(clause.sql(), "");

        clause.push("a.for_display = ?", [SqlValue::Bool(true)]);
        clause.push(format!("t.name IN ({})", placeholders(2)), [
            SqlValue::Text("A".into()),
            SqlValue::Text("B".into()),
        ]);
        assert_eq!(clause.sql(), " WHERE a.for_display = ? AND t.name IN (?, ?)");
        assert_eq!(clause.values.len(), 3);
    }
}
