//! Comment model and reader reactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reader comment on an article, with reaction counts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub likes: i64,
    pub dislikes: i64,
}

/// Input for creating a comment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCommentInput {
    pub article_id: i64,
    #[serde(default)]
    pub text: String,
}

/// A like/dislike command sent by a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Dislike => "dislike",
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reaction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Reaction::Like),
            "dislike" => Ok(Reaction::Dislike),
            _ => Err(format!("Invalid command: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_from_str() {
        assert_eq!("like".parse::<Reaction>().unwrap(), Reaction::Like);
        assert_eq!("dislike".parse::<Reaction>().unwrap(), Reaction::Dislike);
        assert!("Like".parse::<Reaction>().is_err());
        assert!("delete".parse::<Reaction>().is_err());
    }
}
