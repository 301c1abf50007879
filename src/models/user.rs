//! User, group and profile models
//!
//! Roles are expressed as membership in named groups. A profile caches the
//! two role flags so permission checks don't need to load groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// "First Last", falling back to the username when both are blank
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// Gravatar URL derived from the email address
    pub fn avatar_url(&self) -> String {
        let digest = md5::compute(self.email.trim().to_lowercase().as_bytes());
        format!("https://www.gravatar.com/avatar/{:x}?d=identicon", digest)
    }
}

/// Named group a user can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    Reader,
    Editor,
    EditorInChief,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Reader, Group::Editor, Group::EditorInChief];

    /// Stored group name
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Reader => "Reader",
            Group::Editor => "Editor",
            Group::EditorInChief => "Editor in Chief",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown group: {}", s))
    }
}

/// Per-user profile with role flags.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub is_editor: bool,
    pub is_editor_in_chief: bool,
    /// Group names, loaded separately from the profile row
    #[sqlx(skip)]
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Profile {
    /// Identifier used for profile anchors and page titles
    pub fn get_profile_name(&self) -> String {
        format!("profile_{}", self.username)
    }

    /// Whether the user is a member of the named group
    pub fn belong_to(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Role flags implied by a set of group names: `(is_editor, is_editor_in_chief)`
    pub fn flags_for_groups<S: AsRef<str>>(groups: &[S]) -> (bool, bool) {
        let has = |g: Group| groups.iter().any(|name| name.as_ref() == g.as_str());
        let chief = has(Group::EditorInChief);
        (has(Group::Editor) || chief, chief)
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

/// Editable account fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(username: &str, groups: &[&str]) -> Profile {
        let (is_editor, is_editor_in_chief) = Profile::flags_for_groups(groups);
        Profile {
            id: 1,
            user_id: 1,
            username: username.to_string(),
            is_editor,
            is_editor_in_chief,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_get_profile_name() {
        assert_eq!(profile("testuser1", &["Reader"]).get_profile_name(), "profile_testuser1");
    }

    #[test]
    fn test_belong_to() {
        let reader = profile("r", &["Reader"]);
        assert!(reader.belong_to("Reader"));
        assert!(!reader.belong_to("Editor"));

        let chief = profile("c", &["Reader", "Editor", "Editor in Chief"]);
        assert!(chief.belong_to("Editor in Chief"));
    }

    #[test]
    fn test_flags_follow_groups() {
        let reader = profile("r", &["Reader"]);
        assert!(!reader.is_editor);
        assert!(!reader.is_editor_in_chief);

        let editor = profile("e", &["Reader", "Editor"]);
        assert!(editor.is_editor);
        assert!(!editor.is_editor_in_chief);

        let chief = profile("c", &["Reader", "Editor", "Editor in Chief"]);
        assert!(chief.is_editor);
        assert!(chief.is_editor_in_chief);
    }

    #[test]
    fn test_group_from_str() {
        assert_eq!("editor in chief".parse::<Group>().unwrap(), Group::EditorInChief);
        assert_eq!(Group::Editor.to_string(), "Editor");
        assert!("admin".parse::<Group>().is_err());
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        let mut user = User {
            id: 1,
            username: "jdoe".to_string(),
            email: "J@Example.com ".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(user.full_name(), "jdoe");
        user.first_name = "Jane".to_string();
        assert_eq!(user.full_name(), "Jane");
        assert!(user.avatar_url().contains(&format!("{:x}", md5::compute(b"j@example.com"))));
    }
}
