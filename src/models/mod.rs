//! Data models
//!
//! Database entities (User, Profile, Session, Article, Paragraph, Image, Tag,
//! Comment), the inputs used to create and update them, and listing types.

mod article;
mod comment;
mod image;
mod paragraph;
mod session;
mod tag;
mod user;

pub use article::{
    Article, ArticleFilter, CreateArticleInput, ListParams, PagedResult, PubPeriod,
    UpdateArticleInput, DEFAULT_ARTICLE_TITLE,
};
pub use comment::{Comment, CreateCommentInput, Reaction};
pub use image::{default_image_name, ArticleImage, Image, ImageFilter, IMAGE_UPLOAD_DIR};
pub use paragraph::{
    CreateParagraphInput, Paragraph, UpdateParagraphInput, DEFAULT_PARAGRAPH_TITLE,
};
pub use session::{Session, SESSION_DAYS};
pub use tag::{capitalize, normalize_tag_name, Tag, TagWithCount};
pub use user::{CreateUserInput, Group, Profile, UpdateUserInput, User};
