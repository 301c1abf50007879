//! Services layer
//!
//! Business rules sit here, between the HTTP handlers and the repositories.
//! Each service owns a `thiserror` error enum that the API and web layers
//! map to responses.

pub mod article;
pub mod comment;
pub mod generator;
pub mod image;
pub mod paragraph;
pub mod password;
pub mod rate_limiter;
pub mod search;
pub mod tag;
pub mod user;

pub use article::{ArticleCard, ArticleDetail, ArticleService, ArticleServiceError};
pub use comment::{can_modify, CommentService, CommentServiceError};
pub use generator::{parse_completion, ArticleGenerator, GeneratedArticle, GeneratorError};
pub use image::{pick_lead_photo, ImageService, ImageServiceError};
pub use paragraph::{ParagraphService, ParagraphServiceError};
pub use password::{hash_password, validate_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use search::clean_search_phrase;
pub use tag::{TagService, TagServiceError};
pub use user::{LoginInput, UserService, UserServiceError};
