//! Data models
//!
//! Database entities, API input types and pagination helpers.

mod article;
mod category;
mod keyword;
mod locale;
mod notification;
mod rules;
mod session;
mod user;

pub use article::{
    Article, ArticleQuery, ArticleStatus, CreateArticleInput, ListParams, PagedResult,
    StatusChange, StatusCounts, UpdateArticleInput,
};
pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use keyword::{
    join_keywords, parse_keywords, Keyword, MAX_KEYWORDS_PER_ARTICLE, MAX_KEYWORD_LENGTH,
};
pub use locale::{Locale, LocalizedText};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use rules::{ArticleRules, CreateRulesInput};
pub use session::Session;
pub use user::{CreateUserInput, User, UserRole};
