//! Services layer - Business logic
//!
//! Services enforce permissions and business rules on top of the
//! repositories. Every article status change goes through
//! [`workflow::WorkflowEngine`].

pub mod article;
pub mod category;
pub mod directory;
pub mod email;
pub mod messages;
pub mod notification;
pub mod password;
pub mod policy;
pub mod rules;
pub mod slug;
pub mod user;
pub mod workflow;

pub use article::{ArticleService, ArticleServiceError, DashboardStats, RoleCounts};
pub use category::{CategoryService, CategoryServiceError};
pub use directory::Directory;
pub use email::{mailer_from_config, EmailTemplates, Mailer, SiteInfo};
pub use notification::{NotificationDispatcher, NotificationError};
pub use password::{hash_password, verify_password};
pub use policy::Actor;
pub use rules::{RulesService, RulesServiceError};
pub use slug::generate_slug;
pub use user::{LoginInput, UserService, UserServiceError};
pub use workflow::{WorkflowEngine, WorkflowError};
