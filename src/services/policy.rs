//! Capability checks
//!
//! Pure predicates over an explicit [`Actor`]. Nothing here touches storage;
//! callers load whatever facts a predicate needs (the article, whether rules
//! are active, whether a reviewer covers a category) and pass them in.

use crate::models::{Article, ArticleStatus, User, UserRole};

/// The user performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: UserRole,
    pub has_accepted_rules: bool,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            has_accepted_rules: user.has_accepted_rules,
        }
    }
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_reviewer(&self) -> bool {
        self.role == UserRole::Reviewer
    }

    pub fn is_author(&self) -> bool {
        self.role == UserRole::Author
    }
}

pub fn owns(actor: &Actor, article: &Article) -> bool {
    article.author_id == actor.id
}

pub fn can_create_article(actor: &Actor) -> bool {
    actor.is_author()
}

/// Content edits: owner only, and only while the article is editable
pub fn can_edit(actor: &Actor, article: &Article) -> bool {
    owns(actor, article) && article.status.is_editable()
}

/// Who may delete, regardless of status
pub fn may_delete(actor: &Actor, article: &Article) -> bool {
    owns(actor, article) || actor.is_admin()
}

/// Published articles are permanent
pub fn is_deletable(status: ArticleStatus) -> bool {
    status != ArticleStatus::Approved
}

pub fn can_submit(actor: &Actor, article: &Article) -> bool {
    owns(actor, article)
}

/// Rules acceptance gate for submission
pub fn satisfies_rules(actor: &Actor, rules_active: bool) -> bool {
    !rules_active || actor.has_accepted_rules
}

pub fn can_assign_reviewer(actor: &Actor) -> bool {
    actor.is_admin()
}

/// The reviewer currently assigned to the article
pub fn is_assigned_reviewer(actor: &Actor, article: &Article) -> bool {
    actor.is_reviewer() && article.reviewer_id == Some(actor.id)
}

pub fn can_accept_rules(actor: &Actor) -> bool {
    actor.is_author()
}

/// Read access to a single article.
///
/// `covers_category` tells whether the viewer reviews the article's category.
pub fn can_view(viewer: Option<&Actor>, article: &Article, covers_category: bool) -> bool {
    if article.status == ArticleStatus::Approved {
        return true;
    }
    let Some(viewer) = viewer else {
        return false;
    };
    owns(viewer, article)
        || viewer.is_admin()
        || is_assigned_reviewer(viewer, article)
        || (viewer.is_reviewer() && covers_category && article.status == ArticleStatus::PendingReview)
}

/// Status history is visible to the same audience as unpublished content
pub fn can_view_history(actor: &Actor, article: &Article, covers_category: bool) -> bool {
    owns(actor, article)
        || actor.is_admin()
        || is_assigned_reviewer(actor, article)
        || (actor.is_reviewer() && covers_category && article.status == ArticleStatus::PendingReview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalizedText;
    use chrono::Utc;
    use proptest::prelude::*;

    fn actor(id: i64, role: UserRole) -> Actor {
        Actor {
            id,
            role,
            has_accepted_rules: false,
        }
    }

    fn article(author_id: i64, status: ArticleStatus, reviewer_id: Option<i64>) -> Article {
        let now = Utc::now();
        Article {
            id: 1,
            slug: "maqola".to_string(),
            title: LocalizedText::new("Sarlavha"),
            content: LocalizedText::new("Matn"),
            author_id,
            category_id: 1,
            cover_image: None,
            attachment: None,
            keywords: Vec::new(),
            status,
            reviewer_id,
            revision_note: None,
            view_count: 0,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            published_at: None,
        }
    }

    fn any_role() -> impl Strategy<Value = UserRole> {
        prop::sample::select(UserRole::ALL.to_vec())
    }

    fn any_status() -> impl Strategy<Value = ArticleStatus> {
        prop::sample::select(ArticleStatus::ALL.to_vec())
    }

    #[test]
    fn test_rules_gate() {
        let mut author = actor(1, UserRole::Author);
        assert!(satisfies_rules(&author, false));
        assert!(!satisfies_rules(&author, true));
        author.has_accepted_rules = true;
        assert!(satisfies_rules(&author, true));
    }

    #[test]
    fn test_assigned_reviewer_needs_reviewer_role() {
        let a = article(1, ArticleStatus::PendingReview, Some(7));
        assert!(is_assigned_reviewer(&actor(7, UserRole::Reviewer), &a));
        assert!(!is_assigned_reviewer(&actor(7, UserRole::Author), &a));
        assert!(!is_assigned_reviewer(&actor(8, UserRole::Reviewer), &a));
    }

    #[test]
    fn test_unpublished_visibility() {
        let draft = article(1, ArticleStatus::Draft, None);
        assert!(!can_view(None, &draft, false));
        assert!(can_view(Some(&actor(1, UserRole::Author)), &draft, false));
        assert!(can_view(Some(&actor(9, UserRole::Admin)), &draft, false));
        assert!(!can_view(Some(&actor(2, UserRole::Author)), &draft, false));
        // Category reviewers see pending work, not drafts
        assert!(!can_view(Some(&actor(3, UserRole::Reviewer)), &draft, true));

        let pending = article(1, ArticleStatus::PendingReview, None);
        assert!(can_view(Some(&actor(3, UserRole::Reviewer)), &pending, true));
        assert!(!can_view(Some(&actor(3, UserRole::Reviewer)), &pending, false));
    }

    #[test]
    fn test_category_reviewers_see_history_of_pending_work_only() {
        let reviewer = actor(3, UserRole::Reviewer);
        let pending = article(1, ArticleStatus::PendingReview, None);
        assert!(can_view_history(&reviewer, &pending, true));
        assert!(!can_view_history(&reviewer, &pending, false));

        for status in [ArticleStatus::Draft, ArticleStatus::ChangesRequested, ArticleStatus::Approved] {
            let a = article(1, status, None);
            assert!(!can_view_history(&reviewer, &a, true), "{status}");
            assert!(can_view_history(&actor(1, UserRole::Author), &a, false));
        }

        let returned = article(1, ArticleStatus::ChangesRequested, Some(3));
        assert!(can_view_history(&reviewer, &returned, false));
    }

    proptest! {
        #[test]
        fn prop_published_is_public(author in 1i64..100, viewer in 1i64..100, role in any_role()) {
            let a = article(author, ArticleStatus::Approved, None);
            prop_assert!(can_view(None, &a, false));
            prop_assert!(can_view(Some(&actor(viewer, role)), &a, false));
        }

        #[test]
        fn prop_edit_requires_owner_and_editable(
            author in 1i64..50,
            editor in 1i64..50,
            role in any_role(),
            status in any_status(),
        ) {
            let a = article(author, status, None);
            let allowed = can_edit(&actor(editor, role), &a);
            prop_assert_eq!(allowed, author == editor && status.is_editable());
        }

        #[test]
        fn prop_only_admins_assign(id in 1i64..100, role in any_role()) {
            prop_assert_eq!(can_assign_reviewer(&actor(id, role)), role == UserRole::Admin);
        }
    }
}
