//! Notification texts
//!
//! Titles and messages for every notification kind in Uzbek, Russian and
//! English. Text is composed in the recipient's preferred locale at the
//! moment the notification is recorded.

use crate::models::{Locale, NotificationKind};

/// Facts a notification text may mention
#[derive(Debug, Clone, Default)]
pub struct MessageContext<'a> {
    pub article_title: &'a str,
    pub category_name: &'a str,
    /// Reviewer's note for change requests
    pub note: Option<&'a str>,
}

/// Localized `(title, message)` for a notification
pub fn compose(kind: NotificationKind, locale: Locale, ctx: &MessageContext<'_>) -> (String, String) {
    let article = ctx.article_title;
    let note = ctx.note.unwrap_or_default();
    use Locale::*;
    use NotificationKind::*;

    match (kind, locale) {
        (ArticleSubmitted, Uz) => (
            "Yangi maqola ko'rib chiqishga yuborildi".to_string(),
            format!("\"{article}\" maqolasi ko'rib chiqishni kutmoqda."),
        ),
        (ArticleSubmitted, Ru) => (
            "Новая статья на рассмотрении".to_string(),
            format!("Статья «{article}» ожидает рассмотрения."),
        ),
        (ArticleSubmitted, En) => (
            "New article submitted for review".to_string(),
            format!("\"{article}\" is waiting for review."),
        ),

        (ArticleResubmitted, Uz) => (
            "Maqola qayta yuborildi".to_string(),
            format!("\"{article}\" maqolasi tuzatishlardan so'ng qayta yuborildi."),
        ),
        (ArticleResubmitted, Ru) => (
            "Статья отправлена повторно".to_string(),
            format!("Статья «{article}» исправлена и снова отправлена на рассмотрение."),
        ),
        (ArticleResubmitted, En) => (
            "Article resubmitted".to_string(),
            format!("\"{article}\" was revised and resubmitted for review."),
        ),

        (ReviewerAssigned, Uz) => (
            "Sizga maqola biriktirildi".to_string(),
            format!("\"{article}\" maqolasini ko'rib chiqish sizga topshirildi."),
        ),
        (ReviewerAssigned, Ru) => (
            "Вам назначена статья".to_string(),
            format!("Вам поручено рассмотреть статью «{article}»."),
        ),
        (ReviewerAssigned, En) => (
            "Article assigned to you".to_string(),
            format!("You have been asked to review \"{article}\"."),
        ),

        (ReviewerUnassigned, Uz) => (
            "Maqola boshqa taqrizchiga berildi".to_string(),
            format!("\"{article}\" maqolasi endi boshqa taqrizchiga biriktirilgan."),
        ),
        (ReviewerUnassigned, Ru) => (
            "Статья передана другому рецензенту".to_string(),
            format!("Статья «{article}» теперь назначена другому рецензенту."),
        ),
        (ReviewerUnassigned, En) => (
            "Article reassigned".to_string(),
            format!("\"{article}\" has been reassigned to another reviewer."),
        ),

        (ChangesRequested, Uz) => (
            "Maqolaga tuzatish kiritish so'raldi".to_string(),
            format!("\"{article}\" maqolasi bo'yicha izoh: {note}"),
        ),
        (ChangesRequested, Ru) => (
            "Требуются правки".to_string(),
            format!("Замечания к статье «{article}»: {note}"),
        ),
        (ChangesRequested, En) => (
            "Changes requested".to_string(),
            format!("Feedback on \"{article}\": {note}"),
        ),

        (ArticlePublished, Uz) => (
            "Maqola nashr qilindi".to_string(),
            format!("\"{article}\" maqolangiz tasdiqlandi va nashr qilindi."),
        ),
        (ArticlePublished, Ru) => (
            "Статья опубликована".to_string(),
            format!("Ваша статья «{article}» одобрена и опубликована."),
        ),
        (ArticlePublished, En) => (
            "Article published".to_string(),
            format!("Your article \"{article}\" was approved and published."),
        ),

        (CategoryAssigned, Uz) => (
            "Yangi rukn biriktirildi".to_string(),
            format!("Endi siz \"{}\" rukni maqolalarini ko'rib chiqasiz.", ctx.category_name),
        ),
        (CategoryAssigned, Ru) => (
            "Назначена новая рубрика".to_string(),
            format!("Теперь вы рецензируете статьи рубрики «{}».", ctx.category_name),
        ),
        (CategoryAssigned, En) => (
            "New category assigned".to_string(),
            format!("You now review articles in \"{}\".", ctx.category_name),
        ),
    }
}

/// Where a notification about an article points
pub fn article_link(kind: NotificationKind, article_id: i64, slug: &str) -> String {
    match kind {
        NotificationKind::ArticlePublished => format!("/articles/{}", slug),
        NotificationKind::ChangesRequested => format!("/my/articles/{}", article_id),
        _ => format!("/review/articles/{}", article_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [NotificationKind; 7] = [
        NotificationKind::ArticleSubmitted,
        NotificationKind::ArticleResubmitted,
        NotificationKind::ReviewerAssigned,
        NotificationKind::ReviewerUnassigned,
        NotificationKind::ChangesRequested,
        NotificationKind::ArticlePublished,
        NotificationKind::CategoryAssigned,
    ];

    #[test]
    fn test_every_kind_has_text_in_every_locale() {
        let ctx = MessageContext {
            article_title: "Rust",
            category_name: "Texnologiya",
            note: Some("manbalar qo'shing"),
        };
        for kind in KINDS {
            let mut titles = Vec::new();
            for locale in Locale::ALL {
                let (title, message) = compose(kind, locale, &ctx);
                assert!(!title.is_empty());
                assert!(!message.is_empty());
                titles.push(title);
            }
            titles.dedup();
            assert_eq!(titles.len(), 3, "{kind} should differ per locale");
        }
    }

    #[test]
    fn test_change_request_carries_note() {
        let ctx = MessageContext {
            article_title: "Rust",
            note: Some("add citations"),
            ..Default::default()
        };
        let (_, message) = compose(NotificationKind::ChangesRequested, Locale::En, &ctx);
        assert_eq!(message, "Feedback on \"Rust\": add citations");
    }

    #[test]
    fn test_links() {
        assert_eq!(article_link(NotificationKind::ArticlePublished, 3, "rust"), "/articles/rust");
        assert_eq!(article_link(NotificationKind::ChangesRequested, 3, "rust"), "/my/articles/3");
        assert_eq!(article_link(NotificationKind::ReviewerAssigned, 3, "rust"), "/review/articles/3");
    }
}
