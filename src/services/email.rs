//! Outgoing email
//!
//! The [`Mailer`] trait is the transport seam: [`SmtpMailer`] delivers
//! through an SMTP relay, [`LogMailer`] only logs and is used whenever email
//! is disabled. [`EmailTemplates`] renders notification emails with tera.

use crate::config::EmailConfig;
use crate::models::Locale;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};

/// Port on which SMTP servers expect TLS from the first byte
const IMPLICIT_TLS_PORT: u16 = 465;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Pick the transport for the configuration
pub fn mailer_from_config(config: &EmailConfig) -> Result<Arc<dyn Mailer>> {
    if !config.enabled {
        tracing::info!("Email delivery disabled; notification emails will be logged");
        return Ok(Arc::new(LogMailer));
    }
    Ok(Arc::new(SmtpMailer::from_config(config)?))
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        if config.smtp_host.trim().is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?;

        let transport = builder
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .port(config.smtp_port)
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// Writes emails to the log instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::info!(to, subject, "Email (not sent, delivery disabled)");
        Ok(())
    }
}

const SUBJECT_TEMPLATE: &str = "email/subject.txt";
const BODY_TEMPLATE: &str = "email/body.txt";

const SUBJECT_SOURCE: &str = "[{{ site_name }}] {{ title }}";

const BODY_SOURCE: &str = r#"{{ greeting }}, {{ username }}!

{{ message }}
{% if url %}
{{ url }}
{% endif %}
--
{{ site_name }}
"#;

/// Site facts every email mentions
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub name: String,
    /// Absolute base URL, without trailing slash
    pub url: String,
}

/// What a notification email says
#[derive(Debug, Clone)]
pub struct EmailContent<'a> {
    pub username: &'a str,
    pub locale: Locale,
    pub title: &'a str,
    pub message: &'a str,
    pub link: Option<&'a str>,
}

/// Rendered subject and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

pub struct EmailTemplates {
    tera: Tera,
    site: SiteInfo,
}

impl EmailTemplates {
    pub fn new(site: SiteInfo) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (SUBJECT_TEMPLATE, SUBJECT_SOURCE),
            (BODY_TEMPLATE, BODY_SOURCE),
        ])
        .context("Failed to compile email templates")?;
        Ok(Self { tera, site })
    }

    pub fn render(&self, content: &EmailContent<'_>) -> Result<RenderedEmail> {
        let url = content
            .link
            .map(|link| format!("{}{}", self.site.url.trim_end_matches('/'), link));

        let mut context = TeraContext::new();
        context.insert("site_name", &self.site.name);
        context.insert("greeting", greeting(content.locale));
        context.insert("username", content.username);
        context.insert("title", content.title);
        context.insert("message", content.message);
        context.insert("url", &url);

        let subject = self
            .tera
            .render(SUBJECT_TEMPLATE, &context)
            .context("Failed to render email subject")?;
        let body = self
            .tera
            .render(BODY_TEMPLATE, &context)
            .context("Failed to render email body")?;

        Ok(RenderedEmail {
            subject: subject.trim().to_string(),
            body,
        })
    }
}

fn greeting(locale: Locale) -> &'static str {
    match locale {
        Locale::Uz => "Assalomu alaykum",
        Locale::Ru => "Здравствуйте",
        Locale::En => "Hello",
    }
}
