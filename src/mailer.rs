use crate::form::SUGGESTIONS_FIELD;
use crate::schema::PollSchema;
use crate::submission::Submission;
use handlebars::Handlebars;
use lazy_static::lazy_static;
use serde::Serialize;
use thiserror::Error;

#[cfg(feature = "web")]
use crate::config::SmtpConfig;
#[cfg(feature = "web")]
use async_trait::async_trait;
#[cfg(feature = "web")]
use lettre::transport::smtp::authentication::Credentials;
#[cfg(feature = "web")]
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

const DIGEST_TEMPLATE: &str = "New response received for {{title}}

Timestamp: {{timestamp}}
Email: {{email}}
{{#each groups}}
{{heading}}:
{{#each fields}}- {{label}}: {{value}}
{{/each}}{{/each}}{{#if suggestions}}
{{suggestions.heading}}:
{{suggestions.value}}
{{/if}}
View all responses in your spreadsheet.
";

/// Shown for a field that was left blank
const MISSING_VALUE: &str = "N/A";

/// Shown when no suggestions were written
const NO_SUGGESTIONS: &str = "None";

lazy_static! {
    static ref DIGEST: Handlebars<'static> = {
        let mut hb = Handlebars::new();
        hb.register_escape_fn(handlebars::no_escape);
        hb.register_template_string("digest", DIGEST_TEMPLATE)
            .unwrap();
        hb
    };
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Failed to render digest: {0}")]
    Template(#[from] handlebars::RenderError),

    #[cfg(feature = "web")]
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[cfg(feature = "web")]
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[cfg(feature = "web")]
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// A plain-text email ready to send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Serialize)]
struct DigestField<'a> {
    label: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct DigestGroup<'a> {
    heading: String,
    fields: Vec<DigestField<'a>>,
}

#[derive(Serialize)]
struct DigestSuggestions<'a> {
    heading: String,
    value: &'a str,
}

#[derive(Serialize)]
struct Digest<'a> {
    title: &'a str,
    timestamp: &'a str,
    email: &'a str,
    groups: Vec<DigestGroup<'a>>,
    suggestions: Option<DigestSuggestions<'a>>,
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}

/// Formats the admin digest for one submission
///
/// Every schema column is listed under its group heading. The email and the
/// free-text suggestions get their own lines.
///
/// # Arguments
/// * `schema` - The poll the submission belongs to
/// * `submission` - The submitted fields
/// * `timestamp` - Timestamp written to the sheet
/// * `recipient` - Address the digest goes to
///
/// # Returns
/// * `Result<Notification, MailError>` - The rendered email or a template error
pub fn digest(
    schema: &PollSchema,
    submission: &Submission,
    timestamp: &str,
    recipient: &str,
) -> Result<Notification, MailError> {
    let groups = schema
        .groups()
        .into_iter()
        .filter_map(|group| {
            let fields: Vec<DigestField> = schema
                .columns_in(group)
                .filter(|c| c.field != "email" && c.field != SUGGESTIONS_FIELD)
                .map(|c| DigestField {
                    label: &c.header,
                    value: or_default(submission.value_or_empty(&c.field), MISSING_VALUE),
                })
                .collect();

            if fields.is_empty() {
                None
            } else {
                Some(DigestGroup {
                    heading: group.to_uppercase(),
                    fields,
                })
            }
        })
        .collect();

    let suggestions = schema
        .columns
        .iter()
        .find(|c| c.field == SUGGESTIONS_FIELD)
        .map(|c| DigestSuggestions {
            heading: c.header.to_uppercase(),
            value: or_default(submission.value_or_empty(&c.field), NO_SUGGESTIONS),
        });

    let body = DIGEST.render(
        "digest",
        &Digest {
            title: &schema.title,
            timestamp,
            email: or_default(submission.value_or_empty("email"), MISSING_VALUE),
            groups,
            suggestions,
        },
    )?;

    Ok(Notification {
        to: recipient.to_string(),
        subject: format!("New {} Response", schema.title),
        body,
    })
}

/// Delivers notifications
#[cfg(feature = "web")]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), MailError>;
}

/// Sends notifications through an SMTP relay
#[cfg(feature = "web")]
pub struct Mailer {
    smtp: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

#[cfg(feature = "web")]
impl Mailer {
    /// Builds the transport
    ///
    /// Port 465 uses implicit TLS, any other port uses STARTTLS.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };

        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Mailer {
            smtp: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[cfg(feature = "web")]
#[async_trait]
impl Notifier for Mailer {
    async fn send(&self, notification: Notification) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(notification.to.parse()?)
            .subject(notification.subject)
            .body(notification.body)?;

        self.smtp.send(email).await?;
        Ok(())
    }
}
