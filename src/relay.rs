use crate::config::InstitutionConfig;
use crate::mailer::{Notifier, digest};
use crate::schema::{EmailPolicy, PollSchema};
use crate::sheet::{RowStore, StoreError};
use crate::submission::Submission;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Why a submission was not recorded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The submission was refused; nothing was written
    #[error("{0}")]
    Validation(String),

    /// Anything else that went wrong while recording
    #[error("{0}")]
    Unexpected(String),
}

impl From<StoreError> for RelayError {
    fn from(e: StoreError) -> Self {
        RelayError::Unexpected(e.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// Response body returned for every submission attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub result: Outcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 1-based index of the appended row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl ResultEnvelope {
    pub fn success(row: usize) -> Self {
        ResultEnvelope {
            result: Outcome::Success,
            error: None,
            row: Some(row),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ResultEnvelope {
            result: Outcome::Error,
            error: Some(message.into()),
            row: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == Outcome::Success
    }
}

impl From<Result<usize, RelayError>> for ResultEnvelope {
    fn from(result: Result<usize, RelayError>) -> Self {
        match result {
            Ok(row) => ResultEnvelope::success(row),
            Err(e) => ResultEnvelope::error(e.to_string()),
        }
    }
}

/// ISO-8601 UTC timestamp with millisecond precision
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Records submissions for one poll
///
/// Stateless apart from its collaborators: every call validates, appends one
/// row and optionally hands a digest to the notifier. Resubmitting the same
/// data appends another row.
pub struct Relay {
    schema: PollSchema,
    store: Arc<dyn RowStore>,
    institution: InstitutionConfig,
    notifications: Option<(String, Arc<dyn Notifier>)>,
}

impl Relay {
    pub fn new(schema: PollSchema, store: Arc<dyn RowStore>, institution: InstitutionConfig) -> Self {
        Relay {
            schema,
            store,
            institution,
            notifications: None,
        }
    }

    /// Sends a digest of every accepted submission to `recipient`
    pub fn with_notifications(mut self, recipient: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        self.notifications = Some((recipient.into(), notifier));
        self
    }

    pub fn schema(&self) -> &PollSchema {
        &self.schema
    }

    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    /// Checks the deadline and the submitter's email
    pub fn validate(&self, submission: &Submission, now: DateTime<Utc>) -> Result<(), RelayError> {
        if !self.schema.is_open_at(now.into()) {
            let closed = self
                .schema
                .closes_at
                .map(|d| d.format("%B %-d, %Y at %-I:%M %p").to_string())
                .unwrap_or_default();
            return Err(RelayError::Validation(format!(
                "This poll closed on {}.",
                closed
            )));
        }

        let name = &self.institution.name;
        let suffix = &self.institution.email_suffix;
        let email = submission.value_or_empty("email");

        match self.schema.email_policy {
            EmailPolicy::Required if !email.ends_with(suffix.as_str()) => {
                Err(RelayError::Validation(format!(
                    "Please use your {} email address ({})",
                    name, suffix
                )))
            }
            EmailPolicy::Optional if !email.is_empty() && !email.ends_with(suffix.as_str()) => {
                Err(RelayError::Validation(format!(
                    "If providing an email, please use your {} email address ({})",
                    name, suffix
                )))
            }
            _ => Ok(()),
        }
    }

    /// Validates and appends, returning the new row index
    pub fn accept(&self, submission: &Submission, now: DateTime<Utc>) -> Result<usize, RelayError> {
        self.validate(submission, now)?;

        let record = self.schema.record(submission, &timestamp(now));
        let row = self.store.append(record)?;
        Ok(row)
    }

    /// Handles one submission received now
    pub fn submit(&self, submission: &Submission) -> ResultEnvelope {
        self.submit_at(submission, Utc::now())
    }

    /// Handles one submission received at `now`
    ///
    /// Never fails: every error becomes an error envelope. The digest is sent
    /// in the background after the row is written, and its failure is only
    /// logged.
    pub fn submit_at(&self, submission: &Submission, now: DateTime<Utc>) -> ResultEnvelope {
        let result = self.accept(submission, now);

        match &result {
            Ok(row) => {
                log::info!("{}: recorded row {}", self.schema.slug, row);
                self.notify(submission, now);
            }
            Err(RelayError::Validation(message)) => {
                log::debug!("{}: rejected submission: {}", self.schema.slug, message);
            }
            Err(RelayError::Unexpected(message)) => {
                log::error!("{}: failed to record submission: {}", self.schema.slug, message);
            }
        }

        ResultEnvelope::from(result)
    }

    fn notify(&self, submission: &Submission, now: DateTime<Utc>) {
        let Some((recipient, notifier)) = &self.notifications else {
            return;
        };

        let notification = match digest(&self.schema, submission, &timestamp(now), recipient) {
            Ok(notification) => notification,
            Err(e) => {
                log::warn!("{}: could not build notification: {}", self.schema.slug, e);
                return;
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("{}: no async runtime, notification dropped", self.schema.slug);
            return;
        };

        let notifier = Arc::clone(notifier);
        let slug = self.schema.slug.clone();
        runtime.spawn(async move {
            if let Err(e) = notifier.send(notification).await {
                log::warn!("{}: admin notification failed: {}", slug, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin;
    use crate::sheet::MemoryStore;

    fn relay(slug: &str) -> Relay {
        let schema = builtin(slug).unwrap().clone();
        let store = Arc::new(MemoryStore::new(schema.headers()));
        Relay::new(schema, store, InstitutionConfig::default())
    }

    fn with_email(email: &str) -> Submission {
        Submission::from_pairs(vec![("email".to_string(), email.to_string())])
    }

    #[test]
    fn envelope_json_omits_absent_fields() {
        let ok = serde_json::to_string(&ResultEnvelope::success(2)).unwrap();
        assert_eq!(ok, r#"{"result":"success","row":2}"#);

        let err = serde_json::to_string(&ResultEnvelope::error("nope")).unwrap();
        assert_eq!(err, r#"{"result":"error","error":"nope"}"#);
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let now = DateTime::parse_from_rfc3339("2025-10-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(now), "2025-10-01T12:00:00.000Z");
    }

    #[test]
    fn foreign_email_is_rejected_without_append() {
        let relay = relay("events");
        let envelope = relay.submit(&with_email("a@gmail.com"));

        assert_eq!(
            envelope,
            ResultEnvelope::error("Please use your UCR email address (@ucr.edu)")
        );
        assert_eq!(relay.store().last_row().unwrap(), 1);
    }

    #[test]
    fn missing_email_is_rejected() {
        let relay = relay("coffee-hour");
        assert!(!relay.submit(&Submission::new()).is_success());
    }

    #[test]
    fn optional_email_may_be_omitted() {
        let relay = relay("feedback");
        assert_eq!(relay.submit(&Submission::new()), ResultEnvelope::success(2));

        let envelope = relay.submit(&with_email("a@gmail.com"));
        assert_eq!(
            envelope.error.as_deref(),
            Some("If providing an email, please use your UCR email address (@ucr.edu)")
        );
    }

    #[test]
    fn closed_poll_rejects() {
        let mut schema = builtin("events").unwrap().clone();
        schema.closes_at = Some(DateTime::parse_from_rfc3339("2025-10-17T23:59:59-07:00").unwrap());
        let store = Arc::new(MemoryStore::new(schema.headers()));
        let relay = Relay::new(schema, store, InstitutionConfig::default());

        let after = DateTime::parse_from_rfc3339("2025-10-18T07:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let envelope = relay.submit_at(&with_email("a@ucr.edu"), after);
        assert_eq!(
            envelope.error.as_deref(),
            Some("This poll closed on October 17, 2025 at 11:59 PM.")
        );

        let before = DateTime::parse_from_rfc3339("2025-10-17T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(relay.submit_at(&with_email("a@ucr.edu"), before).is_success());
    }
}
