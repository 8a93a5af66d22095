use crate::form::{Control, FormSection, FormSnapshot, GroupScope, Question};
use crate::submission::{MULTI_VALUE_SEPARATOR, Submission};
use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Header of the first column of every response sheet
pub const TIMESTAMP_HEADER: &str = "Timestamp";

lazy_static! {
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap();
    static ref BUILTIN_POLLS: Vec<PollSchema> = vec![
        events_poll(),
        coffee_hour_poll(),
        merch_poll(),
        contact_form(),
        feedback_form(),
    ];
}

/// How a field is answered on the page
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Text input, select or textarea
    Text,
    /// Checkbox or radio group
    Choice,
}

/// Whether the institutional email is mandatory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailPolicy {
    /// The email must be present and institutional
    Required,
    /// The email may be omitted, but if given it must be institutional
    Optional,
}

/// One column of the response sheet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Form field name
    pub field: String,

    /// Sheet header
    pub header: String,

    pub kind: FieldKind,

    /// Page section and digest heading the field belongs to
    pub group: String,
}

impl Column {
    fn new(field: &str, header: &str, kind: FieldKind, group: &str) -> Self {
        Column {
            field: field.to_string(),
            header: header.to_string(),
            kind,
            group: group.to_string(),
        }
    }
}

/// Fixed layout of one poll or form
///
/// The column order is the record order; it never changes for a given poll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollSchema {
    /// URL-safe identifier, e.g. `coffee-hour`
    pub slug: String,

    /// Human-readable name used in the liveness probe and the digest
    pub title: String,

    /// Columns after the timestamp
    pub columns: Vec<Column>,

    pub email_policy: EmailPolicy,

    /// Submissions after this instant are rejected
    #[serde(default)]
    pub closes_at: Option<DateTime<FixedOffset>>,
}

impl PollSchema {
    /// Sheet header row, starting with the timestamp column
    pub fn headers(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP_HEADER.to_string())
            .chain(self.columns.iter().map(|c| c.header.clone()))
            .collect()
    }

    /// Maps a submission onto the fixed column order
    ///
    /// Fields that were not posted become empty strings, so every record has
    /// exactly `headers().len()` cells. Fields not in the schema are ignored.
    ///
    /// # Examples
    /// ```
    /// use formrelay::schema::builtin;
    /// use formrelay::submission::Submission;
    ///
    /// let schema = builtin("contact").unwrap();
    /// let mut form = Submission::new();
    /// form.push("email", "a@ucr.edu");
    ///
    /// let record = schema.record(&form, "2025-10-01T00:00:00.000Z");
    /// assert_eq!(record, vec!["2025-10-01T00:00:00.000Z", "", "a@ucr.edu", "", ""]);
    /// ```
    pub fn record(&self, submission: &Submission, timestamp: &str) -> Vec<String> {
        std::iter::once(timestamp.to_string())
            .chain(
                self.columns
                    .iter()
                    .map(|c| submission.value_or_empty(&c.field).to_string()),
            )
            .collect()
    }

    /// Group headings in first-appearance order
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for column in &self.columns {
            if !groups.contains(&column.group.as_str()) {
                groups.push(&column.group);
            }
        }
        groups
    }

    /// Columns belonging to one group, in column order
    pub fn columns_in<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Column> + 'a {
        self.columns.iter().filter(move |c| c.group == group)
    }

    /// Rebuilds the page's form state from the values a browser posted
    ///
    /// Each group becomes a section. Choice fields become name-scoped groups
    /// whose checked controls are the posted choices.
    pub fn layout(&self, submission: &Submission) -> FormSnapshot {
        let sections = self
            .groups()
            .into_iter()
            .map(|group| {
                let questions = self
                    .columns_in(group)
                    .map(|column| question_for(column, submission))
                    .collect();
                FormSection::new(group, questions)
            })
            .collect();

        FormSnapshot::new(sections)
    }

    /// Whether a submission at `now` is still accepted
    pub fn is_open_at(&self, now: DateTime<FixedOffset>) -> bool {
        match self.closes_at {
            Some(deadline) => now <= deadline,
            None => true,
        }
    }

    /// Checks the slug and that every field appears once
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_slug(&self.slug) {
            return Err(format!("Invalid poll slug: {}", self.slug));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.field == column.field) {
                return Err(format!(
                    "Poll {} lists field {} twice",
                    self.slug, column.field
                ));
            }
        }
        Ok(())
    }
}

fn question_for(column: &Column, submission: &Submission) -> Question {
    let value = submission.value_or_empty(&column.field);
    match column.kind {
        FieldKind::Text => Question::text(column.field.clone(), value),
        FieldKind::Choice => Question::ChoiceGroup {
            id: Some(column.field.clone()),
            scope: GroupScope::Name(column.field.clone()),
            controls: value
                .split(MULTI_VALUE_SEPARATOR)
                .filter(|choice| !choice.trim().is_empty())
                .map(|choice| Control::new(column.field.clone(), choice, true))
                .collect(),
        },
    }
}

/// Checks a slug against the allowed pattern
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// All polls known to the relay
pub fn builtin_polls() -> &'static [PollSchema] {
    &BUILTIN_POLLS
}

/// Looks up a built-in poll by slug
pub fn builtin(slug: &str) -> Option<&'static PollSchema> {
    BUILTIN_POLLS.iter().find(|p| p.slug == slug)
}

fn poll(slug: &str, title: &str, email_policy: EmailPolicy, columns: Vec<Column>) -> PollSchema {
    PollSchema {
        slug: slug.to_string(),
        title: title.to_string(),
        columns,
        email_policy,
        closes_at: None,
    }
}

fn events_poll() -> PollSchema {
    use FieldKind::*;
    poll(
        "events",
        "Events & Activities Poll",
        EmailPolicy::Required,
        vec![
            Column::new("email", "Email", Text, "Contact"),
            Column::new("onCampusSocial", "On-Campus Social Events", Choice, "On-Campus Events"),
            Column::new("onCampusGames", "On-Campus Games & Entertainment", Choice, "On-Campus Events"),
            Column::new("seasonalEvents", "Seasonal Celebrations", Choice, "On-Campus Events"),
            Column::new("outdoorActivities", "Outdoor Activities", Choice, "Off-Campus Activities"),
            Column::new("dayTrips", "Day Trips", Choice, "Off-Campus Activities"),
            Column::new("entertainment", "Entertainment Outings", Choice, "Off-Campus Activities"),
            Column::new("eventFrequency", "Event Frequency", Choice, "Timing & Logistics"),
            Column::new("availability", "Availability Times", Choice, "Timing & Logistics"),
            Column::new("barriers", "Main Barriers", Choice, "Timing & Logistics"),
            Column::new("eventBudget", "Event Budget", Choice, "Fundraising"),
            Column::new("3dprintInterest", "3D Print Interest", Choice, "Fundraising"),
            Column::new("participation", "Participation Level", Choice, "Participation"),
            Column::new("alcoholPreference", "Alcohol Preference", Choice, "Participation"),
            Column::new("suggestions", "Additional Suggestions", Text, "Additional Suggestions"),
        ],
    )
}

fn coffee_hour_poll() -> PollSchema {
    use FieldKind::*;
    poll(
        "coffee-hour",
        "Coffee Hour Poll",
        EmailPolicy::Required,
        vec![
            Column::new("email", "Email", Text, "Contact"),
            Column::new("role", "Role", Choice, "About You"),
            Column::new("frequency", "Frequency", Choice, "Scheduling"),
            Column::new("days", "Preferred Days", Choice, "Scheduling"),
            Column::new("duration", "Duration", Choice, "Scheduling"),
            Column::new("startTime", "Start Time", Choice, "Scheduling"),
            Column::new("coffeeTypes", "Coffee Types", Choice, "Food & Beverages"),
            Column::new("teaTypes", "Tea Types", Choice, "Food & Beverages"),
            Column::new("foodOptions", "Food Options", Choice, "Food & Beverages"),
            Column::new("environment", "Environment Preference", Choice, "Location & Environment"),
            Column::new("location", "Location Preference", Choice, "Location & Environment"),
            Column::new("labHosting", "Lab Hosting Willingness", Choice, "Participation"),
            Column::new("musicTypes", "Music Types", Choice, "Location & Environment"),
            Column::new("barriers", "Barriers", Choice, "Participation"),
            Column::new("suggestions", "Additional Suggestions", Text, "Suggestions"),
        ],
    )
}

fn merch_poll() -> PollSchema {
    use FieldKind::*;
    poll(
        "3d-merch",
        "3D Print Merchandise Poll",
        EmailPolicy::Required,
        vec![
            Column::new("email", "Email", Text, "Contact"),
            Column::new("purchaseInterest", "Purchase Interest", Choice, "Interest"),
            Column::new("keychainProducts", "Keychain Products", Choice, "Products"),
            Column::new("decorativeProducts", "Decorative Products", Choice, "Products"),
            Column::new("functionalProducts", "Functional Products", Choice, "Products"),
            Column::new("favoriteInsects", "Favorite Insects", Choice, "Products"),
            Column::new("designStyle", "Design Style", Choice, "Design & Printing"),
            Column::new("printingMethod", "Printing Method", Choice, "Design & Printing"),
            Column::new("colorPreference", "Color Preference", Choice, "Design & Printing"),
            Column::new("sizePreference", "Size Preference", Choice, "Design & Printing"),
            Column::new("priceSmall", "Price (Small Items)", Choice, "Pricing"),
            Column::new("priceLarge", "Price (Large Items)", Choice, "Pricing"),
            Column::new("suggestions", "Additional Suggestions", Text, "Suggestions"),
        ],
    )
}

fn contact_form() -> PollSchema {
    use FieldKind::*;
    poll(
        "contact",
        "Contact Form",
        EmailPolicy::Required,
        vec![
            Column::new("name", "Name", Text, "Contact"),
            Column::new("email", "Email", Text, "Contact"),
            Column::new("subject", "Subject", Text, "Message"),
            Column::new("message", "Message", Text, "Message"),
        ],
    )
}

fn feedback_form() -> PollSchema {
    use FieldKind::*;
    poll(
        "feedback",
        "Feedback Form",
        EmailPolicy::Optional,
        vec![
            Column::new("name", "Name", Text, "About You"),
            Column::new("email", "Email", Text, "About You"),
            Column::new("role", "Role", Choice, "About You"),
            Column::new("feedback_type", "Feedback Type", Choice, "Feedback"),
            Column::new("suggestions", "Message", Text, "Feedback"),
        ],
    )
}
