use serde::{Deserialize, Serialize};

/// Separator used when one field name is posted more than once
///
/// Checkbox groups arrive as repeated pairs; the response sheets store them as a
/// single cell of comma-separated choices.
pub const MULTI_VALUE_SEPARATOR: &str = ", ";

/// A single form submission
///
/// Field names keep the order in which they first appeared in the request body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    fields: Vec<(String, String)>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a submission from decoded form pairs
    ///
    /// # Examples
    /// ```
    /// use formrelay::submission::Submission;
    ///
    /// let form = Submission::from_pairs(vec![
    ///     ("email".to_string(), "a@ucr.edu".to_string()),
    ///     ("days".to_string(), "Monday".to_string()),
    ///     ("days".to_string(), "Friday".to_string()),
    /// ]);
    ///
    /// assert_eq!(form.get("days"), Some("Monday, Friday"));
    /// ```
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut submission = Submission::new();
        for (name, value) in pairs {
            submission.push(name, value);
        }
        submission
    }

    /// Adds a value, joining it onto an earlier value with the same name
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) if existing.is_empty() => *existing = value,
            Some((_, existing)) => {
                if !value.is_empty() {
                    existing.push_str(MULTI_VALUE_SEPARATOR);
                    existing.push_str(&value);
                }
            }
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a field, or the empty string when it was not posted
    pub fn value_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for Submission {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Submission::from_pairs(iter)
    }
}
