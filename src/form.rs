use serde::{Deserialize, Serialize};

/// Identifier of the free-text suggestions question.
///
/// This question is optional on every poll and is never counted toward progress.
pub const SUGGESTIONS_FIELD: &str = "suggestions";

/// The current state of a multi-section form
///
/// A snapshot is built once per evaluation pass, either from a live page or from
/// the values a browser posts back, and handed to [`crate::progress::evaluate`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    /// Sections in document order
    pub sections: Vec<FormSection>,
}

/// A named grouping of questions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormSection {
    /// Heading text. A section without a heading is skipped by the tracker.
    pub heading: Option<String>,

    /// Top-level questions in document order
    pub questions: Vec<Question>,
}

/// How the controls of a choice group are located
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupScope {
    /// Every control in the section sharing this `name` attribute
    Name(String),

    /// Only the controls inside the question's own block
    Block,
}

/// One checkbox or radio control
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub name: String,
    pub value: String,
    pub checked: bool,
}

/// One labeled form question
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Question {
    /// Text input, select or textarea
    SingleValue { id: String, value: String },

    /// A set of checkbox or radio controls answering one question
    ChoiceGroup {
        id: Option<String>,
        scope: GroupScope,
        controls: Vec<Control>,
    },
}

impl FormSnapshot {
    pub fn new(sections: Vec<FormSection>) -> Self {
        FormSnapshot { sections }
    }
}

impl FormSection {
    /// Creates a section with a heading
    pub fn new(heading: impl Into<String>, questions: Vec<Question>) -> Self {
        FormSection {
            heading: Some(heading.into()),
            questions,
        }
    }

    /// Creates a section whose heading element is missing
    pub fn untitled(questions: Vec<Question>) -> Self {
        FormSection {
            heading: None,
            questions,
        }
    }

    /// Checks whether any control named `name` in this section is checked
    pub fn any_checked_named(&self, name: &str) -> bool {
        self.questions.iter().any(|q| match q {
            Question::ChoiceGroup { controls, .. } => {
                controls.iter().any(|c| c.checked && c.name == name)
            }
            Question::SingleValue { .. } => false,
        })
    }
}

impl Control {
    pub fn new(name: impl Into<String>, value: impl Into<String>, checked: bool) -> Self {
        Control {
            name: name.into(),
            value: value.into(),
            checked,
        }
    }
}

impl Question {
    /// Builds a single-value question
    pub fn text(id: impl Into<String>, value: impl Into<String>) -> Self {
        Question::SingleValue {
            id: id.into(),
            value: value.into(),
        }
    }

    /// Builds a choice group resolved by the shared `name` attribute
    ///
    /// `options` lists each option value with its checked state.
    pub fn choice(name: impl Into<String>, options: &[(&str, bool)]) -> Self {
        let name = name.into();
        let controls = options
            .iter()
            .map(|(value, checked)| Control::new(name.clone(), *value, *checked))
            .collect();

        Question::ChoiceGroup {
            id: Some(name.clone()),
            scope: GroupScope::Name(name),
            controls,
        }
    }

    /// Builds a choice group with no id mapping, resolved within its own block
    pub fn block(controls: Vec<Control>) -> Self {
        Question::ChoiceGroup {
            id: None,
            scope: GroupScope::Block,
            controls,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Question::SingleValue { id, .. } => Some(id),
            Question::ChoiceGroup { id, .. } => id.as_deref(),
        }
    }

    /// Whether this question counts toward progress
    pub fn is_countable(&self) -> bool {
        self.id() != Some(SUGGESTIONS_FIELD)
    }

    /// Decides whether the question is answered
    ///
    /// `section` is the enclosing section, used to resolve name-scoped groups
    /// whose controls may live outside the question's own block.
    pub fn is_answered(&self, section: &FormSection) -> bool {
        match self {
            Question::SingleValue { value, .. } => !value.trim().is_empty(),
            Question::ChoiceGroup {
                scope: GroupScope::Name(name),
                ..
            } => section.any_checked_named(name),
            Question::ChoiceGroup {
                scope: GroupScope::Block,
                controls,
                ..
            } => controls.iter().any(|c| c.checked),
        }
    }
}
