use crate::form::FormSnapshot;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Radius of the progress ring in pixels (100px circle)
pub const RING_RADIUS: f64 = 45.0;

/// Completion state of a single section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionStatus {
    pub name: String,
    pub completed: bool,
}

/// Result of one scoring pass over a form
///
/// Derived and ephemeral: recomputed from scratch on every input event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Number of countable questions that are answered
    pub completed_count: usize,

    /// Number of countable questions across all counted sections
    pub total_count: usize,

    /// Rounded completion, 0 to 100
    pub percentage: u8,

    /// One entry per counted section, in document order
    pub section_statuses: Vec<SectionStatus>,

    /// Name of the first section that still has unanswered questions
    pub first_incomplete_section: Option<String>,
}

impl ProgressSnapshot {
    /// True when every counted question is answered
    ///
    /// Not derived from `percentage`, which rounds 199 of 200 up to 100.
    pub fn is_complete(&self) -> bool {
        self.total_count > 0 && self.completed_count == self.total_count
    }

    /// Number of sections whose questions are all answered
    pub fn completed_sections(&self) -> usize {
        self.section_statuses.iter().filter(|s| s.completed).count()
    }
}

/// Scores a form snapshot
///
/// Percentage is per question, not per section. Sections without a heading or
/// without countable questions are left out of both numerator and denominator.
///
/// # Arguments
/// * `form` - The current state of the form
///
/// # Returns
/// * `ProgressSnapshot` - Counts, percentage and per-section statuses
///
/// # Examples
/// ```
/// use formrelay::form::{FormSection, FormSnapshot, Question};
/// use formrelay::progress::evaluate;
///
/// let form = FormSnapshot::new(vec![FormSection::new(
///     "About You",
///     vec![
///         Question::text("email", "a@ucr.edu"),
///         Question::choice("role", &[("Student", false), ("Staff", false)]),
///     ],
/// )]);
///
/// let snapshot = evaluate(&form);
/// assert_eq!(snapshot.percentage, 50);
/// assert_eq!(snapshot.first_incomplete_section.as_deref(), Some("About You"));
/// ```
pub fn evaluate(form: &FormSnapshot) -> ProgressSnapshot {
    let mut completed_count = 0;
    let mut total_count = 0;
    let mut section_statuses = Vec::new();
    let mut first_incomplete_section = None;

    for section in &form.sections {
        let Some(heading) = section.heading.as_deref() else {
            continue;
        };
        let name = heading.trim().to_string();

        let mut countable = 0;
        let mut answered = 0;
        for question in section.questions.iter().filter(|q| q.is_countable()) {
            countable += 1;
            if question.is_answered(section) {
                answered += 1;
            }
        }

        if countable == 0 {
            continue;
        }

        total_count += countable;
        completed_count += answered;

        let completed = answered == countable;
        if !completed && first_incomplete_section.is_none() {
            first_incomplete_section = Some(name.clone());
        }
        section_statuses.push(SectionStatus { name, completed });
    }

    ProgressSnapshot {
        completed_count,
        total_count,
        percentage: percentage(completed_count, total_count),
        section_statuses,
        first_incomplete_section,
    }
}

/// Rounds `100 * completed / total` half up, returning 0 for an empty form
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((200 * completed + total) / (2 * total)) as u8
}

/// Circumference of the progress ring
pub fn ring_circumference() -> f64 {
    2.0 * PI * RING_RADIUS
}

/// Stroke dash offset that reveals `percentage` of the ring
pub fn ring_offset(percentage: u8) -> f64 {
    let circumference = ring_circumference();
    circumference - (f64::from(percentage.min(100)) / 100.0) * circumference
}

/// RGB color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(0xff, 0x55, 0x55);
    pub const ORANGE: Rgb = Rgb(0xff, 0xb8, 0x6c);
    pub const YELLOW: Rgb = Rgb(0xf1, 0xfa, 0x8c);
    pub const GREEN: Rgb = Rgb(0x50, 0xfa, 0x7b);

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(self, to: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgb(mix(self.0, to.0), mix(self.1, to.1), mix(self.2, to.2))
    }
}

/// Band of the three-stop color ramp a percentage falls in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampSegment {
    /// 0 to 30 percent
    RedToOrange,
    /// 31 to 70 percent
    OrangeToYellow,
    /// 71 to 100 percent
    YellowToGreen,
}

impl RampSegment {
    pub fn for_percentage(percentage: u8) -> Self {
        match percentage {
            0..=30 => RampSegment::RedToOrange,
            31..=70 => RampSegment::OrangeToYellow,
            _ => RampSegment::YellowToGreen,
        }
    }

    /// Gradient start and end colors
    pub fn stops(&self) -> (Rgb, Rgb) {
        match self {
            RampSegment::RedToOrange => (Rgb::RED, Rgb::ORANGE),
            RampSegment::OrangeToYellow => (Rgb::ORANGE, Rgb::YELLOW),
            RampSegment::YellowToGreen => (Rgb::YELLOW, Rgb::GREEN),
        }
    }

    /// Inclusive percentage bounds of the band
    fn bounds(&self) -> (u8, u8) {
        match self {
            RampSegment::RedToOrange => (0, 30),
            RampSegment::OrangeToYellow => (30, 70),
            RampSegment::YellowToGreen => (70, 100),
        }
    }
}

/// Gradient applied to the ring for one percentage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gradient {
    pub segment: RampSegment,
    pub start: String,
    pub end: String,
    /// Interpolated color at the exact percentage
    pub current: String,
}

impl Gradient {
    pub fn for_percentage(percentage: u8) -> Self {
        let percentage = percentage.min(100);
        let segment = RampSegment::for_percentage(percentage);
        let (start, end) = segment.stops();
        let (low, high) = segment.bounds();
        let t = f64::from(percentage.saturating_sub(low)) / f64::from(high - low);

        Gradient {
            segment,
            start: start.hex(),
            end: end.hex(),
            current: start.lerp(end, t).hex(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Control, FormSection, FormSnapshot, Question};

    #[test]
    fn empty_form_scores_zero() {
        let snapshot = evaluate(&FormSnapshot::default());
        assert_eq!(snapshot.percentage, 0);
        assert_eq!(snapshot.total_count, 0);
        assert!(!snapshot.is_complete());
        assert!(snapshot.first_incomplete_section.is_none());
    }

    #[test]
    fn sections_without_countable_questions_are_ignored() {
        let form = FormSnapshot::new(vec![
            FormSection::new("Contact", vec![Question::text("email", "a@ucr.edu")]),
            FormSection::new("Suggestions", vec![Question::text("suggestions", "")]),
            FormSection::new("Empty", vec![]),
        ]);

        let snapshot = evaluate(&form);
        assert_eq!(snapshot.total_count, 1);
        assert_eq!(snapshot.percentage, 100);
        assert_eq!(snapshot.section_statuses.len(), 1);
        assert!(snapshot.is_complete());
    }

    #[test]
    fn untitled_sections_are_skipped() {
        let form = FormSnapshot::new(vec![
            FormSection::untitled(vec![Question::text("role", "")]),
            FormSection::new("Contact", vec![Question::text("email", "x@ucr.edu")]),
        ]);

        let snapshot = evaluate(&form);
        assert_eq!(snapshot.total_count, 1);
        assert_eq!(snapshot.percentage, 100);
    }

    #[test]
    fn whitespace_only_values_are_unanswered() {
        let form = FormSnapshot::new(vec![FormSection::new(
            "Contact",
            vec![Question::text("email", "   \t")],
        )]);
        assert_eq!(evaluate(&form).completed_count, 0);
    }

    #[test]
    fn percentage_is_per_question() {
        // Two sections, one fully answered: a section-based score would be 50.
        let form = FormSnapshot::new(vec![
            FormSection::new("One", vec![Question::text("a", "x")]),
            FormSection::new(
                "Two",
                vec![
                    Question::text("b", "x"),
                    Question::text("c", ""),
                    Question::text("d", ""),
                ],
            ),
        ]);

        let snapshot = evaluate(&form);
        assert_eq!(snapshot.completed_count, 2);
        assert_eq!(snapshot.total_count, 4);
        assert_eq!(snapshot.percentage, 50);
        assert_eq!(snapshot.completed_sections(), 1);
        assert_eq!(snapshot.first_incomplete_section.as_deref(), Some("Two"));
    }

    #[test]
    fn rounded_hundred_is_not_complete() {
        let mut questions: Vec<Question> = (0..199)
            .map(|i| Question::text(format!("q{}", i), "x"))
            .collect();
        questions.push(Question::text("last", ""));
        let form = FormSnapshot::new(vec![FormSection::new("A", questions)]);

        let snapshot = evaluate(&form);
        assert_eq!(snapshot.percentage, 100);
        assert!(!snapshot.is_complete());
        assert_eq!(snapshot.first_incomplete_section.as_deref(), Some("A"));
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn name_scoped_group_sees_controls_across_the_section() {
        let form = FormSnapshot::new(vec![FormSection::new(
            "Scheduling",
            vec![
                Question::ChoiceGroup {
                    id: Some("days".to_string()),
                    scope: crate::form::GroupScope::Name("days".to_string()),
                    controls: vec![Control::new("days", "Monday", false)],
                },
                Question::block(vec![Control::new("days", "Friday", true)]),
            ],
        )]);

        let snapshot = evaluate(&form);
        assert_eq!(snapshot.completed_count, 2);
    }

    #[test]
    fn block_scoped_group_only_sees_its_own_controls() {
        let form = FormSnapshot::new(vec![FormSection::new(
            "Scheduling",
            vec![
                Question::block(vec![Control::new("days", "Monday", false)]),
                Question::block(vec![Control::new("days", "Friday", true)]),
            ],
        )]);

        assert_eq!(evaluate(&form).completed_count, 1);
    }

    #[test]
    fn ramp_boundaries() {
        assert_eq!(RampSegment::for_percentage(0), RampSegment::RedToOrange);
        assert_eq!(RampSegment::for_percentage(30), RampSegment::RedToOrange);
        assert_eq!(RampSegment::for_percentage(31), RampSegment::OrangeToYellow);
        assert_eq!(RampSegment::for_percentage(70), RampSegment::OrangeToYellow);
        assert_eq!(RampSegment::for_percentage(71), RampSegment::YellowToGreen);
        assert_eq!(RampSegment::for_percentage(100), RampSegment::YellowToGreen);
    }

    #[test]
    fn gradient_endpoints() {
        assert_eq!(Gradient::for_percentage(0).current, "#ff5555");
        assert_eq!(Gradient::for_percentage(30).current, "#ffb86c");
        assert_eq!(Gradient::for_percentage(100).current, "#50fa7b");
        assert_eq!(Gradient::for_percentage(50).start, "#ffb86c");
        assert_eq!(Gradient::for_percentage(50).end, "#f1fa8c");
    }

    #[test]
    fn ring_offset_spans_the_circumference() {
        assert!((ring_offset(0) - ring_circumference()).abs() < 1e-9);
        assert!(ring_offset(100).abs() < 1e-9);
        assert!((ring_offset(50) - ring_circumference() / 2.0).abs() < 1e-9);
    }
}
