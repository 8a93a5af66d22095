use formrelay::form::{FormSection, FormSnapshot, Question};
use formrelay::progress::{RampSegment, evaluate};
use proptest::prelude::*;

/// Builds a form where each `true` is an answered text question
fn form_from(sections: &[Vec<bool>]) -> FormSnapshot {
    let sections = sections
        .iter()
        .enumerate()
        .map(|(s, answers)| {
            let questions = answers
                .iter()
                .enumerate()
                .map(|(q, answered)| {
                    Question::text(format!("q{}_{}", s, q), if *answered { "yes" } else { "" })
                })
                .collect();
            FormSection::new(format!("Section {}", s), questions)
        })
        .collect();
    FormSnapshot::new(sections)
}

fn sections_strategy() -> impl Strategy<Value = Vec<Vec<bool>>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), 0..6), 0..6)
}

proptest! {
    #[test]
    fn answering_never_lowers_progress(sections in sections_strategy(), pick in any::<prop::sample::Index>()) {
        let before = evaluate(&form_from(&sections));

        let unanswered: Vec<(usize, usize)> = sections
            .iter()
            .enumerate()
            .flat_map(|(s, qs)| qs.iter().enumerate().filter(|(_, a)| !**a).map(move |(q, _)| (s, q)))
            .collect();
        prop_assume!(!unanswered.is_empty());

        let (s, q) = unanswered[pick.index(unanswered.len())];
        let mut more = sections.clone();
        more[s][q] = true;
        let after = evaluate(&form_from(&more));

        prop_assert!(after.percentage >= before.percentage);
        prop_assert_eq!(after.completed_count, before.completed_count + 1);
        prop_assert_eq!(after.total_count, before.total_count);
    }

    #[test]
    fn counts_stay_consistent(sections in sections_strategy()) {
        let snapshot = evaluate(&form_from(&sections));

        prop_assert!(snapshot.completed_count <= snapshot.total_count);
        prop_assert!(snapshot.percentage <= 100);
        prop_assert_eq!(snapshot.is_complete(), snapshot.first_incomplete_section.is_none() && snapshot.total_count > 0);

        let non_empty = sections.iter().filter(|qs| !qs.is_empty()).count();
        prop_assert_eq!(snapshot.section_statuses.len(), non_empty);

        let first = snapshot.section_statuses.iter().find(|s| !s.completed).map(|s| s.name.clone());
        prop_assert_eq!(snapshot.first_incomplete_section, first);
    }

    #[test]
    fn ramp_only_moves_toward_green(pct in 0u8..100) {
        let rank = |segment: RampSegment| match segment {
            RampSegment::RedToOrange => 0,
            RampSegment::OrangeToYellow => 1,
            RampSegment::YellowToGreen => 2,
        };
        prop_assert!(rank(RampSegment::for_percentage(pct)) <= rank(RampSegment::for_percentage(pct + 1)));
    }
}

#[test]
fn form_without_questions_is_zero_percent() {
    let snapshot = evaluate(&form_from(&[vec![], vec![]]));
    assert_eq!(snapshot.total_count, 0);
    assert_eq!(snapshot.percentage, 0);
    assert!(snapshot.section_statuses.is_empty());
    assert!(!snapshot.is_complete());
}

#[test]
fn fully_answered_form_is_complete() {
    let snapshot = evaluate(&form_from(&[vec![true, true], vec![true]]));
    assert_eq!(snapshot.percentage, 100);
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.first_incomplete_section, None);
}

#[test]
fn suggestions_alone_count_for_nothing() {
    let form = FormSnapshot::new(vec![
        FormSection::new(
            "Participation",
            vec![Question::choice("participation", &[("Often", false), ("Rarely", false)])],
        ),
        FormSection::new(
            "Additional Suggestions",
            vec![Question::text("suggestions", "More board games")],
        ),
    ]);

    let snapshot = evaluate(&form);
    assert_eq!(snapshot.total_count, 1);
    assert_eq!(snapshot.completed_count, 0);
    assert_eq!(snapshot.percentage, 0);
    assert_eq!(snapshot.section_statuses.len(), 1);
}

#[test]
fn checking_one_option_answers_the_group() {
    let form = FormSnapshot::new(vec![FormSection::new(
        "Scheduling",
        vec![
            Question::choice("days", &[("Monday", false), ("Friday", true)]),
            Question::choice("frequency", &[("Weekly", false)]),
        ],
    )]);

    let snapshot = evaluate(&form);
    assert_eq!(snapshot.completed_count, 1);
    assert_eq!(snapshot.percentage, 50);
    assert_eq!(snapshot.first_incomplete_section.as_deref(), Some("Scheduling"));
}
