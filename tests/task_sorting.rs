// Tests for learning-task urgency ordering.
use chrono::{DateTime, NaiveDate, Utc};
use compass_edu::model::{
    LearningTask, Submission, SubmissionKind, SubmissionStatus, far_future, sort_by_urgency,
};
use std::cmp::Ordering;
use strum::IntoEnumIterator;

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

fn task(id: i64, status: SubmissionStatus, due: DateTime<Utc>) -> LearningTask {
    LearningTask {
        id,
        activity_id: 0,
        class_code: String::new(),
        subject: String::new(),
        name: format!("task {id}"),
        description: String::new(),
        created: day(2023, 12, 1),
        due,
        status,
        attachments: Vec::new(),
        submissions: Vec::new(),
    }
}

fn submission(when: DateTime<Utc>) -> Submission {
    Submission {
        kind: SubmissionKind::File,
        file_name: "essay.pdf".into(),
        submitted: when,
        url: String::new(),
    }
}

#[test]
fn test_scenario_ordering() {
    let a = task(1, SubmissionStatus::NotSubmitted, day(2024, 1, 10));
    let b = task(2, SubmissionStatus::Overdue, day(2024, 1, 5));
    let c = task(3, SubmissionStatus::OnTime, day(2024, 1, 1));
    let d = task(4, SubmissionStatus::Unknown, day(2024, 1, 1));

    let mut tasks = vec![a, b, c, d];
    sort_by_urgency(&mut tasks);

    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![2, 1, 3, 4]);
}

#[test]
fn test_sorting_is_idempotent() {
    let mut tasks = vec![
        task(1, SubmissionStatus::OnTime, day(2024, 2, 1)),
        task(2, SubmissionStatus::Unknown, day(2024, 1, 1)),
        task(3, SubmissionStatus::Overdue, day(2024, 3, 1)),
        task(4, SubmissionStatus::Late, day(2024, 1, 15)),
        task(5, SubmissionStatus::NotSubmitted, day(2024, 1, 15)),
        task(6, SubmissionStatus::Overdue, day(2024, 3, 1)),
    ];
    sort_by_urgency(&mut tasks);
    let once: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    sort_by_urgency(&mut tasks);
    let twice: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(once, twice);

    // Equal rank and due date: upstream order survives (3 before 6).
    assert_eq!(&once[..2], &[3, 6]);
}

#[test]
fn test_all_status_pairs_follow_rank() {
    // Exhaustive over status pairs with equal due dates: the comparison
    // must agree with the documented rank in every combination.
    let due = day(2024, 1, 1);
    for left in SubmissionStatus::iter() {
        for right in SubmissionStatus::iter() {
            let a = task(1, left, due);
            let b = task(2, right, due);
            let expected = left.urgency_rank().cmp(&right.urgency_rank());
            assert_eq!(
                a.compare_urgency(&b),
                expected,
                "pair {left:?} vs {right:?}"
            );
        }
    }
}

#[test]
fn test_unknown_sorts_last() {
    let due = day(2024, 1, 1);
    for other in SubmissionStatus::iter().filter(|s| *s != SubmissionStatus::Unknown) {
        let unknown = task(1, SubmissionStatus::Unknown, due);
        let known = task(2, other, due);
        assert_eq!(unknown.compare_urgency(&known), Ordering::Greater);
    }
}

#[test]
fn test_open_sorts_before_settled() {
    let due = day(2024, 1, 1);
    for open in [SubmissionStatus::Overdue, SubmissionStatus::NotSubmitted] {
        for settled in [SubmissionStatus::OnTime, SubmissionStatus::Late] {
            let a = task(1, open, due);
            let b = task(2, settled, due);
            assert_eq!(a.compare_urgency(&b), Ordering::Less);
        }
    }
    // Overdue outranks NotSubmitted; the two settled states tie.
    let overdue = task(1, SubmissionStatus::Overdue, due);
    let open = task(2, SubmissionStatus::NotSubmitted, due);
    assert_eq!(overdue.compare_urgency(&open), Ordering::Less);

    let on_time = task(3, SubmissionStatus::OnTime, due);
    let late = task(4, SubmissionStatus::Late, due);
    assert_eq!(on_time.compare_urgency(&late), Ordering::Equal);
}

#[test]
fn test_due_date_breaks_ties() {
    let early = task(1, SubmissionStatus::NotSubmitted, day(2024, 1, 2));
    let later = task(2, SubmissionStatus::NotSubmitted, day(2024, 1, 9));
    assert_eq!(early.compare_urgency(&later), Ordering::Less);

    // The far-future sentinel puts undated tasks after dated ones of the
    // same rank.
    let undated = task(3, SubmissionStatus::NotSubmitted, far_future());
    assert_eq!(later.compare_urgency(&undated), Ordering::Less);
    assert!(!undated.has_deadline());
}

#[test]
fn test_completion_and_lateness_derivation() {
    let due = day(2024, 1, 10);

    let untouched = task(1, SubmissionStatus::NotSubmitted, due);
    assert!(!untouched.is_completed());
    // Vacuously late with zero submissions; callers must pair the two.
    assert!(untouched.is_late());

    let mut on_time = task(2, SubmissionStatus::OnTime, due);
    on_time.submissions.push(submission(day(2024, 1, 8)));
    assert!(on_time.is_completed());
    assert!(!on_time.is_late());

    let mut late = task(3, SubmissionStatus::Late, due);
    late.submissions.push(submission(day(2024, 1, 12)));
    assert!(late.is_completed());
    assert!(late.is_late());

    // One early submission is enough to not be late.
    let mut mixed = task(4, SubmissionStatus::Late, due);
    mixed.submissions.push(submission(day(2024, 1, 8)));
    mixed.submissions.push(submission(day(2024, 1, 12)));
    assert!(!mixed.is_late());
}

#[test]
fn test_status_code_mapping() {
    assert_eq!(SubmissionStatus::from_code(1), SubmissionStatus::NotSubmitted);
    assert_eq!(SubmissionStatus::from_code(2), SubmissionStatus::Overdue);
    assert_eq!(SubmissionStatus::from_code(3), SubmissionStatus::OnTime);
    assert_eq!(SubmissionStatus::from_code(4), SubmissionStatus::Late);
    assert_eq!(SubmissionStatus::from_code(0), SubmissionStatus::Unknown);
    assert_eq!(SubmissionStatus::from_code(99), SubmissionStatus::Unknown);

    assert!(SubmissionStatus::OnTime.is_submitted());
    assert!(SubmissionStatus::Late.is_submitted());
    assert!(!SubmissionStatus::Overdue.is_submitted());
    assert!(!SubmissionStatus::Unknown.is_submitted());
}
