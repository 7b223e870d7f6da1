use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::normalize::ScoreRecord;

/// Four-level qualitative scale derived from a rounded average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NeedsImprovement,
    Acceptable,
    Good,
    VeryGood,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::NeedsImprovement,
        Status::Acceptable,
        Status::Good,
        Status::VeryGood,
    ];

    pub fn from_rounded(level: i64) -> Option<Status> {
        match level {
            1 => Some(Status::NeedsImprovement),
            2 => Some(Status::Acceptable),
            3 => Some(Status::Good),
            4 => Some(Status::VeryGood),
            _ => None,
        }
    }

    /// The one place the rounding rule is applied: half rounds away from
    /// zero, so 2.5 is "good" and 1.5 is "acceptable".
    pub fn from_average(avg: f64) -> Option<Status> {
        Status::from_rounded(round_half_away(avg))
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::NeedsImprovement => "Needs Improvement",
            Status::Acceptable => "Acceptable",
            Status::Good => "Good",
            Status::VeryGood => "Very Good",
        }
    }
}

pub fn round_half_away(x: f64) -> i64 {
    x.round() as i64
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: Status,
    pub count: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub lesson: String,
    pub counts: Vec<StatusCount>,
    /// Students that received a status; averages rounding outside the scale
    /// are excluded, as are students with no valid scores.
    pub student_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub rank: i64,
    pub student: String,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub lesson: String,
    pub average: f64,
    pub status: Option<Status>,
}

/// Lessons in first-appearance order of the tidy table.
pub fn lessons(records: &[ScoreRecord]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for r in records {
        if !seen.iter().any(|l| l == &r.lesson) {
            seen.push(r.lesson.clone());
        }
    }
    seen
}

/// Students in first-appearance order, optionally restricted to one lesson.
pub fn students(records: &[ScoreRecord], lesson: Option<&str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for r in records {
        if let Some(l) = lesson {
            if r.lesson != l {
                continue;
            }
        }
        if !seen.iter().any(|s| s == &r.student) {
            seen.push(r.student.clone());
        }
    }
    seen
}

/// Per-student mean over the matching records, name-ordered. Students with no
/// matching record are simply absent.
fn mean_by_student(records: &[ScoreRecord], lesson: Option<&str>) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (i64, usize)> = BTreeMap::new();
    for r in records {
        if let Some(l) = lesson {
            if r.lesson != l {
                continue;
            }
        }
        let entry = sums.entry(r.student.clone()).or_insert((0, 0));
        entry.0 += r.score;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(student, (sum, n))| (student, sum as f64 / n as f64))
        .collect()
}

/// Competition ranking over name-ordered per-student means: ties share the
/// best rank and the next distinct mean skips by the tie-group size.
fn rank_means(means: BTreeMap<String, f64>) -> Vec<RankedStudent> {
    let mut rows: Vec<(String, f64)> = means.into_iter().collect();
    // Stable sort keeps tied students in name order.
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut out: Vec<RankedStudent> = Vec::with_capacity(rows.len());
    for (i, (student, mean)) in rows.into_iter().enumerate() {
        let rank = match out.last() {
            Some(prev) if prev.mean == mean => prev.rank,
            _ => i as i64 + 1,
        };
        out.push(RankedStudent {
            rank,
            student,
            mean,
        });
    }
    out
}

pub fn lesson_ranking(records: &[ScoreRecord], lesson: &str) -> Vec<RankedStudent> {
    rank_means(mean_by_student(records, Some(lesson)))
}

/// One mean per student over every (lesson, week) record they have, not a
/// mean of per-lesson means.
pub fn overall_ranking(records: &[ScoreRecord]) -> Vec<RankedStudent> {
    rank_means(mean_by_student(records, None))
}

pub fn lesson_quality_breakdown(records: &[ScoreRecord], lesson: &str) -> StatusBreakdown {
    let means = mean_by_student(records, Some(lesson));
    let mut tallies = [0usize; 4];
    let mut classified = 0usize;
    for (_, mean) in means {
        if let Some(status) = Status::from_average(mean) {
            let slot = Status::ALL.iter().position(|s| *s == status).unwrap();
            tallies[slot] += 1;
            classified += 1;
        }
    }

    let counts = Status::ALL
        .iter()
        .zip(tallies)
        .map(|(status, count)| StatusCount {
            status: *status,
            count,
            proportion: if classified > 0 {
                count as f64 / classified as f64
            } else {
                0.0
            },
        })
        .collect();

    StatusBreakdown {
        lesson: lesson.to_string(),
        counts,
        student_count: classified,
    }
}

/// Report-card rows for one student: mean and status for every lesson the
/// student has any record in, in the table's lesson order. Lessons without a
/// record for the student are omitted, not zero-filled.
pub fn student_report_card(records: &[ScoreRecord], student: &str) -> Vec<ReportRow> {
    let mut rows = Vec::new();
    for lesson in lessons(records) {
        let mut sum = 0i64;
        let mut n = 0usize;
        for r in records {
            if r.lesson == lesson && r.student == student {
                sum += r.score;
                n += 1;
            }
        }
        if n == 0 {
            continue;
        }
        let average = sum as f64 / n as f64;
        rows.push(ReportRow {
            lesson,
            average,
            status: Status::from_average(average),
        });
    }
    rows
}

/// Class-wide mean of a lesson over every record, for the report card's
/// comparison column.
pub fn lesson_mean(records: &[ScoreRecord], lesson: &str) -> Option<f64> {
    let mut sum = 0i64;
    let mut n = 0usize;
    for r in records {
        if r.lesson == lesson {
            sum += r.score;
            n += 1;
        }
    }
    if n == 0 {
        None
    } else {
        Some(sum as f64 / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(student: &str, lesson: &str, week: &str, score: i64) -> ScoreRecord {
        ScoreRecord {
            student: student.to_string(),
            lesson: lesson.to_string(),
            week: week.to_string(),
            score,
        }
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_half_away(2.5), 3);
        assert_eq!(round_half_away(1.5), 2);
        assert_eq!(round_half_away(1.49), 1);
        assert_eq!(round_half_away(3.5), 4);
        assert_eq!(round_half_away(-2.5), -3);
    }

    #[test]
    fn status_boundaries_follow_the_rounding_rule() {
        assert_eq!(Status::from_average(2.5), Some(Status::Good));
        assert_eq!(Status::from_average(1.5), Some(Status::Acceptable));
        assert_eq!(Status::from_average(1.49), Some(Status::NeedsImprovement));
        assert_eq!(Status::from_average(3.5), Some(Status::VeryGood));
        assert_eq!(Status::from_average(4.6), None);
        assert_eq!(Status::from_average(0.4), None);
    }

    #[test]
    fn competition_ranking_shares_and_skips() {
        let records = vec![
            rec("Ava", "Math", "week 1", 90),
            rec("Ben", "Math", "week 1", 90),
            rec("Cleo", "Math", "week 1", 80),
        ];
        let ranks = lesson_ranking(&records, "Math");
        assert_eq!(
            ranks
                .iter()
                .map(|r| (r.rank, r.student.as_str()))
                .collect::<Vec<_>>(),
            vec![(1, "Ava"), (1, "Ben"), (3, "Cleo")]
        );
    }

    #[test]
    fn overall_ranking_matches_lesson_ranking_on_single_lesson() {
        let records = vec![
            rec("Ava", "Math", "week 1", 3),
            rec("Ava", "Math", "week 2", 4),
            rec("Ben", "Math", "week 1", 2),
        ];
        let by_lesson = lesson_ranking(&records, "Math");
        let overall = overall_ranking(&records);
        assert_eq!(by_lesson.len(), overall.len());
        for (a, b) in by_lesson.iter().zip(overall.iter()) {
            assert_eq!(a.rank, b.rank);
            assert_eq!(a.student, b.student);
            assert!((a.mean - b.mean).abs() < 1e-12);
        }
    }

    #[test]
    fn overall_mean_is_over_records_not_lesson_means() {
        // 3 Math records and 1 Science record: overall mean weights records.
        let records = vec![
            rec("Ava", "Math", "week 1", 4),
            rec("Ava", "Math", "week 2", 4),
            rec("Ava", "Math", "week 3", 4),
            rec("Ava", "Science", "week 1", 2),
        ];
        let overall = overall_ranking(&records);
        assert!((overall[0].mean - 3.5).abs() < 1e-12);
    }

    #[test]
    fn absent_student_is_absent_from_lesson_views() {
        let records = vec![
            rec("Ava", "Math", "week 1", 3),
            rec("Ben", "Science", "week 1", 4),
        ];
        let ranks = lesson_ranking(&records, "Math");
        assert!(ranks.iter().all(|r| r.student != "Ben"));
        let breakdown = lesson_quality_breakdown(&records, "Math");
        assert_eq!(breakdown.student_count, 1);
        let card = student_report_card(&records, "Ben");
        assert_eq!(card.len(), 1);
        assert_eq!(card[0].lesson, "Science");
    }

    #[test]
    fn breakdown_counts_and_proportions() {
        let records = vec![
            rec("Ava", "Math", "week 1", 4),
            rec("Ben", "Math", "week 1", 4),
            rec("Cleo", "Math", "week 1", 2),
            rec("Dina", "Math", "week 1", 40), // off the scale, excluded
        ];
        let b = lesson_quality_breakdown(&records, "Math");
        assert_eq!(b.student_count, 3);
        let very_good = b
            .counts
            .iter()
            .find(|c| c.status == Status::VeryGood)
            .unwrap();
        assert_eq!(very_good.count, 2);
        assert!((very_good.proportion - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn report_card_keeps_lesson_order_and_statuses() {
        let records = vec![
            rec("Ava", "Math", "week 1", 3),
            rec("Ava", "Math", "week 2", 4),
            rec("Ava", "Science", "week 1", 1),
            rec("Ben", "Art", "week 1", 2),
        ];
        let card = student_report_card(&records, "Ava");
        assert_eq!(
            card.iter().map(|r| r.lesson.as_str()).collect::<Vec<_>>(),
            vec!["Math", "Science"]
        );
        assert!((card[0].average - 3.5).abs() < 1e-12);
        assert_eq!(card[0].status, Some(Status::VeryGood));
        assert_eq!(card[1].status, Some(Status::NeedsImprovement));
    }
}
