use std::cmp::Ordering;

use crate::error::CoreError;
use crate::model::{
    AssessmentCategory, AssessmentRecord, CategoryScore, ClassStatistics, CompositeGrade,
    LetterGrade,
};

/// Lower bounds (inclusive) of the canonical letter table, highest first.
const LETTER_TABLE: [(f64, LetterGrade); 4] = [
    (90.0, LetterGrade::A),
    (80.0, LetterGrade::B),
    (70.0, LetterGrade::C),
    (60.0, LetterGrade::D),
];

impl LetterGrade {
    pub fn from_percentage(percentage: f64) -> Result<LetterGrade, CoreError> {
        if !(0.0..=100.0).contains(&percentage) {
            // NaN fails the range check too.
            return Err(CoreError::OutOfRange(percentage));
        }
        Ok(LETTER_TABLE
            .iter()
            .find(|(floor, _)| percentage >= *floor)
            .map(|(_, letter)| *letter)
            .unwrap_or(LetterGrade::F))
    }
}

/// Folds one student's records for `(subject, term)` into a composite grade.
///
/// Missing categories are left out of both the weighted sum and the weight
/// denominator. Records for other keys in `records` are ignored; when a
/// category appears more than once the last record wins.
pub fn compute_composite(
    student_id: &str,
    subject: &str,
    term: &str,
    records: &[AssessmentRecord],
) -> Result<CompositeGrade, CoreError> {
    let mut latest: [Option<&AssessmentRecord>; 4] = [None; 4];
    for r in records {
        if r.student_id != student_id || r.subject != subject || r.term != term {
            continue;
        }
        latest[r.category.index()] = Some(r);
    }

    let mut weighted_sum = 0.0_f64;
    let mut weighted_denom = 0.0_f64;
    let mut categories: Vec<CategoryScore> = Vec::new();

    for (category, record) in AssessmentCategory::ALL.iter().zip(latest.iter()) {
        let Some(r) = record else {
            continue;
        };
        if r.max_score <= 0.0 {
            return Err(CoreError::validation_with(
                "maxScore must be > 0",
                serde_json::json!({ "category": category.as_str() }),
            ));
        }
        let percent = r.raw_score / r.max_score * 100.0;
        let weight = category.weight();
        weighted_sum += percent * weight;
        weighted_denom += weight;
        categories.push(CategoryScore {
            category: *category,
            weight,
            percentage: percent,
        });
    }

    let (percentage, letter) = if weighted_denom > 0.0 {
        let p = weighted_sum / weighted_denom;
        (Some(p), Some(LetterGrade::from_percentage(p)?))
    } else {
        (None, None)
    };

    Ok(CompositeGrade {
        student_id: student_id.to_string(),
        subject: subject.to_string(),
        term: term.to_string(),
        percentage,
        letter,
        categories,
    })
}

fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

/// Class-level summary. `total` counts every grade passed in; the numeric
/// fields only consider graded students and are `None` when there are none.
pub fn aggregate(grades: &[CompositeGrade]) -> ClassStatistics {
    let percents: Vec<f64> = grades
        .iter()
        .filter(|g| g.is_graded())
        .filter_map(|g| g.percentage)
        .collect();
    if percents.is_empty() {
        return ClassStatistics {
            average: None,
            highest: None,
            lowest: None,
            median: None,
            total: grades.len(),
            graded: 0,
        };
    }

    let sum: f64 = percents.iter().sum();
    let highest = percents.iter().copied().fold(f64::MIN, f64::max);
    let lowest = percents.iter().copied().fold(f64::MAX, f64::min);

    ClassStatistics {
        average: Some(sum / (percents.len() as f64)),
        highest: Some(highest),
        lowest: Some(lowest),
        median: Some(compute_median(&percents)),
        total: grades.len(),
        graded: percents.len(),
    }
}
