use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub grade_level: String,
    pub section: Option<String>,
    pub admission_seq: i64,
    pub admitted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub code: String,
    pub name: String,
}

/// Closed set of graded assessment kinds. Declaration order is the fixed
/// iteration order used by the grade calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssessmentCategory {
    Test,
    Assignment,
    MidExam,
    FinalExam,
}

impl AssessmentCategory {
    pub const ALL: [AssessmentCategory; 4] = [
        AssessmentCategory::Test,
        AssessmentCategory::Assignment,
        AssessmentCategory::MidExam,
        AssessmentCategory::FinalExam,
    ];

    /// Position in [`AssessmentCategory::ALL`].
    pub fn index(self) -> usize {
        match self {
            AssessmentCategory::Test => 0,
            AssessmentCategory::Assignment => 1,
            AssessmentCategory::MidExam => 2,
            AssessmentCategory::FinalExam => 3,
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            AssessmentCategory::Test => 0.20,
            AssessmentCategory::Assignment => 0.20,
            AssessmentCategory::MidExam => 0.30,
            AssessmentCategory::FinalExam => 0.30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentCategory::Test => "test",
            AssessmentCategory::Assignment => "assignment",
            AssessmentCategory::MidExam => "midExam",
            AssessmentCategory::FinalExam => "finalExam",
        }
    }
}

impl fmt::Display for AssessmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssessmentCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| CoreError::UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    pub student_id: String,
    pub subject: String,
    pub category: AssessmentCategory,
    pub term: String,
    pub raw_score: f64,
    pub max_score: f64,
    pub updated_at: Option<String>,
}

impl AssessmentRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            student_id: self.student_id.clone(),
            subject: self.subject.clone(),
            category: self.category,
            term: self.term.clone(),
        }
    }

    /// Score bounds only; reference checks need a repository and live in the engine.
    pub fn validate_scores(&self) -> Result<(), CoreError> {
        if !self.max_score.is_finite() || !self.raw_score.is_finite() {
            return Err(CoreError::validation("scores must be finite numbers"));
        }
        if self.max_score <= 0.0 {
            return Err(CoreError::validation(format!(
                "maxScore must be > 0 (got {})",
                self.max_score
            )));
        }
        if self.raw_score < 0.0 || self.raw_score > self.max_score {
            return Err(CoreError::validation(format!(
                "rawScore must be within [0, {}] (got {})",
                self.max_score, self.raw_score
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub student_id: String,
    pub subject: String,
    pub category: AssessmentCategory,
    pub term: String,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub student_id: Option<String>,
    pub subject: Option<String>,
    pub term: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, r: &AssessmentRecord) -> bool {
        let student_ok = self
            .student_id
            .as_ref()
            .map(|v| *v == r.student_id)
            .unwrap_or(true);
        let subject_ok = self.subject.as_ref().map(|v| *v == r.subject).unwrap_or(true);
        let term_ok = self.term.as_ref().map(|v| *v == r.term).unwrap_or(true);
        student_ok && subject_ok && term_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: AssessmentCategory,
    pub weight: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeGrade {
    pub student_id: String,
    pub subject: String,
    pub term: String,
    /// `None` means not graded yet, which is distinct from a computed 0%.
    pub percentage: Option<f64>,
    pub letter: Option<LetterGrade>,
    pub categories: Vec<CategoryScore>,
}

impl CompositeGrade {
    pub fn is_graded(&self) -> bool {
        self.percentage.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub average: Option<f64>,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    pub median: Option<f64>,
    pub total: usize,
    pub graded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSection {
    pub grade_level: String,
    pub label: String,
    pub room: String,
    pub student_ids: Vec<String>,
}
