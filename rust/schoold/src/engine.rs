//! Operations the IPC layer exposes. Each one validates its input, reads a
//! snapshot through the repository, runs the pure grading or sectioning code
//! and writes back only when everything succeeded.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::calc;
use crate::error::CoreError;
use crate::model::{
    AssessmentCategory, AssessmentRecord, ClassSection, ClassStatistics, CompositeGrade,
    RecordFilter, Student, Subject,
};
use crate::sections::{self, SectionPolicy};
use crate::store::Repository;

/// Roster + record selection for class-level grade queries. `None` on
/// `grade_level`/`section` means no filter.
#[derive(Debug, Clone, Default)]
pub struct GradeQuery {
    pub subject: String,
    pub term: String,
    pub grade_level: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssessmentInput {
    pub student_id: String,
    pub subject: String,
    pub category: AssessmentCategory,
    pub term: String,
    pub raw_score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone)]
pub struct SavedRecord {
    pub record: AssessmentRecord,
    /// A previous record for the same key was replaced.
    pub superseded: bool,
}

fn non_empty(field: &str, value: &str) -> Result<String, CoreError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(CoreError::validation_with(
            format!("{field} must not be empty"),
            json!({ "field": field }),
        ));
    }
    Ok(v.to_string())
}

fn require_subject(repo: &dyn Repository, code: &str) -> Result<Subject, CoreError> {
    repo.get_subject(code)?.ok_or_else(|| {
        CoreError::validation_with("unknown subject", json!({ "subject": code }))
    })
}

pub fn create_subject(repo: &mut dyn Repository, code: &str, name: &str) -> Result<Subject, CoreError> {
    let subject = Subject {
        code: non_empty("code", code)?,
        name: non_empty("name", name)?,
    };
    repo.put_subject(&subject)?;
    Ok(subject)
}

/// Labels in `sections` that differ from what `roster` has stored.
fn changed_labels(roster: &[Student], sections: &[ClassSection]) -> Vec<(String, Option<String>)> {
    let placed: HashMap<String, String> = sections::labels_by_student(sections).into_iter().collect();
    roster
        .iter()
        .filter_map(|s| {
            let label = placed.get(&s.id).cloned();
            (s.section != label).then(|| (s.id.clone(), label))
        })
        .collect()
}

fn write_labels(
    repo: &mut dyn Repository,
    roster: &[Student],
    sections: &[ClassSection],
) -> Result<(), CoreError> {
    let labels = changed_labels(roster, sections);
    if !labels.is_empty() {
        repo.set_sections(&labels)?;
    }
    Ok(())
}

/// Re-partitions the given grade level (every grade when `None`) and stores
/// the resulting labels.
pub fn recompute_sections(
    repo: &mut dyn Repository,
    policy: &SectionPolicy,
    grade_level: Option<&str>,
) -> Result<Vec<ClassSection>, CoreError> {
    let roster = repo.list_students(grade_level)?;
    let sections = sections::assign(&roster, policy)?;
    write_labels(repo, &roster, &sections)?;
    info!(
        grade_level = grade_level.unwrap_or("ALL"),
        students = roster.len(),
        sections = sections.len(),
        "sections recomputed"
    );
    Ok(sections)
}

/// Admits a student and re-partitions its grade level. Nothing is written
/// if the grade level cannot take another student.
pub fn add_student(
    repo: &mut dyn Repository,
    policy: &SectionPolicy,
    name: &str,
    grade_level: &str,
) -> Result<(Student, Vec<ClassSection>), CoreError> {
    let name = non_empty("name", name)?;
    let grade_level = non_empty("gradeLevel", grade_level)?;

    let mut student = Student {
        id: Uuid::new_v4().to_string(),
        name,
        grade_level: grade_level.clone(),
        section: None,
        admission_seq: repo.next_admission_seq()?,
        admitted_at: Some(Utc::now().to_rfc3339()),
    };

    let existing = repo.list_students(Some(&grade_level))?;
    let placement = sections::assign_student_to_section(&student, &existing, policy)?;
    student.section = Some(placement.label);
    let sections = placement.sections;

    repo.admit_student(&student, &changed_labels(&existing, &sections))?;
    info!(
        student_id = %student.id,
        grade_level = %student.grade_level,
        section = student.section.as_deref().unwrap_or("-"),
        "student admitted"
    );
    Ok((student, sections))
}

/// Removes a student (and its records). Other students keep their labels;
/// the vacated seat is simply left open.
pub fn remove_student(
    repo: &mut dyn Repository,
    policy: &SectionPolicy,
    student_id: &str,
) -> Result<(Student, Vec<ClassSection>), CoreError> {
    let student = repo
        .get_student(student_id)?
        .ok_or(CoreError::NotFound("student"))?;
    let remaining: Vec<Student> = repo
        .list_students(Some(&student.grade_level))?
        .into_iter()
        .filter(|s| s.id != student.id)
        .collect();
    // The section cap only limits admissions.
    let open_ended = SectionPolicy {
        max_sections: None,
        ..policy.clone()
    };
    let sections = sections::assign(&remaining, &open_ended)?;

    repo.withdraw_student(&student.id, &changed_labels(&remaining, &sections))?;
    info!(student_id = %student.id, grade_level = %student.grade_level, "student removed");
    Ok((student, sections))
}

pub fn list_sections(
    repo: &dyn Repository,
    policy: &SectionPolicy,
    grade_level: Option<&str>,
) -> Result<(Vec<ClassSection>, Vec<String>), CoreError> {
    let roster = repo.list_students(grade_level)?;
    Ok(sections::current_sections(&roster, policy))
}

/// Validates and stores one record, superseding any previous record for the
/// same `(student, subject, category, term)`. On error nothing is written.
pub fn save_assessment(
    repo: &mut dyn Repository,
    input: AssessmentInput,
) -> Result<SavedRecord, CoreError> {
    let term = non_empty("term", &input.term)?;
    if repo.get_student(&input.student_id)?.is_none() {
        return Err(CoreError::validation_with(
            "unknown student",
            json!({ "studentId": input.student_id }),
        ));
    }
    require_subject(repo, &input.subject)?;

    let record = AssessmentRecord {
        student_id: input.student_id,
        subject: input.subject,
        category: input.category,
        term,
        raw_score: input.raw_score,
        max_score: input.max_score,
        updated_at: Some(Utc::now().to_rfc3339()),
    };
    record.validate_scores()?;
    let superseded = repo.get_record(&record.key())?.is_some();
    repo.put_record(&record)?;
    debug!(
        student_id = %record.student_id,
        subject = %record.subject,
        category = %record.category,
        term = %record.term,
        superseded,
        "assessment saved"
    );
    Ok(SavedRecord { record, superseded })
}

pub fn list_assessments(
    repo: &dyn Repository,
    filter: &RecordFilter,
) -> Result<Vec<AssessmentRecord>, CoreError> {
    Ok(repo.list_records(filter)?)
}

/// Composite grade for every student in the filtered roster, in admission
/// order. Students without records come back not graded.
pub fn composite_grades(
    repo: &dyn Repository,
    query: &GradeQuery,
) -> Result<Vec<CompositeGrade>, CoreError> {
    let subject = non_empty("subject", &query.subject)?;
    let term = non_empty("term", &query.term)?;
    require_subject(repo, &subject)?;

    let roster: Vec<Student> = repo
        .list_students(query.grade_level.as_deref())?
        .into_iter()
        .filter(|s| {
            query
                .section
                .as_ref()
                .map(|sec| s.section.as_deref() == Some(sec.as_str()))
                .unwrap_or(true)
        })
        .collect();

    let records = repo.list_records(&RecordFilter {
        student_id: None,
        subject: Some(subject.clone()),
        term: Some(term.clone()),
    })?;
    let mut by_student: HashMap<&str, Vec<AssessmentRecord>> = HashMap::new();
    for r in &records {
        by_student.entry(r.student_id.as_str()).or_default().push(r.clone());
    }

    roster
        .iter()
        .map(|s| {
            let own = by_student.get(s.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            calc::compute_composite(&s.id, &subject, &term, own)
        })
        .collect()
}

pub fn class_statistics(
    repo: &dyn Repository,
    query: &GradeQuery,
) -> Result<ClassStatistics, CoreError> {
    let grades = composite_grades(repo, query)?;
    Ok(calc::aggregate(&grades))
}

/// One composite per subject the student has records for in `term`.
pub fn student_grades(
    repo: &dyn Repository,
    student_id: &str,
    term: &str,
) -> Result<Vec<CompositeGrade>, CoreError> {
    let term = non_empty("term", term)?;
    if repo.get_student(student_id)?.is_none() {
        return Err(CoreError::NotFound("student"));
    }
    let records = repo.list_records(&RecordFilter {
        student_id: Some(student_id.to_string()),
        subject: None,
        term: Some(term.clone()),
    })?;
    let mut by_subject: BTreeMap<&str, Vec<AssessmentRecord>> = BTreeMap::new();
    for r in &records {
        by_subject.entry(r.subject.as_str()).or_default().push(r.clone());
    }
    by_subject
        .iter()
        .map(|(subject, recs)| calc::compute_composite(student_id, subject, &term, recs))
        .collect()
}
