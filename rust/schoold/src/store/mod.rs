//! Storage seam for the engine. Aggregation and sectioning only ever see
//! plain model values fetched through [`Repository`].

#[cfg(test)]
pub mod memory;
pub mod sqlite;

use crate::model::{AssessmentRecord, RecordFilter, RecordKey, Student, Subject};

pub trait Repository {
    fn get_student(&self, id: &str) -> anyhow::Result<Option<Student>>;
    /// Every student in admission order, optionally limited to one grade level.
    fn list_students(&self, grade_level: Option<&str>) -> anyhow::Result<Vec<Student>>;
    fn put_student(&mut self, student: &Student) -> anyhow::Result<()>;
    /// Removes the student together with its assessment records.
    fn delete_student(&mut self, id: &str) -> anyhow::Result<bool>;
    fn next_admission_seq(&self) -> anyhow::Result<i64>;
    /// Writes section labels for many students as one unit.
    fn set_sections(&mut self, labels: &[(String, Option<String>)]) -> anyhow::Result<()>;
    /// Inserts `student` and writes `labels` for the rest of its grade level
    /// as one unit.
    fn admit_student(
        &mut self,
        student: &Student,
        labels: &[(String, Option<String>)],
    ) -> anyhow::Result<()>;
    /// [`Repository::delete_student`] plus the label write-back, as one unit.
    fn withdraw_student(
        &mut self,
        id: &str,
        labels: &[(String, Option<String>)],
    ) -> anyhow::Result<bool>;

    fn get_subject(&self, code: &str) -> anyhow::Result<Option<Subject>>;
    fn list_subjects(&self) -> anyhow::Result<Vec<Subject>>;
    fn put_subject(&mut self, subject: &Subject) -> anyhow::Result<()>;

    fn get_record(&self, key: &RecordKey) -> anyhow::Result<Option<AssessmentRecord>>;
    fn list_records(&self, filter: &RecordFilter) -> anyhow::Result<Vec<AssessmentRecord>>;
    /// Last write wins for the record key.
    fn put_record(&mut self, record: &AssessmentRecord) -> anyhow::Result<()>;

    fn get_setting(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
    fn put_setting(&mut self, key: &str, value: &serde_json::Value) -> anyhow::Result<()>;
}
