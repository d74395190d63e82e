use std::collections::BTreeMap;

use super::Repository;
use crate::model::{AssessmentRecord, RecordFilter, RecordKey, Student, Subject};

/// In-memory fake used by engine tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    students: Vec<Student>,
    subjects: BTreeMap<String, Subject>,
    records: Vec<AssessmentRecord>,
    settings: BTreeMap<String, serde_json::Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryStore {
    fn get_student(&self, id: &str) -> anyhow::Result<Option<Student>> {
        Ok(self.students.iter().find(|s| s.id == id).cloned())
    }

    fn list_students(&self, grade_level: Option<&str>) -> anyhow::Result<Vec<Student>> {
        let mut out: Vec<Student> = self
            .students
            .iter()
            .filter(|s| grade_level.map(|g| s.grade_level == g).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.admission_seq.cmp(&b.admission_seq).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn put_student(&mut self, student: &Student) -> anyhow::Result<()> {
        match self.students.iter_mut().find(|s| s.id == student.id) {
            Some(existing) => *existing = student.clone(),
            None => self.students.push(student.clone()),
        }
        Ok(())
    }

    fn delete_student(&mut self, id: &str) -> anyhow::Result<bool> {
        let before = self.students.len();
        self.students.retain(|s| s.id != id);
        self.records.retain(|r| r.student_id != id);
        Ok(self.students.len() != before)
    }

    fn next_admission_seq(&self) -> anyhow::Result<i64> {
        Ok(self
            .students
            .iter()
            .map(|s| s.admission_seq)
            .max()
            .map(|m| m + 1)
            .unwrap_or(0))
    }

    fn set_sections(&mut self, labels: &[(String, Option<String>)]) -> anyhow::Result<()> {
        for (id, label) in labels {
            if let Some(s) = self.students.iter_mut().find(|s| s.id == *id) {
                s.section = label.clone();
            }
        }
        Ok(())
    }

    fn admit_student(
        &mut self,
        student: &Student,
        labels: &[(String, Option<String>)],
    ) -> anyhow::Result<()> {
        self.put_student(student)?;
        self.set_sections(labels)
    }

    fn withdraw_student(
        &mut self,
        id: &str,
        labels: &[(String, Option<String>)],
    ) -> anyhow::Result<bool> {
        let removed = self.delete_student(id)?;
        self.set_sections(labels)?;
        Ok(removed)
    }

    fn get_subject(&self, code: &str) -> anyhow::Result<Option<Subject>> {
        Ok(self.subjects.get(code).cloned())
    }

    fn list_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        Ok(self.subjects.values().cloned().collect())
    }

    fn put_subject(&mut self, subject: &Subject) -> anyhow::Result<()> {
        self.subjects.insert(subject.code.clone(), subject.clone());
        Ok(())
    }

    fn get_record(&self, key: &RecordKey) -> anyhow::Result<Option<AssessmentRecord>> {
        Ok(self.records.iter().find(|r| r.key() == *key).cloned())
    }

    fn list_records(&self, filter: &RecordFilter) -> anyhow::Result<Vec<AssessmentRecord>> {
        Ok(self.records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    fn put_record(&mut self, record: &AssessmentRecord) -> anyhow::Result<()> {
        let key = record.key();
        match self.records.iter_mut().find(|r| r.key() == key) {
            Some(existing) => *existing = record.clone(),
            None => self.records.push(record.clone()),
        }
        Ok(())
    }

    fn get_setting(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.settings.get(key).cloned())
    }

    fn put_setting(&mut self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.settings.insert(key.to_string(), value.clone());
        Ok(())
    }
}
