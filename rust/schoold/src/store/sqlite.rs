use anyhow::Context;
use chrono::Utc;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use super::Repository;
use crate::model::{AssessmentCategory, AssessmentRecord, RecordFilter, RecordKey, Student, Subject};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        grade_level: r.get(2)?,
        section: r.get(3)?,
        admission_seq: r.get(4)?,
        admitted_at: r.get(5)?,
    })
}

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<AssessmentRecord> {
    let category: String = r.get(2)?;
    let category: AssessmentCategory = category
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(AssessmentRecord {
        student_id: r.get(0)?,
        subject: r.get(1)?,
        category,
        term: r.get(3)?,
        raw_score: r.get(4)?,
        max_score: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

const STUDENT_COLUMNS: &str = "id, name, grade_level, section, admission_seq, admitted_at";
const RECORD_COLUMNS: &str =
    "student_id, subject, category, term, raw_score, max_score, updated_at";

fn upsert_student(conn: &Connection, student: &Student) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO students(id, name, grade_level, section, admission_seq, admitted_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           grade_level = excluded.grade_level,
           section = excluded.section,
           admission_seq = excluded.admission_seq,
           admitted_at = excluded.admitted_at,
           updated_at = excluded.updated_at",
        (
            &student.id,
            &student.name,
            &student.grade_level,
            &student.section,
            student.admission_seq,
            &student.admitted_at,
            Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

fn delete_student_rows(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    // Children first; there is no ON DELETE CASCADE.
    conn.execute("DELETE FROM assessment_records WHERE student_id = ?", [id])?;
    let n = conn.execute("DELETE FROM students WHERE id = ?", [id])?;
    Ok(n > 0)
}

fn write_sections(conn: &Connection, labels: &[(String, Option<String>)]) -> anyhow::Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare(
        "UPDATE students SET section = ?, updated_at = ?
         WHERE id = ? AND section IS NOT ?",
    )?;
    for (id, label) in labels {
        stmt.execute((label, &now, id, label))?;
    }
    Ok(())
}

impl Repository for SqliteStore {
    fn get_student(&self, id: &str) -> anyhow::Result<Option<Student>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, [id], student_from_row)
            .optional()?)
    }

    fn list_students(&self, grade_level: Option<&str>) -> anyhow::Result<Vec<Student>> {
        let students = match grade_level {
            Some(g) => {
                let sql = format!(
                    "SELECT {STUDENT_COLUMNS} FROM students
                     WHERE grade_level = ?
                     ORDER BY admission_seq, id"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([g], student_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {STUDENT_COLUMNS} FROM students ORDER BY admission_seq, id"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], student_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(students)
    }

    fn put_student(&mut self, student: &Student) -> anyhow::Result<()> {
        upsert_student(&self.conn, student)
    }

    fn delete_student(&mut self, id: &str) -> anyhow::Result<bool> {
        let tx = self.conn.transaction()?;
        let removed = delete_student_rows(&tx, id)?;
        tx.commit()?;
        Ok(removed)
    }

    fn next_admission_seq(&self) -> anyhow::Result<i64> {
        let max: Option<i64> =
            self.conn
                .query_row("SELECT MAX(admission_seq) FROM students", [], |r| r.get(0))?;
        Ok(max.map(|m| m + 1).unwrap_or(0))
    }

    fn set_sections(&mut self, labels: &[(String, Option<String>)]) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        write_sections(&tx, labels)?;
        tx.commit()?;
        Ok(())
    }

    fn admit_student(
        &mut self,
        student: &Student,
        labels: &[(String, Option<String>)],
    ) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        upsert_student(&tx, student)?;
        write_sections(&tx, labels)?;
        tx.commit()?;
        Ok(())
    }

    fn withdraw_student(
        &mut self,
        id: &str,
        labels: &[(String, Option<String>)],
    ) -> anyhow::Result<bool> {
        let tx = self.conn.transaction()?;
        let removed = delete_student_rows(&tx, id)?;
        write_sections(&tx, labels)?;
        tx.commit()?;
        Ok(removed)
    }

    fn get_subject(&self, code: &str) -> anyhow::Result<Option<Subject>> {
        Ok(self
            .conn
            .query_row(
                "SELECT code, name FROM subjects WHERE code = ?",
                [code],
                |r| {
                    Ok(Subject {
                        code: r.get(0)?,
                        name: r.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn list_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        let mut stmt = self.conn.prepare("SELECT code, name FROM subjects ORDER BY code")?;
        let rows = stmt.query_map([], |r| {
            Ok(Subject {
                code: r.get(0)?,
                name: r.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn put_subject(&mut self, subject: &Subject) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO subjects(code, name) VALUES(?, ?)
             ON CONFLICT(code) DO UPDATE SET name = excluded.name",
            (&subject.code, &subject.name),
        )?;
        Ok(())
    }

    fn get_record(&self, key: &RecordKey) -> anyhow::Result<Option<AssessmentRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM assessment_records
             WHERE student_id = ? AND subject = ? AND category = ? AND term = ?"
        );
        let row = self
            .conn
            .query_row(
                &sql,
                (
                    &key.student_id,
                    &key.subject,
                    key.category.as_str(),
                    &key.term,
                ),
                record_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn list_records(&self, filter: &RecordFilter) -> anyhow::Result<Vec<AssessmentRecord>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(v) = &filter.student_id {
            clauses.push("student_id = ?");
            bind_values.push(Value::Text(v.clone()));
        }
        if let Some(v) = &filter.subject {
            clauses.push("subject = ?");
            bind_values.push(Value::Text(v.clone()));
        }
        if let Some(v) = &filter.term {
            clauses.push("term = ?");
            bind_values.push(Value::Text(v.clone()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM assessment_records {where_sql}
             ORDER BY student_id, subject, term, category"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind_values), record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn put_record(&mut self, record: &AssessmentRecord) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO assessment_records(student_id, subject, category, term, raw_score, max_score, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, subject, category, term) DO UPDATE SET
               raw_score = excluded.raw_score,
               max_score = excluded.max_score,
               updated_at = excluded.updated_at",
            (
                &record.student_id,
                &record.subject,
                record.category.as_str(),
                &record.term,
                record.raw_score,
                record.max_score,
                &record.updated_at,
            ),
        )?;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?",
                [key],
                |r| r.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).with_context(|| format!("setting {key} is not JSON")))
            .transpose()
    }

    fn put_setting(&mut self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO settings(key, value_json) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            (key, serde_json::to_string(value)?),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::path::Path;

    fn store() -> SqliteStore {
        SqliteStore::new(db::open_db(Path::new(":memory:")).expect("open"))
    }

    fn student(id: &str, seq: i64) -> Student {
        Student {
            id: id.into(),
            name: format!("Student {id}"),
            grade_level: "9".into(),
            section: None,
            admission_seq: seq,
            admitted_at: None,
        }
    }

    fn record(student_id: &str, raw: f64) -> AssessmentRecord {
        AssessmentRecord {
            student_id: student_id.into(),
            subject: "MATH".into(),
            category: AssessmentCategory::MidExam,
            term: "T1".into(),
            raw_score: raw,
            max_score: 100.0,
            updated_at: None,
        }
    }

    #[test]
    fn record_upsert_keeps_one_row_per_key() {
        let mut s = store();
        s.put_subject(&Subject {
            code: "MATH".into(),
            name: "Mathematics".into(),
        })
        .expect("subject");
        s.put_student(&student("a", 0)).expect("student");
        s.put_record(&record("a", 40.0)).expect("first");
        s.put_record(&record("a", 70.0)).expect("second");

        let all = s.list_records(&RecordFilter::default()).expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].raw_score, 70.0);
        assert_eq!(all[0].category, AssessmentCategory::MidExam);
        let got = s.get_record(&all[0].key()).expect("get");
        assert_eq!(got.map(|r| r.raw_score), Some(70.0));
    }

    #[test]
    fn delete_student_removes_records_first() {
        let mut s = store();
        s.put_subject(&Subject {
            code: "MATH".into(),
            name: "Mathematics".into(),
        })
        .expect("subject");
        s.put_student(&student("a", 0)).expect("student");
        s.put_record(&record("a", 40.0)).expect("record");
        assert!(s.delete_student("a").expect("delete"));
        assert!(!s.delete_student("a").expect("delete again"));
        assert!(s.list_records(&RecordFilter::default()).expect("list").is_empty());
    }

    #[test]
    fn students_list_in_admission_order_and_sections_write_back() {
        let mut s = store();
        s.put_student(&student("late", 5)).expect("late");
        s.put_student(&student("early", 1)).expect("early");
        assert_eq!(s.next_admission_seq().expect("seq"), 6);

        s.set_sections(&[
            ("early".to_string(), Some("A".to_string())),
            ("late".to_string(), Some("B".to_string())),
        ])
        .expect("sections");
        let listed = s.list_students(Some("9")).expect("list");
        let got: Vec<(&str, Option<&str>)> = listed
            .iter()
            .map(|st| (st.id.as_str(), st.section.as_deref()))
            .collect();
        assert_eq!(got, vec![("early", Some("A")), ("late", Some("B"))]);
        assert!(s.list_students(Some("10")).expect("list").is_empty());
    }

    #[test]
    fn admit_and_withdraw_write_labels_with_the_roster_change() {
        let mut s = store();
        s.put_student(&student("a", 0)).expect("a");
        let mut b = student("b", 1);
        b.section = Some("B".into());
        s.admit_student(&b, &[("a".to_string(), Some("A".to_string()))])
            .expect("admit");
        let got: Vec<Option<String>> = s
            .list_students(None)
            .expect("list")
            .into_iter()
            .map(|st| st.section)
            .collect();
        assert_eq!(got, vec![Some("A".into()), Some("B".into())]);

        assert!(s
            .withdraw_student("a", &[("b".to_string(), Some("A".to_string()))])
            .expect("withdraw"));
        let left = s.list_students(None).expect("list");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].section.as_deref(), Some("A"));
    }

    #[test]
    fn settings_roundtrip_json() {
        let mut s = store();
        assert_eq!(s.get_setting("sections.capacity").expect("get"), None);
        s.put_setting("sections.capacity", &serde_json::json!(25))
            .expect("put");
        assert_eq!(
            s.get_setting("sections.capacity").expect("get"),
            Some(serde_json::json!(25))
        );
    }
}
