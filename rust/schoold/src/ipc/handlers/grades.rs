use crate::engine::{self, GradeQuery};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{filter_str, required_str, store_ref};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parse_query(req: &Request) -> Result<GradeQuery, HandlerErr> {
    Ok(GradeQuery {
        subject: required_str(req, "subject")?,
        term: required_str(req, "term")?,
        grade_level: filter_str(req, "gradeLevel")?,
        section: filter_str(req, "section")?,
    })
}

fn handle_grades_composite(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let query = parse_query(req)?;
        let store = store_ref(state)?;
        let grades = engine::composite_grades(store, &query)?;
        Ok(json!({ "grades": grades }))
    })
}

fn handle_grades_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let query = parse_query(req)?;
        let store = store_ref(state)?;
        let statistics = engine::class_statistics(store, &query)?;
        Ok(json!({ "statistics": statistics }))
    })
}

fn handle_grades_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let student_id = required_str(req, "studentId")?;
        let term = required_str(req, "term")?;
        let store = store_ref(state)?;
        let grades = engine::student_grades(store, &student_id, &term)?;
        Ok(json!({ "grades": grades }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.composite" => Some(handle_grades_composite(state, req)),
        "grades.stats" => Some(handle_grades_stats(state, req)),
        "grades.student" => Some(handle_grades_student(state, req)),
        _ => None,
    }
}
