use crate::engine;
use crate::ipc::error::respond;
use crate::ipc::helpers::{filter_str, required_str, store_ref, store_with_policy};
use crate::ipc::types::{AppState, Request};
use crate::store::Repository;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let grade_level = filter_str(req, "gradeLevel")?;
        let store = store_ref(state)?;
        let students = store.list_students(grade_level.as_deref())?;
        Ok(json!({ "students": students }))
    })
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let name = required_str(req, "name")?;
        let grade_level = required_str(req, "gradeLevel")?;
        let (store, policy) = store_with_policy(state)?;
        let (student, sections) = engine::add_student(store, &policy, &name, &grade_level)?;
        Ok(json!({ "student": student, "sections": sections }))
    })
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let student_id = required_str(req, "studentId")?;
        let (store, policy) = store_with_policy(state)?;
        let (removed, sections) = engine::remove_student(store, &policy, &student_id)?;
        Ok(json!({ "removed": removed, "sections": sections }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
