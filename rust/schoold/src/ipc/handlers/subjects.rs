use crate::engine;
use crate::ipc::error::respond;
use crate::ipc::helpers::{required_str, store_mut, store_ref};
use crate::ipc::types::{AppState, Request};
use crate::store::Repository;
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let store = store_ref(state)?;
        Ok(json!({ "subjects": store.list_subjects()? }))
    })
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let code = required_str(req, "code")?;
        let name = required_str(req, "name")?;
        let store = store_mut(state)?;
        let subject = engine::create_subject(store, &code, &name)?;
        Ok(json!({ "subject": subject }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        _ => None,
    }
}
