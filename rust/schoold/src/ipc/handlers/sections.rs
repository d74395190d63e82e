use crate::engine;
use crate::ipc::error::respond;
use crate::ipc::helpers::{filter_str, store_with_policy};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_sections_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let grade_level = filter_str(req, "gradeLevel")?;
        let (store, policy) = store_with_policy(state)?;
        let (sections, unassigned) = engine::list_sections(store, &policy, grade_level.as_deref())?;
        Ok(json!({
            "capacity": policy.capacity,
            "sections": sections,
            "unassigned": unassigned,
        }))
    })
}

fn handle_sections_recompute(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let grade_level = filter_str(req, "gradeLevel")?;
        let (store, policy) = store_with_policy(state)?;
        let sections = engine::recompute_sections(store, &policy, grade_level.as_deref())?;
        Ok(json!({ "sections": sections }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sections.list" => Some(handle_sections_list(state, req)),
        "sections.recompute" => Some(handle_sections_recompute(state, req)),
        _ => None,
    }
}
