use crate::config;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::store_with_policy;
use crate::ipc::types::{AppState, Request};
use crate::sections::SectionPolicy;
use serde_json::json;

fn policy_json(policy: &SectionPolicy) -> serde_json::Value {
    json!({
        "sectionCapacity": policy.capacity,
        "roomPool": policy.room_pool,
        "maxSections": policy.max_sections,
    })
}

fn positive(v: &serde_json::Value, key: &str) -> Result<usize, HandlerErr> {
    v.as_u64()
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be a positive integer")))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let (_, policy) = store_with_policy(state)?;
        Ok(policy_json(&policy))
    })
}

/// Changes apply to the next recompute; stored labels are not touched here.
fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let (store, mut policy) = store_with_policy(state)?;
        let Some(obj) = req.params.as_object() else {
            return Err(HandlerErr::bad_params("params must be an object"));
        };

        if let Some(v) = obj.get("sectionCapacity") {
            policy.capacity = positive(v, "sectionCapacity")?;
        }
        if let Some(v) = obj.get("roomPool") {
            let Some(items) = v.as_array() else {
                return Err(HandlerErr::bad_params("roomPool must be an array of strings"));
            };
            let mut rooms = Vec::with_capacity(items.len());
            for item in items {
                let Some(room) = item.as_str() else {
                    return Err(HandlerErr::bad_params("roomPool must be an array of strings"));
                };
                let room = room.trim();
                if !room.is_empty() {
                    rooms.push(room.to_string());
                }
            }
            policy.room_pool = rooms;
        }
        if let Some(v) = obj.get("maxSections") {
            policy.max_sections = if v.is_null() {
                None
            } else {
                Some(positive(v, "maxSections")?)
            };
        }

        config::store_policy(store, &policy)?;
        Ok(policy_json(&policy))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
