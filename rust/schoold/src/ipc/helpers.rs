use crate::config;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::model::AssessmentCategory;
use crate::sections::SectionPolicy;
use crate::store::sqlite::SqliteStore;

pub fn store_ref(state: &AppState) -> Result<&SqliteStore, HandlerErr> {
    state.store.as_ref().ok_or_else(HandlerErr::no_workspace)
}

pub fn store_mut(state: &mut AppState) -> Result<&mut SqliteStore, HandlerErr> {
    state.store.as_mut().ok_or_else(HandlerErr::no_workspace)
}

/// Open store together with the section policy in effect for it.
pub fn store_with_policy(
    state: &mut AppState,
) -> Result<(&mut SqliteStore, SectionPolicy), HandlerErr> {
    let defaults = &state.config.sections;
    let store = state.store.as_mut().ok_or_else(HandlerErr::no_workspace)?;
    let policy = config::effective_policy(&*store, defaults)?;
    Ok((store, policy))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, HandlerErr> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim().to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be a string or null"))),
    }
}

/// Roster filter: absent, null, blank or `"ALL"` all mean no filter.
pub fn filter_str(req: &Request, key: &str) -> Result<Option<String>, HandlerErr> {
    Ok(optional_str(req, key)?.filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("ALL")))
}

pub fn number_in(obj: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    obj.get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be a number")))
}

pub fn category_in(obj: &serde_json::Value) -> Result<AssessmentCategory, HandlerErr> {
    let raw = obj
        .get("category")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing category"))?;
    Ok(raw.parse::<AssessmentCategory>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(params: serde_json::Value) -> Request {
        Request {
            id: "1".into(),
            method: "test".into(),
            params,
        }
    }

    #[test]
    fn filter_treats_all_and_blank_as_unfiltered() {
        let r = req(json!({ "a": "ALL", "b": " ", "c": null, "d": " 9 " }));
        assert_eq!(filter_str(&r, "a").expect("a"), None);
        assert_eq!(filter_str(&r, "b").expect("b"), None);
        assert_eq!(filter_str(&r, "c").expect("c"), None);
        assert_eq!(filter_str(&r, "missing").expect("missing"), None);
        assert_eq!(filter_str(&r, "d").expect("d"), Some("9".to_string()));
    }

    #[test]
    fn filter_rejects_non_string() {
        let r = req(json!({ "gradeLevel": 9 }));
        assert_eq!(
            filter_str(&r, "gradeLevel").expect_err("number").code,
            "bad_params"
        );
    }

    #[test]
    fn unknown_category_maps_to_its_own_code() {
        let e = category_in(&json!({ "category": "quiz" })).expect_err("quiz");
        assert_eq!(e.code, "unknown_category");
        assert_eq!(
            category_in(&json!({ "category": "midExam" })).expect("mid"),
            AssessmentCategory::MidExam
        );
    }

    #[test]
    fn missing_workspace_is_reported() {
        let state = AppState::new(crate::config::Config::default());
        assert_eq!(store_ref(&state).err().map(|e| e.code), Some("no_workspace"));
    }
}
