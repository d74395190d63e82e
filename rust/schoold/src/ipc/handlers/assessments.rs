use crate::engine::{self, AssessmentInput};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{category_in, filter_str, number_in, store_mut, store_ref};
use crate::ipc::types::{AppState, Request};
use crate::model::RecordFilter;
use serde_json::json;

const BULK_SAVE_MAX_RECORDS: usize = 5000;

fn str_in(obj: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

fn parse_input(obj: &serde_json::Value) -> Result<AssessmentInput, HandlerErr> {
    Ok(AssessmentInput {
        student_id: str_in(obj, "studentId")?,
        subject: str_in(obj, "subject")?,
        category: category_in(obj)?,
        term: str_in(obj, "term")?,
        raw_score: number_in(obj, "rawScore")?,
        max_score: number_in(obj, "maxScore")?,
    })
}

fn handle_assessments_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let input = parse_input(&req.params)?;
        let store = store_mut(state)?;
        let saved = engine::save_assessment(store, input)?;
        Ok(json!({ "record": saved.record, "superseded": saved.superseded }))
    })
}

/// Saves each record independently; a rejected record is reported and does
/// not stop the rest.
fn handle_assessments_bulk_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let Some(items) = req.params.get("records").and_then(|v| v.as_array()) else {
            return Err(HandlerErr::bad_params("missing records array"));
        };
        if items.len() > BULK_SAVE_MAX_RECORDS {
            return Err(HandlerErr {
                code: "bad_params",
                message: format!("at most {BULK_SAVE_MAX_RECORDS} records per call"),
                details: Some(json!({ "count": items.len() })),
            });
        }
        let store = store_mut(state)?;

        let mut saved = 0usize;
        let mut errors: Vec<serde_json::Value> = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let outcome = parse_input(item)
                .and_then(|input| engine::save_assessment(store, input).map_err(HandlerErr::from));
            match outcome {
                Ok(_) => saved += 1,
                Err(e) => {
                    let mut entry = e.to_json();
                    entry["index"] = json!(i);
                    errors.push(entry);
                }
            }
        }

        Ok(json!({
            "saved": saved,
            "rejected": errors.len(),
            "errors": errors,
        }))
    })
}

fn handle_assessments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, || {
        let filter = RecordFilter {
            student_id: filter_str(req, "studentId")?,
            subject: filter_str(req, "subject")?,
            term: filter_str(req, "term")?,
        };
        let store = store_ref(state)?;
        let records = engine::list_assessments(store, &filter)?;
        Ok(json!({ "records": records }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.save" => Some(handle_assessments_save(state, req)),
        "assessments.bulkSave" => Some(handle_assessments_bulk_save(state, req)),
        "assessments.list" => Some(handle_assessments_list(state, req)),
        _ => None,
    }
}
