//! Uniform JSON envelope wrapped around every API response.
//!
//! Success: `{"isSuccess": true, "data": {"<label>": payload}}`
//! Failure: `{"isSuccess": false, "errorText": "..."}`

use std::collections::BTreeMap;

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub is_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<&'static str, T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

pub fn success<T: Serialize>(label: &'static str, payload: T) -> Json<Envelope<T>> {
    Json(Envelope {
        is_success: true,
        data: Some(BTreeMap::from([(label, payload)])),
        error_text: None,
    })
}

pub fn failure(text: impl Into<String>) -> Json<Envelope<()>> {
    Json(Envelope {
        is_success: false,
        data: None,
        error_text: Some(text.into()),
    })
}
