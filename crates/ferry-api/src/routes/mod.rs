//! Route modules, one per resource.

pub mod actors;
pub mod health;
pub mod inbox;
pub mod notes;
pub mod relay;
pub mod well_known;

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use ferry_common::FerryError;
use serde::Serialize;

/// JSON body served as `application/activity+json`.
pub struct ActivityJson<T>(pub T);

impl<T: Serialize> IntoResponse for ActivityJson<T> {
    fn into_response(self) -> Response {
        typed_json(&self.0, ferry_pub::types::ACTIVITY_JSON)
    }
}

/// Serialize `value` with an explicit content type.
pub(crate) fn typed_json<T: Serialize>(value: &T, content_type: &'static str) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => {
            ([(header::CONTENT_TYPE, HeaderValue::from_static(content_type))], body).into_response()
        }
        Err(e) => FerryError::Internal(e.into()).into_response(),
    }
}

/// `?page` selects the page document instead of the collection.
#[derive(Debug, serde::Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn paged(&self) -> bool {
        self.page.is_some()
    }
}
