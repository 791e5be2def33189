//! Generic CRUD handlers shared by every table-backed resource.
//!
//! Each resource is mounted at `/{table}` and `/{table}/{id}`. The module
//! name written to the audit log travels with the router as an extension.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::app_state::AppState;
use crate::error::AgentError;
use crate::filters::{ListFilter, Page, Pagination};
use crate::models::Model;
use crate::service::Service;

/// Header carrying the id of the acting user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Module name recorded in audit entries for a resource.
#[derive(Debug, Clone, Copy)]
pub struct AuditModule(pub &'static str);

/// Query parameters of `DELETE /{table}/{id}`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeleteParams {
    /// Remove the row instead of flagging it.
    #[serde(default)]
    pub permanent: bool,
}

/// Full CRUD routes for `M`.
pub fn routes<M: Model>(module: &'static str) -> Router<AppState> {
    let collection = format!("/{}", M::TABLE);
    let item = format!("/{}/{{id}}", M::TABLE);
    Router::new()
        .route(&collection, get(list::<M>).post(create::<M>))
        .route(
            &item,
            get(retrieve::<M>).patch(update::<M>).delete(remove::<M>),
        )
        .layer(Extension(AuditModule(module)))
}

/// List and detail routes only, for tables written by the agent itself.
pub fn read_only_routes<M: Model>(module: &'static str) -> Router<AppState> {
    let collection = format!("/{}", M::TABLE);
    let item = format!("/{}/{{id}}", M::TABLE);
    Router::new()
        .route(&collection, get(list::<M>))
        .route(&item, get(retrieve::<M>))
        .layer(Extension(AuditModule(module)))
}

fn service<M: Model>(state: &AppState, module: AuditModule) -> Service<M> {
    Service::new(state.db.pool().clone(), module.0)
}

/// `GET /{table}` — filtered, ordered, paginated list of live rows.
async fn list<M: Model>(
    State(state): State<AppState>,
    Extension(module): Extension<AuditModule>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<M>>, AgentError> {
    let pagination = pagination(&params)?;
    let filter = ListFilter::<M>::from_params(&params)?;
    let page = service::<M>(&state, module)
        .paginated_list(&filter, pagination)
        .await?;
    Ok(Json(page))
}

/// `POST /{table}` — create a row.
async fn create<M: Model>(
    State(state): State<AppState>,
    Extension(module): Extension<AuditModule>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AgentError> {
    let user_id = acting_user(&headers)?;
    let record = into_record(body)?;
    let created = service::<M>(&state, module).add(&record, user_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /{table}/{id}` — one row.
async fn retrieve<M: Model>(
    State(state): State<AppState>,
    Extension(module): Extension<AuditModule>,
    Path(id): Path<i64>,
) -> Result<Json<M>, AgentError> {
    let obj = service::<M>(&state, module).get_obj_or_404(id).await?;
    Ok(Json(obj))
}

/// `PATCH /{table}/{id}` — partial update.
async fn update<M: Model>(
    State(state): State<AppState>,
    Extension(module): Extension<AuditModule>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<M>, AgentError> {
    let user_id = acting_user(&headers)?;
    let record = into_record(body)?;
    let updated = service::<M>(&state, module)
        .update(&record, id, user_id)
        .await?;
    Ok(Json(updated))
}

/// `DELETE /{table}/{id}` — soft delete, or hard delete with `?permanent=true`.
async fn remove<M: Model>(
    State(state): State<AppState>,
    Extension(module): Extension<AuditModule>,
    Path(id): Path<i64>,
    Query(params): Query<DeleteParams>,
    headers: HeaderMap,
) -> Result<StatusCode, AgentError> {
    let user_id = acting_user(&headers)?;
    let service = service::<M>(&state, module);
    if params.permanent {
        service.delete(id, user_id).await?;
    } else {
        service.soft_delete(id, user_id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Reads the optional acting user id.
fn acting_user(headers: &HeaderMap) -> Result<Option<i64>, AgentError> {
    let Some(raw) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| AgentError::InvalidRequest(format!("{USER_ID_HEADER} must be an integer")))
}

fn pagination(params: &HashMap<String, String>) -> Result<Pagination, AgentError> {
    let read = |key: &str, default: u32| -> Result<u32, AgentError> {
        params.get(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|_| AgentError::InvalidRequest(format!("{key} must be a positive integer")))
        })
    };
    let defaults = Pagination::default();
    Ok(Pagination::new(
        read("page", defaults.page)?,
        read("size", defaults.size)?,
    ))
}

fn into_record(body: Value) -> Result<Map<String, Value>, AgentError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AgentError::InvalidRequest(
            "request body must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;

    #[test]
    fn acting_user_is_optional() {
        assert!(matches!(acting_user(&HeaderMap::new()), Ok(None)));

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("12"));
        assert!(matches!(acting_user(&headers), Ok(Some(12))));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("admin"));
        assert!(matches!(
            acting_user(&headers),
            Err(AgentError::InvalidRequest(_))
        ));
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        let Ok(p) = pagination(&HashMap::new()) else {
            panic!("defaults");
        };
        assert_eq!(p, Pagination::default());

        let params = HashMap::from([
            ("page".to_string(), "0".to_string()),
            ("size".to_string(), "1000".to_string()),
        ]);
        assert_eq!(pagination(&params).ok(), Some(Pagination { page: 1, size: 100 }));

        let params = HashMap::from([("size".to_string(), "-1".to_string())]);
        assert!(pagination(&params).is_err());
    }

    #[test]
    fn body_must_be_an_object() {
        assert!(into_record(json!({ "a": 1 })).is_ok());
        assert!(into_record(json!([1, 2])).is_err());
    }
}
