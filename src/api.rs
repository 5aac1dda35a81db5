use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::error;

use crate::query::{self, MonthlySummaryParams, PastDueParams, QueryError};

/// Shared handle to the store
///
/// All endpoints are read-only and the queries are short, so one
/// mutex-guarded connection is enough.
#[derive(Clone)]
pub struct AppState {
    conn: Arc<Mutex<Connection>>,
}

impl AppState {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, QueryError>) -> Result<T, QueryError> {
        let conn = self.conn.lock().map_err(|_| QueryError::Unavailable)?;
        f(&conn)
    }
}

/// Builds the read-only query router over an open store connection
pub fn router(conn: Connection) -> Router {
    let state = AppState {
        conn: Arc::new(Mutex::new(conn)),
    };

    Router::new()
        .route("/health", get(health))
        .route("/invoices/past-due", get(past_due))
        .route("/invoices/summary/month", get(monthly_summary))
        .route("/invoices/{invoice_number}", get(get_invoice))
        .route("/customers", get(list_customers))
        .route("/customers/contact", get(customer_contact))
        .route("/customers/{customer_id}", get(get_customer))
        .with_state(state)
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            QueryError::InvalidParameter { param, reason } => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": { "param": param, "reason": reason } }),
            ),
            QueryError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": { "detail": format!("{what} not found") } }),
            ),
            QueryError::Unavailable | QueryError::Store(_) => {
                error!(err = %self, "query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": { "detail": "internal error" } }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn past_due(
    State(state): State<AppState>,
    Query(params): Query<PastDueParams>,
) -> Result<Json<query::PastDueResponse>, QueryError> {
    state.with_conn(|conn| query::past_due(conn, &params)).map(Json)
}

async fn monthly_summary(
    State(state): State<AppState>,
    Query(params): Query<MonthlySummaryParams>,
) -> Result<Json<query::MonthlySummary>, QueryError> {
    state
        .with_conn(|conn| query::monthly_summary(conn, &params))
        .map(Json)
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_number): Path<String>,
) -> Result<Json<query::InvoiceDetail>, QueryError> {
    state
        .with_conn(|conn| query::invoice_by_number(conn, &invoice_number))
        .map(Json)
}

async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<query::CustomerOut>>, QueryError> {
    state.with_conn(query::list_customers).map(Json)
}

async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<query::CustomerOut>, QueryError> {
    // parsed by hand so a non-numeric id gets the structured 400 payload
    let id = customer_id
        .parse::<i64>()
        .map_err(|_| QueryError::InvalidParameter {
            param: "customer_id",
            reason: format!("must be an integer, got {customer_id:?}"),
        })?;
    state
        .with_conn(|conn| query::customer_by_id(conn, id))
        .map(Json)
}

#[derive(Debug, Deserialize)]
struct ContactParams {
    name: Option<String>,
}

async fn customer_contact(
    State(state): State<AppState>,
    Query(params): Query<ContactParams>,
) -> Result<Json<query::CustomerContact>, QueryError> {
    let name = params.name.ok_or(QueryError::InvalidParameter {
        param: "name",
        reason: "required".to_string(),
    })?;
    state
        .with_conn(|conn| query::customer_contact(conn, &name))
        .map(Json)
}

#[cfg(test)]
mod tests {
    use crate::store;

    use super::*;

    fn state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        store::init_schema(&conn).unwrap();
        AppState {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    #[tokio::test]
    async fn malformed_past_due_params_return_structured_400() {
        let params = PastDueParams {
            as_of: Some("notadate".to_string()),
            ..PastDueParams::default()
        };
        let response = past_due(State(state()), Query(params))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let params = PastDueParams {
            limit: Some("abc".to_string()),
            ..PastDueParams::default()
        };
        let response = past_due(State(state()), Query(params))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_numeric_customer_id_returns_structured_400() {
        let result = get_customer(State(state()), Path("abc".to_string())).await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidParameter { param: "customer_id", .. },
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_customer_id_returns_404() {
        let result = get_customer(State(state()), Path("42".to_string())).await;
        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::NOT_FOUND,
        );
    }

    #[test]
    fn query_errors_map_to_http_statuses() {
        let bad_request = QueryError::InvalidParameter {
            param: "offset",
            reason: "must not be negative".to_string(),
        };
        assert_eq!(bad_request.into_response().status(), StatusCode::BAD_REQUEST);

        let not_found = QueryError::NotFound("customer");
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let fault = QueryError::Unavailable;
        assert_eq!(
            fault.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }
}
