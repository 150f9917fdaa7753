//! REST API handlers
//!
//! Routes:
//!
//! | Method | Path | Use case |
//! |---|---|---|
//! | GET | `/api/health` | liveness |
//! | GET | `/api/movies` | filtered, paginated listing |
//! | POST | `/api/movies` | create |
//! | GET / PUT / DELETE | `/api/movies/{id}` | read, update, delete |
//! | GET | `/api/producers/intervals` | min/max producer intervals |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCategory, Result};
use crate::models::{MovieFilter, MovieInput, PageRequest};
use crate::service::MovieService;

use super::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

/// Error body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
}

/// Query string of the listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub year: Option<i32>,
    pub winner: Option<bool>,
    pub title: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl ListQuery {
    fn into_parts(self) -> Result<(MovieFilter, PageRequest)> {
        let defaults = PageRequest::default();
        let page = PageRequest::new(
            self.page.unwrap_or(defaults.number),
            self.size.unwrap_or(defaults.size),
        )?;

        let filter = MovieFilter {
            year: self.year,
            winner: self.winner,
            title: self.title.filter(|t| !t.trim().is_empty()),
        };

        Ok((filter, page))
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Consistency => StatusCode::CONFLICT,
        ErrorCategory::Storage | ErrorCategory::Config => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(self.category());
        if status.is_server_error() {
            tracing::error!(error = %self, category = self.category().as_str(), "Request failed");
        } else {
            tracing::debug!(error = %self, category = self.category().as_str(), "Request rejected");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// Run a blocking use case on the blocking thread pool
async fn run_blocking<T, F>(state: &AppState, task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&MovieService) -> Result<T> + Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || task(&service))
        .await
        .map_err(|e| Error::storage_with_source("Blocking task failed", e))?
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/movies", get(list_movies).post(create_movie))
        .route(
            "/api/movies/{id}",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
        .route("/api/producers/intervals", get(get_intervals))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

async fn list_movies(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let (filter, page) = query.into_parts()?;
    let paged = run_blocking(&state, move |svc| svc.list_movies(&filter, page)).await?;
    Ok(Json(ApiResponse::success(paged)))
}

async fn create_movie(
    State(state): State<AppState>,
    Json(input): Json<MovieInput>,
) -> Result<impl IntoResponse> {
    let record = run_blocking(&state, move |svc| svc.create_movie(input)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let record = run_blocking(&state, move |svc| svc.get_movie(id)).await?;
    Ok(Json(ApiResponse::success(record)))
}

async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<MovieInput>,
) -> Result<impl IntoResponse> {
    let record = run_blocking(&state, move |svc| svc.update_movie(id, input)).await?;
    Ok(Json(ApiResponse::success(record)))
}

async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    run_blocking(&state, move |svc| svc.delete_movie(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bare `{ "min": [...], "max": [...] }` body
async fn get_intervals(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let report = run_blocking(&state, |svc| svc.get_intervals()).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorCategory::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCategory::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCategory::Consistency), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorCategory::Storage),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_value(ErrorResponse::new("Not found: movie 9")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Not found: movie 9");
    }

    #[test]
    fn test_list_query_defaults() {
        let (filter, page) = ListQuery::default().into_parts().unwrap();
        assert_eq!(filter, MovieFilter::default());
        assert_eq!(page, PageRequest::default());
    }

    #[test]
    fn test_list_query_rejects_oversized_page() {
        let query = ListQuery {
            size: Some(500),
            ..Default::default()
        };
        assert!(matches!(query.into_parts(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_list_query_drops_blank_title() {
        let query = ListQuery {
            title: Some("  ".to_string()),
            winner: Some(true),
            ..Default::default()
        };
        let (filter, _) = query.into_parts().unwrap();
        assert_eq!(filter.title, None);
        assert_eq!(filter.winner, Some(true));
    }
}
