//! HTTP API 모듈 - axum 라우터 및 핸들러
//!
//! ## 엔드포인트
//! - `GET  /`        - 검색 웹 폼 (정적 HTML)
//! - `POST /search`  - 시맨틱 검색
//! - `POST /ingest`  - 문서 수집
//! - `GET  /status`  - 서비스 상태
//! - `GET  /healthz` - 라이브니스 (의존성 확인 없음)
//!
//! 응답 JSON 형태는 기존 서비스와의 호환을 위해 유지됩니다.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Settings;
use crate::error::SearchError;
use crate::service::{DocumentInput, SearchResult, SearchService};

// ============================================================================
// App State
// ============================================================================

/// 공유 애플리케이션 상태
pub struct AppState {
    pub service: SearchService,
    pub settings: Settings,
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// 검색 요청 본문
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// 자연어 질문
    pub question: String,
    /// 쿼리 리라이터 사용 여부 (기본 true)
    #[serde(default = "default_use_gemini")]
    pub use_gemini: bool,
}

fn default_use_gemini() -> bool {
    true
}

/// 검색 응답
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// 재구성된 답변 (리라이터 미설정/실패 시 생략)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reformulated_response: Option<String>,
}

/// 수집 요청 본문
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub documents: Vec<DocumentInput>,
}

/// 수집 응답
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    pub documents_ingested: usize,
}

/// 상태 응답
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub total_documents: usize,
    pub embedding_model: String,
}

/// 에러 응답
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Error Mapping
// ============================================================================

/// 핸들러 에러 (SearchError -> HTTP 상태 매핑)
pub struct ApiError(SearchError);

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            SearchError::InvalidQuery(msg) | SearchError::InvalidDocument(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            SearchError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            SearchError::StoreWrite(_) | SearchError::StoreQuery(_) => {
                tracing::error!("Store failure: {}", self.0);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Vector store unavailable".to_string(),
                )
            }
            SearchError::Embedding(msg) => {
                tracing::error!("Embedding failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            SearchError::Rewriter(msg) | SearchError::Config(msg) => {
                tracing::error!("Unexpected failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - 검색 웹 폼
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// POST /search - 시맨틱 검색
async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let (results, reformulated_response) = state
        .service
        .search_with_reformulation(&request.question, request.use_gemini)
        .await?;

    Ok(Json(SearchResponse {
        results,
        reformulated_response,
    }))
}

/// POST /ingest - 문서 수집
async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    if request.documents.is_empty() {
        return Err(SearchError::InvalidDocument("no documents provided".to_string()).into());
    }

    let report = state.service.ingest_documents(request.documents).await?;

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        documents_ingested: report.documents_ingested,
    }))
}

/// GET /status - 서비스 상태
async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let total_documents = state.service.count().await?;

    Ok(Json(StatusResponse {
        status: "healthy".to_string(),
        total_documents,
        embedding_model: state.settings.embedding_model_name.clone(),
    }))
}

/// GET /healthz - 라이브니스만 확인
async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// Router / Server
// ============================================================================

/// axum 라우터 생성
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/search", post(search))
        .route("/ingest", post(ingest))
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

/// HTTP 서버 실행
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let router = create_router(state);

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

// ============================================================================
// Web Form
// ============================================================================

/// 검색 웹 폼 (템플릿 엔진 없이 정적 HTML)
const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Semantic Document Search</title>
<style>
  body { font-family: sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }
  input[type=text] { width: 70%; padding: 0.5rem; }
  button { padding: 0.5rem 1rem; }
  .result { border: 1px solid #ddd; border-radius: 4px; padding: 0.75rem; margin: 0.75rem 0; }
  .score { color: #666; font-size: 0.85rem; }
  #error { color: #b00; }
</style>
</head>
<body>
<h1>Semantic Document Search</h1>
<form id="search-form">
  <input type="text" id="question" placeholder="Ask a question..." required>
  <button type="submit">Search</button>
</form>
<p id="error"></p>
<div id="results"></div>
<script>
document.getElementById('search-form').addEventListener('submit', async (event) => {
  event.preventDefault();
  const question = document.getElementById('question').value;
  const errorEl = document.getElementById('error');
  const resultsEl = document.getElementById('results');
  errorEl.textContent = '';
  resultsEl.innerHTML = '';
  try {
    const response = await fetch('/search', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ question }),
    });
    const data = await response.json();
    if (!response.ok) {
      errorEl.textContent = data.error || 'Search failed';
      return;
    }
    if (data.results.length === 0) {
      resultsEl.textContent = 'No results found.';
      return;
    }
    for (const result of data.results) {
      const div = document.createElement('div');
      div.className = 'result';
      const score = document.createElement('p');
      score.className = 'score';
      score.textContent = 'Result ' + result.id + ' | score ' + result.score.toFixed(4);
      const text = document.createElement('p');
      text.textContent = result.texte_fragment;
      div.appendChild(score);
      div.appendChild(text);
      resultsEl.appendChild(div);
    }
  } catch (err) {
    errorEl.textContent = String(err);
  }
});
</script>
</body>
</html>
"#;

// ============================================================================
// Tests
// ============================================================================
