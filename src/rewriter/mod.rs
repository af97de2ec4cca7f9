//! 쿼리 리라이터 모듈 - Gemini API 기반 질의 개선 (선택 기능)
//!
//! 사용자 질문을 검색 친화적으로 재작성하고, 검색 결과 프래그먼트를
//! 읽기 좋은 마크다운 답변으로 재구성합니다.
//!
//! API 키가 없으면 패스스루(`NoopRewriter`)가 선택되며, 리라이터 실패는
//! 항상 비치명적입니다 - 검색은 원본 질문으로 계속 동작해야 합니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{Result, SearchError};

/// Gemini generateContent API 엔드포인트
/// source: https://ai.google.dev/gemini-api/docs
const GEMINI_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

/// 질의 재작성 시스템 프롬프트 (제빵/제과 원료 도메인)
const ENHANCE_PROMPT: &str = "\
You are a specialized query optimizer for bakery and pastry ingredient formulation systems.

Take the user's natural language question and rewrite it to be more suitable for semantic \
search over technical bakery documentation. The rewritten query should use precise technical \
terminology (enzymes, improvers, ppm dosages), expand abbreviations, mention dosage units when \
relevant, and stay concise while keeping the user's intent.

Return ONLY the rewritten query. Do not include explanations or additional text.";

/// 응답 재구성 시스템 프롬프트
const REFORMULATE_PROMPT: &str = "\
You are a professional technical documentation formatter specializing in bakery science.

Take the retrieved technical fragments below and reformulate them into a clear, well-structured \
Markdown response that directly answers the user's question. Synthesize across fragments, \
highlight key numerical values (ppm, percentages, temperatures) in bold, use bullet points for \
lists, and avoid redundancy.

Return ONLY the reformatted response in Markdown.";

// ============================================================================
// QueryRewriter Trait
// ============================================================================

/// 쿼리 리라이터 트레이트
///
/// 시작 시 설정에 따라 패스스루 또는 실제 구현이 선택됩니다.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    /// 질문을 검색용 질의로 재작성
    async fn rewrite(&self, question: &str) -> Result<String>;

    /// 검색 결과 프래그먼트를 마크다운 답변으로 재구성
    ///
    /// 재구성이 불가능하면 `Ok(None)`을 반환합니다.
    async fn reformulate(&self, question: &str, fragments: &[String]) -> Result<Option<String>>;

    /// 리라이터 이름
    fn name(&self) -> &str;
}

// ============================================================================
// NoopRewriter
// ============================================================================

/// 패스스루 리라이터 (API 키 미설정 시)
pub struct NoopRewriter;

#[async_trait]
impl QueryRewriter for NoopRewriter {
    async fn rewrite(&self, question: &str) -> Result<String> {
        Ok(question.to_string())
    }

    async fn reformulate(&self, _question: &str, _fragments: &[String]) -> Result<Option<String>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "noop"
    }
}

// ============================================================================
// GeminiRewriter
// ============================================================================

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

/// Google Gemini 리라이터 구현체
pub struct GeminiRewriter {
    api_key: String,
    client: reqwest::Client,
}

impl GeminiRewriter {
    /// 새 Gemini 리라이터 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SearchError::Rewriter(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { api_key, client })
    }

    /// 프롬프트로 텍스트 생성
    async fn generate(&self, prompt: String) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_p: 0.9,
                top_k: 40,
            },
        };

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(GEMINI_GENERATE_URL)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Rewriter(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Rewriter(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                return Err(SearchError::Rewriter(format!(
                    "Gemini API error ({}): {}",
                    error.error.status, error.error.message
                )));
            }
            return Err(SearchError::Rewriter(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::Rewriter(format!("failed to parse response: {}", e)))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SearchError::Rewriter("empty model response".to_string()))?;

        Ok(text)
    }
}

#[async_trait]
impl QueryRewriter for GeminiRewriter {
    async fn rewrite(&self, question: &str) -> Result<String> {
        let prompt = build_rewrite_prompt(question);
        let enhanced = self.generate(prompt).await?;

        tracing::debug!("Query enhanced: '{}' -> '{}'", question, enhanced);
        Ok(enhanced)
    }

    async fn reformulate(&self, question: &str, fragments: &[String]) -> Result<Option<String>> {
        if fragments.is_empty() {
            return Ok(None);
        }

        let prompt = build_reformulate_prompt(question, fragments);
        let reformulated = self.generate(prompt).await?;

        tracing::debug!("Response reformulated ({} chars)", reformulated.len());
        Ok(Some(reformulated))
    }

    fn name(&self) -> &str {
        "gemini-1.5-flash"
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 따라 리라이터 생성
///
/// API 키가 없거나 클라이언트 생성에 실패하면 패스스루로 동작합니다.
pub fn create_rewriter(settings: &Settings) -> Arc<dyn QueryRewriter> {
    match settings.gemini_api_key.as_ref() {
        Some(api_key) => match GeminiRewriter::new(api_key.clone()) {
            Ok(rewriter) => {
                tracing::info!("Query rewriter enabled (gemini-1.5-flash)");
                Arc::new(rewriter)
            }
            Err(e) => {
                tracing::warn!("Failed to create query rewriter, falling back: {}", e);
                Arc::new(NoopRewriter)
            }
        },
        None => {
            tracing::info!("GEMINI_API_KEY not set; query rewriter disabled");
            Arc::new(NoopRewriter)
        }
    }
}

// ============================================================================
// Prompt Builders
// ============================================================================

/// 질의 재작성 프롬프트 구성
fn build_rewrite_prompt(question: &str) -> String {
    format!("{}\n\nUser's original query: {}", ENHANCE_PROMPT, question)
}

/// 응답 재구성 프롬프트 구성
fn build_reformulate_prompt(question: &str, fragments: &[String]) -> String {
    let formatted: Vec<String> = fragments
        .iter()
        .enumerate()
        .map(|(i, fragment)| format!("**Result {}:**\n{}", i + 1, fragment))
        .collect();

    format!(
        "{}\n\nUser's question: {}\n\nRetrieved technical documents:\n\n{}",
        REFORMULATE_PROMPT,
        question,
        formatted.join("\n\n---\n\n")
    )
}

// ============================================================================
// Tests
// ============================================================================
