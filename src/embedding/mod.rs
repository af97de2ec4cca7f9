//! 임베딩 모듈 - 로컬 ONNX 모델 기반 텍스트 벡터화
//!
//! all-MiniLM-L6-v2 문장 임베딩 모델(384차원)로 텍스트를 벡터로 변환합니다.
//! 수집과 검색이 반드시 같은 모델을 사용해야 유사도 의미가 보존됩니다.
//!
//! 모델은 프로세스 수명 동안 한 번만 로드됩니다 (lazy + init-once).
//! 동시 첫 호출에서도 `OnceCell`이 단일 초기화를 보장합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = MiniLmEmbedding::new("all-MiniLM-L6-v2");
//! let vector = embedder.embed("Alpha-amylase dosage guidance").await?;
//! assert_eq!(vector.len(), 384);
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;

use crate::error::{Result, SearchError};

/// 임베딩 차원 (all-MiniLM-L6-v2)
pub const DEFAULT_DIMENSION: usize = 384;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// MiniLM Embedding
// ============================================================================

/// all-MiniLM-L6-v2 로컬 임베딩 구현체
///
/// fastembed ONNX 런타임을 사용합니다. 모델 핸들은 첫 호출 시 로드되어
/// 프로세스 전역에서 재사용됩니다. 로드 실패는 해당 요청만 실패시키고
/// 프로세스는 유지됩니다 (다음 요청에서 재시도).
pub struct MiniLmEmbedding {
    model_name: String,
    model: OnceCell<Mutex<TextEmbedding>>,
}

impl MiniLmEmbedding {
    /// 새 임베딩 인스턴스 생성 (모델은 아직 로드하지 않음)
    ///
    /// # Arguments
    /// * `model_name` - /status에 노출되는 모델 이름
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            model: OnceCell::new(),
        }
    }

    /// 모델 핸들 획득 (첫 호출 시 로드)
    fn model(&self) -> Result<&Mutex<TextEmbedding>> {
        self.model.get_or_try_init(|| {
            tracing::info!("Loading embedding model: {}", self.model_name);

            let model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                    .with_show_download_progress(false),
            )
            .map_err(|e| {
                SearchError::Embedding(format!("failed to load embedding model: {}", e))
            })?;

            tracing::info!("Embedding model loaded ({} dimensions)", DEFAULT_DIMENSION);
            Ok(Mutex::new(model))
        })
    }
}

#[async_trait]
impl EmbeddingProvider for MiniLmEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트는 모델 로드 전에 거부
        if text.trim().is_empty() {
            return Err(SearchError::Embedding(
                "text to embed must be a non-empty string".to_string(),
            ));
        }

        let model = self.model()?;
        let guard = model
            .lock()
            .map_err(|_| SearchError::Embedding("embedding model lock poisoned".to_string()))?;

        let mut vectors = guard
            .embed(vec![text], None)
            .map_err(|e| SearchError::Embedding(format!("embedding inference failed: {}", e)))?;

        let vector = vectors
            .pop()
            .ok_or_else(|| SearchError::Embedding("model returned no vector".to_string()))?;

        if vector.len() != DEFAULT_DIMENSION {
            return Err(SearchError::Embedding(format!(
                "unexpected embedding dimension: {} (expected {})",
                vector.len(),
                DEFAULT_DIMENSION
            )));
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        DEFAULT_DIMENSION
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

// ============================================================================
// Tests
// ============================================================================
