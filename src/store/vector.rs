//! Vector Store - 벡터 저장소 트레이트 및 공통 타입
//!
//! 저장 레코드는 수집 시 한 번 쓰이고 이후 변경되지 않습니다.
//! 같은 문서 id로 다시 쓰면 기존 레코드를 덮어씁니다 (idempotent upsert).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// 벡터 임베딩 차원 (all-MiniLM-L6-v2)
pub const EMBEDDING_DIMENSION: i32 = 384;

// ============================================================================
// Types
// ============================================================================

/// 저장 레코드 (쓰기용)
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// 레코드 UUID (쓰기마다 새로 발급)
    pub record_id: String,
    /// 문서 ID (upsert 키)
    pub doc_id: String,
    /// 문서 순번
    pub id_document: i64,
    /// 프래그먼트 텍스트 (청킹 없이 문서 전체)
    pub fragment: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
    /// 메타데이터 (JSON)
    pub metadata: serde_json::Value,
}

impl StoredRecord {
    /// 새 레코드 생성 (record_id 자동 발급)
    pub fn new(
        doc_id: impl Into<String>,
        id_document: i64,
        fragment: impl Into<String>,
        embedding: Vec<f32>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            doc_id: doc_id.into(),
            id_document,
            fragment: fragment.into(),
            embedding,
            metadata,
        }
    }
}

/// 저장소 검색 히트
#[derive(Debug, Clone)]
pub struct StoredHit {
    /// 문서 ID
    pub doc_id: String,
    /// 문서 순번
    pub id_document: i64,
    /// 프래그먼트 텍스트
    pub fragment: String,
    /// 유사도 스코어 (0.0 ~ 1.0)
    pub score: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 레코드 저장 (doc_id 기준 idempotent)
    async fn upsert(&self, record: StoredRecord) -> Result<()>;

    /// 코사인 유사도 내림차순으로 최대 top_k 개 검색
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<StoredHit>>;

    /// 저장된 레코드 개수
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위이며, 차원이 다르거나 영벡터면 0.0입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 코사인 거리를 스코어로 변환
///
/// 거리 d = 1 - cos 이므로 스코어 = 1 - d 이고, [0, 1]로 클램프합니다.
/// 음의 코사인 유사도는 0.0으로 보고됩니다.
pub fn distance_to_score(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

// ============================================================================
// Tests
// ============================================================================
