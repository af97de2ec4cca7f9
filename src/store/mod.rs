//! Store 모듈 - 벡터 저장소
//!
//! - vector: 공통 트레이트와 레코드 타입, 유사도 유틸리티
//! - lance: LanceDB 디스크 백엔드 (기본, 재시작 후에도 유지)
//! - memory: 인메모리 백엔드 (테스트/임시 실행용)

mod lance;
mod memory;
mod vector;

use std::sync::Arc;

use crate::config::{DbBackend, Settings};
use crate::error::Result;

// Re-exports
pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use vector::{
    cosine_similarity, distance_to_score, StoredHit, StoredRecord, VectorStore,
    EMBEDDING_DIMENSION,
};

/// 설정에 맞는 벡터 저장소 열기
pub async fn open_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    match settings.db_backend {
        DbBackend::Lance => {
            let store = LanceVectorStore::open(&settings.db_path).await?;
            Ok(Arc::new(store))
        }
        DbBackend::Memory => Ok(Arc::new(MemoryVectorStore::new())),
    }
}
