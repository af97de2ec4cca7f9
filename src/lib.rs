//! levain-rag - 시맨틱 문서 검색 RAG 서비스
//!
//! 텍스트 문서를 all-MiniLM-L6-v2 임베딩(384차원)으로 변환해
//! LanceDB에 저장하고, 자연어 질문에 코사인 유사도 상위 3개
//! 프래그먼트를 REST API / CLI / 웹 폼으로 반환합니다.

pub mod api;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod loader;
pub mod rewriter;
pub mod service;
pub mod store;

// Re-exports
pub use config::{DbBackend, Settings};
pub use embedding::{EmbeddingProvider, MiniLmEmbedding};
pub use error::{Result, SearchError};
pub use loader::{load_folder, LoadedDocument};
pub use rewriter::{create_rewriter, GeminiRewriter, NoopRewriter, QueryRewriter};
pub use service::{DocumentInput, IngestReport, SearchResult, SearchService};
pub use store::{
    cosine_similarity, open_store, LanceVectorStore, MemoryVectorStore, StoredHit, StoredRecord,
    VectorStore,
};
