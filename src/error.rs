//! 에러 타입 정의
//!
//! 서비스 전반에서 사용하는 에러 분류입니다. 임베딩/저장소 에러는
//! 요청 단위 실패(HTTP 5xx, CLI 비정상 종료)로 전파되고,
//! 리라이터 에러는 비치명적으로 처리됩니다.

use thiserror::Error;

/// 크레이트 공통 Result 타입
pub type Result<T> = std::result::Result<T, SearchError>;

/// 검색 서비스 에러
#[derive(Debug, Error)]
pub enum SearchError {
    /// 폴더 또는 문서를 찾을 수 없음
    #[error("not found: {0}")]
    NotFound(String),

    /// 빈 질문 등 잘못된 검색 요청
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// id/text가 누락된 수집 문서
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// 임베딩 모델 로드 또는 추론 실패
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// 벡터 저장소 쓰기 실패
    #[error("vector store write failed: {0}")]
    StoreWrite(String),

    /// 벡터 저장소 조회 실패
    #[error("vector store query failed: {0}")]
    StoreQuery(String),

    /// 쿼리 리라이터 실패 (비치명적 - 원본 질문으로 폴백)
    #[error("query rewriter failed: {0}")]
    Rewriter(String),

    /// 설정 오류
    #[error("configuration error: {0}")]
    Config(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SearchError::InvalidQuery("question must be non-empty".to_string());
        assert_eq!(err.to_string(), "invalid query: question must be non-empty");

        let err = SearchError::StoreQuery("table missing".to_string());
        assert!(err.to_string().contains("vector store query failed"));
    }
}
