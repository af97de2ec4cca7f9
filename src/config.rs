//! 설정 모듈 - 환경변수 기반 명시적 설정
//!
//! 시작 시 한 번 로드되는 설정 구조체입니다. 서비스 코드는
//! 환경변수를 직접 읽지 않고 이 구조체를 참조로 전달받습니다.
//!
//! ## 인식하는 환경변수
//! - `DB_BACKEND`: 벡터 저장소 백엔드 (`lance` 기본 | `memory`)
//! - `DB_PATH`: 저장소 디렉토리 (대체: `CHROMA_DB_PATH`, 기본 `data/vector_db`)
//! - `EMBEDDING_MODEL_NAME`: 임베딩 모델 이름 (기본 `all-MiniLM-L6-v2`)
//! - `SEARCH_TOP_K`: 검색 결과 개수 (기본 3)
//! - `GEMINI_API_KEY`: 쿼리 리라이터 API 키 (미설정 시 리라이터 비활성)

use std::path::PathBuf;

use crate::error::{Result, SearchError};

/// 기본 임베딩 모델 이름
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// 기본 저장소 경로
pub const DEFAULT_DB_PATH: &str = "data/vector_db";

/// 기본 검색 결과 개수 (Top-K)
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Backend Selector
// ============================================================================

/// 벡터 저장소 백엔드 선택
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    /// LanceDB 디스크 저장소 (기본)
    Lance,
    /// 인메모리 저장소 (테스트/임시 실행용, 영속성 없음)
    Memory,
}

impl DbBackend {
    /// 문자열에서 백엔드 파싱
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "lance" | "lancedb" => Ok(Self::Lance),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(SearchError::Config(format!(
                "unknown DB_BACKEND '{}' (expected 'lance' or 'memory')",
                other
            ))),
        }
    }

    /// 백엔드 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lance => "lance",
            Self::Memory => "memory",
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct Settings {
    /// 벡터 저장소 백엔드
    pub db_backend: DbBackend,
    /// 벡터 저장소 디렉토리
    pub db_path: PathBuf,
    /// 임베딩 모델 이름 (/status 응답에 노출)
    pub embedding_model_name: String,
    /// 검색 결과 개수
    pub top_k: usize,
    /// Gemini API 키 (쿼리 리라이터용, 선택)
    pub gemini_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_backend: DbBackend::Lance,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            embedding_model_name: DEFAULT_EMBEDDING_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            gemini_api_key: None,
        }
    }
}

impl Settings {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        let db_backend = match env_nonempty("DB_BACKEND") {
            Some(value) => DbBackend::parse(&value)?,
            None => DbBackend::Lance,
        };

        // DB_PATH 우선, 호환용 CHROMA_DB_PATH 대체
        let db_path = env_nonempty("DB_PATH")
            .or_else(|| env_nonempty("CHROMA_DB_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let embedding_model_name = env_nonempty("EMBEDDING_MODEL_NAME")
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

        let top_k = match env_nonempty("SEARCH_TOP_K") {
            Some(value) => parse_top_k(&value)?,
            None => DEFAULT_TOP_K,
        };

        let gemini_api_key = env_nonempty("GEMINI_API_KEY");

        Ok(Self {
            db_backend,
            db_path,
            embedding_model_name,
            top_k,
            gemini_api_key,
        })
    }

    /// 쿼리 리라이터 사용 가능 여부
    pub fn has_rewriter(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 비어있지 않은 환경변수 조회
fn env_nonempty(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// SEARCH_TOP_K 파싱 (1 이상)
fn parse_top_k(value: &str) -> Result<usize> {
    let k: usize = value
        .trim()
        .parse()
        .map_err(|_| SearchError::Config(format!("invalid SEARCH_TOP_K '{}'", value)))?;
    if k == 0 {
        return Err(SearchError::Config(
            "SEARCH_TOP_K must be at least 1".to_string(),
        ));
    }
    Ok(k)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(DbBackend::parse("lance").unwrap(), DbBackend::Lance);
        assert_eq!(DbBackend::parse("LanceDB").unwrap(), DbBackend::Lance);
        assert_eq!(DbBackend::parse("memory").unwrap(), DbBackend::Memory);
        assert_eq!(DbBackend::parse(" mem ").unwrap(), DbBackend::Memory);
        assert!(DbBackend::parse("chroma").is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.db_backend, DbBackend::Lance);
        assert_eq!(settings.db_path, PathBuf::from("data/vector_db"));
        assert_eq!(settings.embedding_model_name, "all-MiniLM-L6-v2");
        assert_eq!(settings.top_k, 3);
        assert!(!settings.has_rewriter());
    }

    #[test]
    fn test_parse_top_k() {
        assert_eq!(parse_top_k("3").unwrap(), 3);
        assert_eq!(parse_top_k(" 10 ").unwrap(), 10);
        assert!(parse_top_k("0").is_err());
        assert!(parse_top_k("three").is_err());
    }

    #[test]
    fn test_has_rewriter() {
        let settings = Settings {
            gemini_api_key: Some("test-key".to_string()),
            ..Settings::default()
        };
        assert!(settings.has_rewriter());
    }
}
