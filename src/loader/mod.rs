//! 문서 로더 모듈
//!
//! 폴더에서 .txt 문서를 수집합니다 (하위 폴더 제외).
//! 문서 ID는 파일 이름(확장자 제외)에서, 문서 순번은
//! 파일명 정렬 순서의 1-based 위치에서 결정됩니다.
//!
//! 읽기 실패한 파일은 경고 후 건너뛰고 수집을 계속합니다 (best-effort).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{Result, SearchError};

// ============================================================================
// Types
// ============================================================================

/// 폴더에서 로드된 문서
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// 문서 ID (파일 이름에서 파생, 안정적)
    pub id: String,
    /// 문서 순번 (정렬된 목록에서 1-based)
    pub id_document: i64,
    /// 문서 본문
    pub text: String,
    /// 메타데이터
    pub metadata: HashMap<String, String>,
}

// ============================================================================
// Folder Loading
// ============================================================================

/// 폴더의 .txt 문서 로드
///
/// # Arguments
/// * `path` - 문서 폴더 경로
///
/// # Returns
/// 파일명 정렬 순서의 문서 목록 (빈 폴더면 빈 목록)
pub fn load_folder(path: &Path) -> Result<Vec<LoadedDocument>> {
    if !path.exists() {
        return Err(SearchError::NotFound(format!(
            "folder {} does not exist",
            path.display()
        )));
    }

    if !path.is_dir() {
        return Err(SearchError::NotFound(format!(
            "{} is not a directory",
            path.display()
        )));
    }

    // 하위 폴더 제외, .txt만 수집
    let mut files: Vec<PathBuf> = Vec::new();
    let walker = WalkBuilder::new(path).max_depth(Some(1)).build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let file_path = entry.path();
        let is_txt = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);

        if is_txt {
            files.push(file_path.to_path_buf());
        }
    }

    // 파일명 기준 정렬 -> 순번이 실행 간에 안정적
    files.sort();

    let mut documents = Vec::with_capacity(files.len());

    for (index, file_path) in files.iter().enumerate() {
        // 읽기 실패는 건너뛰되 순번은 소비 (스킵돼도 다른 문서의 순번 불변)
        let text = match std::fs::read_to_string(file_path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {:?}: {}", file_path, e);
                continue;
            }
        };

        let id = match file_path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => {
                tracing::warn!("Skipping file with invalid name: {:?}", file_path);
                continue;
            }
        };

        documents.push(LoadedDocument {
            id,
            id_document: index as i64 + 1,
            text,
            metadata: HashMap::new(),
        });
    }

    tracing::info!(
        "Loaded {} documents from {} ({} .txt files found)",
        documents.len(),
        path.display(),
        files.len()
    );

    Ok(documents)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_load_folder_sorted_with_stable_ids() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "beta.txt", "beta content");
        write_file(dir.path(), "alpha.txt", "alpha content");
        write_file(dir.path(), "notes.md", "ignored");

        let docs = load_folder(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);

        // 파일명 정렬 순서
        assert_eq!(docs[0].id, "alpha");
        assert_eq!(docs[0].id_document, 1);
        assert_eq!(docs[0].text, "alpha content");

        assert_eq!(docs[1].id, "beta");
        assert_eq!(docs[1].id_document, 2);
    }

    #[test]
    fn test_missing_folder_is_not_found() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let result = load_folder(&missing);
        assert!(matches!(result, Err(SearchError::NotFound(_))));
    }

    #[test]
    fn test_file_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "doc.txt", "content");

        let result = load_folder(&dir.path().join("doc.txt"));
        assert!(matches!(result, Err(SearchError::NotFound(_))));
    }

    #[test]
    fn test_empty_folder_returns_empty() {
        let dir = TempDir::new().unwrap();
        let docs = load_folder(dir.path()).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_subfolders_are_not_recursed() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "top.txt", "top");

        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_file(&sub, "nested.txt", "nested");

        let docs = load_folder(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "top");
    }

    #[test]
    fn test_extension_case_insensitive() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "upper.TXT", "upper content");

        let docs = load_folder(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "upper");
    }
}
