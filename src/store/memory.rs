//! 인메모리 벡터 저장소
//!
//! 전수 스캔 + 정확한 코사인 유사도 계산을 하는 비영속 백엔드입니다.
//! `DB_BACKEND=memory`로 선택하며, 테스트와 임시 실행에 사용합니다.
//! 동일 스코어는 삽입 순서를 유지합니다 (stable sort).

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, SearchError};

use super::vector::{cosine_similarity, StoredHit, StoredRecord, VectorStore};

/// 인메모리 벡터 저장소 구현
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<Vec<StoredRecord>>,
}

impl MemoryVectorStore {
    /// 빈 저장소 생성
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, record: StoredRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| SearchError::StoreWrite("store lock poisoned".to_string()))?;

        // 같은 doc_id면 제자리 교체 (삽입 순서 유지)
        if let Some(existing) = records.iter_mut().find(|r| r.doc_id == record.doc_id) {
            *existing = record;
        } else {
            records.push(record);
        }

        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<StoredHit>> {
        let records = self
            .records
            .read()
            .map_err(|_| SearchError::StoreQuery("store lock poisoned".to_string()))?;

        let mut hits: Vec<StoredHit> = records
            .iter()
            .map(|r| StoredHit {
                doc_id: r.doc_id.clone(),
                id_document: r.id_document,
                fragment: r.fragment.clone(),
                score: cosine_similarity(query_embedding, &r.embedding).clamp(0.0, 1.0),
            })
            .collect();

        // stable sort: 동일 스코어는 삽입 순서 유지
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let records = self
            .records
            .read()
            .map_err(|_| SearchError::StoreQuery("store lock poisoned".to_string()))?;
        Ok(records.len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doc_id: &str, id_document: i64, embedding: Vec<f32>) -> StoredRecord {
        StoredRecord::new(
            doc_id,
            id_document,
            format!("fragment for {}", doc_id),
            embedding,
            serde_json::json!({ "id_document": id_document }),
        )
    }

    #[tokio::test]
    async fn test_upsert_and_count() {
        let store = MemoryVectorStore::new();
        assert_eq!(store.count().await.unwrap(), 0);

        store.upsert(record("doc_1", 1, vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("doc_2", 2, vec![0.0, 1.0])).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_doc_id() {
        let store = MemoryVectorStore::new();

        store.upsert(record("doc_1", 1, vec![1.0, 0.0])).await.unwrap();
        let mut updated = record("doc_1", 1, vec![1.0, 0.0]);
        updated.fragment = "updated".to_string();
        store.upsert(updated).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits[0].fragment, "updated");
    }

    #[tokio::test]
    async fn test_search_ranking_and_bounds() {
        let store = MemoryVectorStore::new();

        store.upsert(record("doc_1", 1, vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("doc_2", 2, vec![0.7, 0.7])).await.unwrap();
        store.upsert(record("doc_3", 3, vec![0.0, 1.0])).await.unwrap();
        store.upsert(record("doc_4", 4, vec![-1.0, 0.0])).await.unwrap();

        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].doc_id, "doc_1");
        assert!(hits[0].score > 0.99);

        // 스코어 비증가, [0, 1] 범위 (음의 유사도는 0으로 클램프)
        for window in hits.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.score));
        }
    }

    #[tokio::test]
    async fn test_search_respects_top_k() {
        let store = MemoryVectorStore::new();
        for i in 0..10 {
            store
                .upsert(record(&format!("doc_{}", i), i, vec![1.0, 0.0]))
                .await
                .unwrap();
        }

        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_tie_break_keeps_insertion_order() {
        let store = MemoryVectorStore::new();

        // 전부 동일 벡터 -> 동일 스코어
        store.upsert(record("doc_b", 1, vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("doc_a", 2, vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("doc_c", 3, vec![1.0, 0.0])).await.unwrap();

        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        let order: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(order, vec!["doc_b", "doc_a", "doc_c"]);
    }
}
