//! LanceDB Vector Store - 디스크 영속 벡터 저장소
//!
//! 설정된 디렉토리에 저장되며 프로세스 재시작 후에도 유지됩니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use crate::error::{Result, SearchError};

use super::vector::{distance_to_score, StoredHit, StoredRecord, VectorStore, EMBEDDING_DIMENSION};

/// 프래그먼트 테이블 이름
const TABLE_NAME: &str = "fragments";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 테이블은 첫 upsert 시 생성됩니다. 같은 doc_id로 다시 쓰면
/// 기존 행을 지우고 새로 넣습니다 (idempotent upsert).
/// 동일 스코어 간 순서는 인덱스 구현에 따릅니다.
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - 저장소 디렉토리 경로 (없으면 생성)
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            tokio::fs::create_dir_all(path).await.map_err(|e| {
                SearchError::StoreWrite(format!("failed to create store directory: {}", e))
            })?;
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| SearchError::Config("invalid store path encoding".to_string()))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .map_err(|e| SearchError::StoreWrite(format!("failed to connect to LanceDB: {}", e)))?;

        tracing::info!("LanceDB store opened at {:?}", path);
        Ok(Self { db })
    }

    /// 프래그먼트 테이블 스키마
    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("record_id", DataType::Utf8, false),
            Field::new("doc_id", DataType::Utf8, false),
            Field::new("id_document", DataType::Int64, false),
            Field::new("fragment", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    /// 레코드를 Arrow RecordBatch로 변환
    fn record_to_batch(record: &StoredRecord) -> Result<RecordBatch> {
        if record.embedding.len() != EMBEDDING_DIMENSION as usize {
            return Err(SearchError::StoreWrite(format!(
                "embedding dimension mismatch: {} (expected {})",
                record.embedding.len(),
                EMBEDDING_DIMENSION
            )));
        }

        let values = Float32Array::from(record.embedding.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embedding_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .map_err(|e| SearchError::StoreWrite(format!("failed to create embedding array: {}", e)))?;

        let metadata_json = record.metadata.to_string();

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(StringArray::from(vec![record.record_id.as_str()])),
                Arc::new(StringArray::from(vec![record.doc_id.as_str()])),
                Arc::new(Int64Array::from(vec![record.id_document])),
                Arc::new(StringArray::from(vec![record.fragment.as_str()])),
                Arc::new(StringArray::from(vec![metadata_json.as_str()])),
                Arc::new(embedding_list),
            ],
        )
        .map_err(|e| SearchError::StoreWrite(format!("failed to create RecordBatch: {}", e)))?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&TABLE_NAME.to_string()))
            .unwrap_or(false)
    }
}

/// SQL 문자열 리터럴 이스케이프 (doc_id 필터용)
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, record: StoredRecord) -> Result<()> {
        let batch = Self::record_to_batch(&record)?;
        let schema = batch.schema();

        if self.table_exists().await {
            let table = self
                .db
                .open_table(TABLE_NAME)
                .execute()
                .await
                .map_err(|e| SearchError::StoreWrite(format!("failed to open table: {}", e)))?;

            // 같은 doc_id 기존 행 제거 후 삽입 (idempotent upsert)
            let filter = format!("doc_id = '{}'", escape_literal(&record.doc_id));
            table.delete(&filter).await.map_err(|e| {
                SearchError::StoreWrite(format!("failed to delete previous record: {}", e))
            })?;

            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table
                .add(batches)
                .execute()
                .await
                .map_err(|e| SearchError::StoreWrite(format!("failed to add record: {}", e)))?;
        } else {
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .map_err(|e| SearchError::StoreWrite(format!("failed to create table: {}", e)))?;
        }

        tracing::debug!("Upserted record for document {}", record.doc_id);
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<StoredHit>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| SearchError::StoreQuery(format!("failed to open table: {}", e)))?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .map_err(|e| SearchError::StoreQuery(format!("failed to build search: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| SearchError::StoreQuery(format!("failed to execute search: {}", e)))?;

        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| SearchError::StoreQuery(format!("failed to collect results: {}", e)))?;

        let mut hits = Vec::new();

        for batch in batches {
            let doc_ids = batch
                .column_by_name("doc_id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| SearchError::StoreQuery("missing doc_id column".to_string()))?;

            let id_documents = batch
                .column_by_name("id_document")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| SearchError::StoreQuery("missing id_document column".to_string()))?;

            let fragments = batch
                .column_by_name("fragment")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| SearchError::StoreQuery("missing fragment column".to_string()))?;

            // _distance 컬럼 (LanceDB가 자동 추가, 코사인 거리)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| SearchError::StoreQuery("missing _distance column".to_string()))?;

            for i in 0..batch.num_rows() {
                hits.push(StoredHit {
                    doc_id: doc_ids.value(i).to_string(),
                    id_document: id_documents.value(i),
                    fragment: fragments.value(i).to_string(),
                    score: distance_to_score(distances.value(i)),
                });
            }
        }

        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| SearchError::StoreQuery(format!("failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| SearchError::StoreQuery(format!("failed to count rows: {}", e)))?;

        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// i번째 축 방향 단위 벡터로 테스트 레코드 생성
    fn create_test_record(doc_id: &str, id_document: i64, axis: usize) -> StoredRecord {
        let mut embedding = vec![0.0; EMBEDDING_DIMENSION as usize];
        embedding[axis] = 1.0;
        StoredRecord::new(
            doc_id,
            id_document,
            format!("fragment for {}", doc_id),
            embedding,
            serde_json::json!({ "id_document": id_document }),
        )
    }

    fn axis_vector(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIMENSION as usize];
        v[axis] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(temp_dir.path()).await.unwrap();

        // 초기 상태
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&axis_vector(0), 3).await.unwrap().is_empty());

        store.upsert(create_test_record("doc_1", 1, 0)).await.unwrap();
        store.upsert(create_test_record("doc_2", 2, 1)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lance_upsert_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(temp_dir.path()).await.unwrap();

        store.upsert(create_test_record("doc_1", 1, 0)).await.unwrap();

        // 같은 doc_id 재수집: 개수는 그대로, 내용은 교체
        let mut updated = create_test_record("doc_1", 1, 0);
        updated.fragment = "updated fragment".to_string();
        store.upsert(updated).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);

        let hits = store.search(&axis_vector(0), 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fragment, "updated fragment");
    }

    #[tokio::test]
    async fn test_lance_search_ranking() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(temp_dir.path()).await.unwrap();

        store.upsert(create_test_record("doc_1", 1, 0)).await.unwrap();
        store.upsert(create_test_record("doc_2", 2, 1)).await.unwrap();
        store.upsert(create_test_record("doc_3", 3, 2)).await.unwrap();

        // doc_2 방향으로 질의: doc_2가 1위 (스코어 ~1.0)
        let hits = store.search(&axis_vector(1), 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "doc_2");
        assert!(hits[0].score > 0.99);

        // 스코어는 비증가, [0, 1] 범위
        for window in hits.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.score));
        }
    }

    #[tokio::test]
    async fn test_lance_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = LanceVectorStore::open(temp_dir.path()).await.unwrap();
            store.upsert(create_test_record("doc_1", 1, 0)).await.unwrap();
        }

        // 재시작 시뮬레이션: 같은 경로로 다시 열기
        let store = LanceVectorStore::open(temp_dir.path()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let hits = store.search(&axis_vector(0), 3).await.unwrap();
        assert_eq!(hits[0].doc_id, "doc_1");
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("doc_1"), "doc_1");
        assert_eq!(escape_literal("it's"), "it''s");
    }

    #[test]
    fn test_record_dimension_checked() {
        let record = StoredRecord::new("doc_1", 1, "text", vec![0.1; 8], serde_json::json!({}));
        let result = LanceVectorStore::record_to_batch(&record);
        assert!(matches!(result, Err(SearchError::StoreWrite(_))));
    }
}
