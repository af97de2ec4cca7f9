//! 검색/수집 서비스 - 파이프라인 오케스트레이션
//!
//! 수집: 문서 -> 임베딩 -> 저장소 upsert
//! 검색: 질문 -> [재작성] -> 임베딩 -> 최근접 조회 -> 순위 결과
//!
//! 임베딩과 저장소 호출은 요청 안에서 동기적으로 수행됩니다.
//! 재시도/배칭/트랜잭션은 없습니다 - 배치 수집의 각 문서는 독립적이며
//! 중간 실패 시 이미 쓴 문서는 남습니다 (at-least-once).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::embedding::{EmbeddingProvider, MiniLmEmbedding};
use crate::error::{Result, SearchError};
use crate::loader;
use crate::rewriter::{create_rewriter, QueryRewriter};
use crate::store::{open_store, StoredRecord, VectorStore};

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 (요청 단위, 비영속)
///
/// `id`는 결과 내 1-based 순위입니다 (원본 API 와이어 포맷).
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// 결과 순위 (1-based)
    pub id: usize,
    /// 문서 순번
    pub id_document: i64,
    /// 프래그먼트 텍스트
    pub texte_fragment: String,
    /// 유사도 스코어 (0.0 ~ 1.0)
    pub score: f32,
}

/// 수집 입력 문서
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    /// 문서 ID (upsert 키)
    pub id: String,
    /// 문서 본문
    pub text: String,
    /// 문서 순번 (기본 0)
    #[serde(default)]
    pub id_document: i64,
    /// 추가 메타데이터
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// 수집 결과 리포트
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// 수집 성공한 문서 수
    pub documents_ingested: usize,
}

// ============================================================================
// SearchService
// ============================================================================

/// 시맨틱 검색 서비스
///
/// 임베딩 프로바이더, 벡터 저장소, 쿼리 리라이터를 소유하는 오케스트레이터입니다.
pub struct SearchService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    rewriter: Arc<dyn QueryRewriter>,
    top_k: usize,
}

impl SearchService {
    /// 구성 요소를 직접 주입하여 생성 (테스트용 포함)
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        rewriter: Arc<dyn QueryRewriter>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            rewriter,
            top_k,
        }
    }

    /// 설정에서 서비스 구성
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = Arc::new(MiniLmEmbedding::new(&settings.embedding_model_name));
        let store = open_store(settings).await?;
        let rewriter = create_rewriter(settings);

        Ok(Self::new(embedder, store, rewriter, settings.top_k))
    }

    /// 시맨틱 검색
    ///
    /// 리라이터가 켜져 있으면 질문을 재작성해 임베딩합니다.
    /// 재작성 실패는 경고만 남기고 원본 질문으로 폴백합니다 -
    /// 리라이터 유무/실패와 무관하게 검색은 동작해야 합니다.
    pub async fn search(&self, question: &str, use_rewriter: bool) -> Result<Vec<SearchResult>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SearchError::InvalidQuery(
                "question must be a non-empty string".to_string(),
            ));
        }

        let query = if use_rewriter {
            match self.rewriter.rewrite(question).await {
                Ok(rewritten) if !rewritten.trim().is_empty() => {
                    if rewritten != question {
                        tracing::info!("Query rewritten: '{}' -> '{}'", question, rewritten);
                    }
                    rewritten
                }
                Ok(_) => question.to_string(),
                Err(e) => {
                    tracing::warn!("Query rewrite failed, using original question: {}", e);
                    question.to_string()
                }
            }
        } else {
            question.to_string()
        };

        let embedding = self.embedder.embed(&query).await?;
        let hits = self.store.search(&embedding, self.top_k).await?;

        let results = hits
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| SearchResult {
                id: rank + 1,
                id_document: hit.id_document,
                texte_fragment: hit.fragment,
                score: hit.score,
            })
            .collect::<Vec<_>>();

        tracing::info!("Search returned {} results", results.len());
        Ok(results)
    }

    /// 검색 + 응답 재구성
    ///
    /// 재구성은 리라이터가 켜져 있고 결과가 있을 때만 시도하며,
    /// 실패해도 검색 결과는 그대로 반환됩니다.
    pub async fn search_with_reformulation(
        &self,
        question: &str,
        use_rewriter: bool,
    ) -> Result<(Vec<SearchResult>, Option<String>)> {
        let results = self.search(question, use_rewriter).await?;

        let mut reformulated = None;
        if use_rewriter && !results.is_empty() {
            let fragments: Vec<String> = results
                .iter()
                .map(|r| r.texte_fragment.clone())
                .collect();

            match self.rewriter.reformulate(question, &fragments).await {
                Ok(answer) => reformulated = answer,
                Err(e) => {
                    tracing::warn!("Response reformulation failed: {}", e);
                }
            }
        }

        Ok((results, reformulated))
    }

    /// 단일 문서 수집 (임베딩 생성 후 upsert)
    pub async fn add_document(&self, doc: DocumentInput) -> Result<()> {
        if doc.id.trim().is_empty() {
            return Err(SearchError::InvalidDocument(
                "document id must be non-empty".to_string(),
            ));
        }
        if doc.text.trim().is_empty() {
            return Err(SearchError::InvalidDocument(format!(
                "document '{}' has empty text",
                doc.id
            )));
        }

        let embedding = self.embedder.embed(&doc.text).await?;

        let mut metadata = serde_json::json!({
            "id_document": doc.id_document,
            "ingested_at": Utc::now().to_rfc3339(),
        });
        for (key, value) in &doc.metadata {
            metadata[key] = serde_json::Value::String(value.clone());
        }

        let record = StoredRecord::new(&doc.id, doc.id_document, &doc.text, embedding, metadata);
        self.store.upsert(record).await?;

        tracing::info!("Document {} added to vector store", doc.id);
        Ok(())
    }

    /// 폴더 일괄 수집 (best-effort)
    ///
    /// 문서 단위로 실패를 건너뛰고 계속합니다. 리포트는 성공 건수만
    /// 집계하며, 중간 실패 시 롤백하지 않습니다.
    pub async fn ingest_folder(&self, path: &Path) -> Result<IngestReport> {
        let documents = loader::load_folder(path)?;
        let total = documents.len();

        let mut ingested = 0;
        for doc in documents {
            let doc_id = doc.id.clone();
            let input = DocumentInput {
                id: doc.id,
                text: doc.text,
                id_document: doc.id_document,
                metadata: doc.metadata,
            };

            match self.add_document(input).await {
                Ok(()) => ingested += 1,
                Err(e) => {
                    tracing::warn!("Failed to ingest document {}: {}", doc_id, e);
                }
            }
        }

        tracing::info!("Ingested {}/{} documents", ingested, total);
        Ok(IngestReport {
            documents_ingested: ingested,
        })
    }

    /// API 문서 목록 수집
    ///
    /// 폴더 수집과 달리 첫 실패에서 중단하고 에러를 반환합니다.
    /// 이미 쓴 문서는 남습니다 (롤백 없음).
    pub async fn ingest_documents(&self, documents: Vec<DocumentInput>) -> Result<IngestReport> {
        let mut ingested = 0;
        for doc in documents {
            self.add_document(doc).await?;
            ingested += 1;
        }

        Ok(IngestReport {
            documents_ingested: ingested,
        })
    }

    /// 저장된 문서 수
    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriter::NoopRewriter;
    use crate::store::MemoryVectorStore;
    use async_trait::async_trait;

    /// 결정적 테스트 임베더 - 바이트 히스토그램 기반 (같은 텍스트 = 같은 벡터)
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(SearchError::Embedding("empty text".to_string()));
            }
            let mut vector = vec![0.0f32; 64];
            for (i, byte) in text.bytes().enumerate() {
                vector[(byte as usize + i) % 64] += 1.0;
            }
            Ok(vector)
        }

        fn dimension(&self) -> usize {
            64
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// 항상 실패하는 리라이터 (폴백 동작 검증용)
    struct FailingRewriter;

    #[async_trait]
    impl QueryRewriter for FailingRewriter {
        async fn rewrite(&self, _question: &str) -> Result<String> {
            Err(SearchError::Rewriter("simulated outage".to_string()))
        }

        async fn reformulate(
            &self,
            _question: &str,
            _fragments: &[String],
        ) -> Result<Option<String>> {
            Err(SearchError::Rewriter("simulated outage".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn service_with(rewriter: Arc<dyn QueryRewriter>) -> SearchService {
        SearchService::new(
            Arc::new(StubEmbedder),
            Arc::new(MemoryVectorStore::new()),
            rewriter,
            3,
        )
    }

    fn doc(id: &str, text: &str, id_document: i64) -> DocumentInput {
        DocumentInput {
            id: id.to_string(),
            text: text.to_string(),
            id_document,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_ingest_then_search_returns_own_document() {
        let service = service_with(Arc::new(NoopRewriter));

        service
            .ingest_documents(vec![
                doc("doc_1", "Alpha-amylase dosage: 0.005%-0.02% of flour weight.", 1),
                doc("doc_2", "Xylanase improves dough extensibility.", 2),
                doc("doc_3", "Ascorbic acid strengthens gluten network.", 3),
            ])
            .await
            .unwrap();

        // 자기 자신의 텍스트로 검색하면 해당 문서가 1위
        let results = service
            .search("Alpha-amylase dosage: 0.005%-0.02% of flour weight.", false)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].id, 1);
        assert_eq!(results[0].id_document, 1);
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_search_caps_results_and_orders_scores() {
        let service = service_with(Arc::new(NoopRewriter));

        for i in 0..6 {
            service
                .add_document(doc(
                    &format!("doc_{}", i),
                    &format!("document body number {}", i),
                    i,
                ))
                .await
                .unwrap();
        }

        let results = service.search("document body number 2", false).await.unwrap();
        assert!(results.len() <= 3);

        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for (rank, result) in results.iter().enumerate() {
            assert_eq!(result.id, rank + 1);
            assert!((0.0..=1.0).contains(&result.score));
        }
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let service = service_with(Arc::new(NoopRewriter));

        let result = service.search("   ", true).await;
        assert!(matches!(result, Err(SearchError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_failing_rewriter_equals_no_rewriter() {
        let with_noop = service_with(Arc::new(NoopRewriter));
        let with_failing = service_with(Arc::new(FailingRewriter));

        let docs = vec![
            doc("doc_1", "Alpha-amylase dosage guidance for bread flour.", 1),
            doc("doc_2", "Lipase effects on crumb softness.", 2),
        ];
        with_noop.ingest_documents(docs.clone()).await.unwrap();
        with_failing.ingest_documents(docs).await.unwrap();

        let question = "recommended alpha-amylase dosage";
        let a = with_noop.search(question, true).await.unwrap();
        let b = with_failing.search(question, true).await.unwrap();

        // 리라이터 실패는 리라이터 부재와 동일한 결과
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.id_document, y.id_document);
            assert_eq!(x.texte_fragment, y.texte_fragment);
            assert!((x.score - y.score).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_reformulation_failure_keeps_results() {
        let service = service_with(Arc::new(FailingRewriter));
        service
            .add_document(doc("doc_1", "Amylase dosage notes.", 1))
            .await
            .unwrap();

        let (results, reformulated) = service
            .search_with_reformulation("amylase", true)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert!(reformulated.is_none());
    }

    #[tokio::test]
    async fn test_count_grows_by_ingested_documents() {
        let service = service_with(Arc::new(NoopRewriter));
        assert_eq!(service.count().await.unwrap(), 0);

        let report = service
            .ingest_documents(vec![
                doc("doc_1", "first", 1),
                doc("doc_2", "second", 2),
            ])
            .await
            .unwrap();

        assert_eq!(report.documents_ingested, 2);
        assert_eq!(service.count().await.unwrap(), 2);

        // 같은 id 재수집은 덮어쓰기 - 개수 불변
        service
            .ingest_documents(vec![doc("doc_1", "first updated", 1)])
            .await
            .unwrap();
        assert_eq!(service.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_document_rejected() {
        let service = service_with(Arc::new(NoopRewriter));

        let result = service
            .ingest_documents(vec![doc("", "text", 0)])
            .await;
        assert!(matches!(result, Err(SearchError::InvalidDocument(_))));

        let result = service
            .ingest_documents(vec![doc("doc_1", "   ", 0)])
            .await;
        assert!(matches!(result, Err(SearchError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_ingest_folder_skips_bad_documents() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("good.txt"), "usable content").unwrap();
        // 빈 문서는 임베딩 단계에서 거부 -> 건너뛰고 계속
        std::fs::write(dir.path().join("empty.txt"), "   ").unwrap();

        let service = service_with(Arc::new(NoopRewriter));
        let report = service.ingest_folder(dir.path()).await.unwrap();

        assert_eq!(report.documents_ingested, 1);
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_missing_folder_is_not_found() {
        let service = service_with(Arc::new(NoopRewriter));
        let result = service
            .ingest_folder(Path::new("/nonexistent/folder/path"))
            .await;
        assert!(matches!(result, Err(SearchError::NotFound(_))));
    }
}
