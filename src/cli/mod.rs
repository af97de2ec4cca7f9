//! CLI 모듈
//!
//! levain-rag CLI 명령어 정의 및 구현

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::api::{self, AppState, SearchResponse};
use crate::config::Settings;
use crate::service::SearchService;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "levain-rag")]
#[command(version, about = "시맨틱 문서 검색 RAG 서비스", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 자연어 질문으로 문서 검색
    Search {
        /// 검색할 질문
        #[arg(short = 'q', long)]
        question: String,

        /// 결과를 JSON으로 출력
        #[arg(long)]
        json: bool,

        /// 쿼리 리라이터 비활성화
        #[arg(long)]
        no_gemini: bool,
    },

    /// 폴더의 .txt 문서를 벡터 저장소에 수집
    Ingest {
        /// 수집할 문서 폴더
        #[arg(long)]
        folder: PathBuf,
    },

    /// 서비스 상태 확인
    Status,

    /// HTTP API 서버 실행
    Serve {
        /// 바인드 주소
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// 포트
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Search {
            question,
            json,
            no_gemini,
        } => cmd_search(&settings, &question, json, no_gemini).await,
        Commands::Ingest { folder } => cmd_ingest(&settings, &folder).await,
        Commands::Status => cmd_status(&settings).await,
        Commands::Serve { host, port } => cmd_serve(settings, &host, port).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 검색 명령어 (search)
async fn cmd_search(
    settings: &Settings,
    question: &str,
    json: bool,
    no_gemini: bool,
) -> Result<()> {
    let service = SearchService::from_settings(settings)
        .await
        .context("서비스 초기화 실패")?;

    if !json {
        println!("[*] 검색 중: \"{}\"", question);
    }

    let (results, reformulated) = service
        .search_with_reformulation(question, !no_gemini)
        .await
        .context("검색 실패")?;

    if json {
        let payload = SearchResponse {
            results,
            reformulated_response: reformulated,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("JSON 직렬화 실패")?
        );
        return Ok(());
    }

    if let Some(ref answer) = reformulated {
        println!();
        println!("{}", "=".repeat(60));
        println!("재구성된 답변:");
        println!("{}", "=".repeat(60));
        println!();
        println!("{}", answer);
        println!();
        println!("{}", "=".repeat(60));
        println!("검색 결과:");
        println!("{}", "=".repeat(60));
    }

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for result in &results {
        println!(
            "{}. [점수: {:.4}] Doc #{}",
            result.id, result.score, result.id_document
        );
        println!("   내용: {}", truncate_text(&result.texte_fragment, 200));
        println!();
    }

    Ok(())
}

/// 수집 명령어 (ingest)
async fn cmd_ingest(settings: &Settings, folder: &PathBuf) -> Result<()> {
    let service = SearchService::from_settings(settings)
        .await
        .context("서비스 초기화 실패")?;

    println!("[*] 문서 수집 중: {}", folder.display());

    let report = service
        .ingest_folder(folder)
        .await
        .context("문서 수집 실패")?;

    if report.documents_ingested == 0 {
        println!("[!] 수집된 문서가 없습니다.");
    } else {
        println!("[OK] 수집 완료: {} 건", report.documents_ingested);
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("levain-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] 임베딩 모델: {}", settings.embedding_model_name);
    println!(
        "[*] 저장소: {} ({})",
        settings.db_backend.as_str(),
        settings.db_path.display()
    );

    if settings.has_rewriter() {
        println!("[OK] 쿼리 리라이터: 활성");
    } else {
        println!("[!] 쿼리 리라이터: 비활성 (GEMINI_API_KEY 미설정)");
    }

    let service = SearchService::from_settings(settings)
        .await
        .context("서비스 초기화 실패")?;

    let count = service.count().await.context("문서 수 조회 실패")?;
    println!("[OK] 저장된 문서: {} 건", count);

    Ok(())
}

/// 서버 명령어 (serve)
async fn cmd_serve(settings: Settings, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("잘못된 바인드 주소: {}:{}", host, port))?;

    let service = SearchService::from_settings(&settings)
        .await
        .context("서비스 초기화 실패")?;

    let state = Arc::new(AppState { service, settings });

    println!("[*] HTTP 서버 시작: http://{}", addr);

    api::serve(state, addr).await.context("서버 실행 실패")
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
