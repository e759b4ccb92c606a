use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use reference_refinement::config::Config;
use reference_refinement::error::{ApiError, AppResult};
use reference_refinement::infrastructure::{CheckpointStore, DecisionsStore};
use reference_refinement::models::{CandidateScore, CitationRecord, SearchCandidate, ValidationResult, MANUAL_REVIEW};
use reference_refinement::orchestrator::App;
use reference_refinement::services::{QueryGenerator, Ranker, UrlValidator, WebSearch};
use reference_refinement::workflow::{FlowSettings, RecordFlow};

const DECISIONS: &str = "\
[1] Smith, J. (2020). Radio Days in America. Acme Press. Relevance: Shows early broadcasting.

[2] Lee, K. (2018). Television and Memory. Beacon Press. Relevance: Memory studies. PRIMARY_URL[https://old.example/tv]

[3] Park, M. (2019). Networks of Sound. Sound Press. Relevance: Sound networks.
";

// ========== 进程内的假服务 ==========

/// 用标题作为唯一的搜索语句；`fail_for` 指定的记录总是失败
struct TitleQueries {
    fail_for: Option<u32>,
}

#[async_trait]
impl QueryGenerator for TitleQueries {
    async fn generate(&self, record: &CitationRecord) -> AppResult<Vec<String>> {
        if self.fail_for == Some(record.id) {
            return Err(ApiError::BadResponse {
                endpoint: "mock-llm".to_string(),
                status: 503,
                message: "service unavailable".to_string(),
            }
            .into());
        }
        Ok(vec![record.title.clone()])
    }
}

/// 每条语句返回一个存档页和一个书评页
struct ArchiveSearch;

fn slug(text: &str) -> String {
    text.to_lowercase().replace(' ', "-")
}

#[async_trait]
impl WebSearch for ArchiveSearch {
    async fn search(&self, query: &str) -> AppResult<Vec<SearchCandidate>> {
        Ok(vec![
            SearchCandidate {
                title: format!("{} - Full Text Archive", query),
                url: format!("https://archive.example/{}", slug(query)),
                snippet: "Full text".to_string(),
            },
            SearchCandidate {
                title: format!("Review of {}", query),
                url: format!("https://reviews.example/{}", slug(query)),
                snippet: "A review".to_string(),
            },
        ])
    }
}

/// 存档页适合做主链接，书评页适合做次链接；`primary` 为存档页的主链接分数
struct UrlRanker {
    primary: u8,
}

#[async_trait]
impl Ranker for UrlRanker {
    async fn rank(&self, _record: &CitationRecord, candidates: &[SearchCandidate]) -> AppResult<Vec<CandidateScore>> {
        Ok(candidates
            .iter()
            .enumerate()
            .map(|(index, c)| {
                let (primary_score, secondary_score) = if c.url.contains("archive.example") {
                    (self.primary, 10)
                } else if c.url.contains("reviews.example") {
                    (20, 85)
                } else {
                    (30, 30)
                };
                CandidateScore {
                    index,
                    primary_score,
                    secondary_score,
                    rationale: String::new(),
                }
            })
            .collect())
    }
}

struct OpenValidator;

#[async_trait]
impl UrlValidator for OpenValidator {
    async fn validate(&self, _url: &str, _citation: &str) -> ValidationResult {
        ValidationResult {
            accessible: true,
            score: 100,
            content_matches: true,
            reason: "ok".to_string(),
            ..Default::default()
        }
    }
}

// ========== 辅助函数 ==========

fn test_config(dir: &Path) -> Config {
    let path = |name: &str| dir.join(name).display().to_string();
    Config {
        decisions_file: path("decisions.txt"),
        backup_dir: path("backups"),
        checkpoint_file: path("checkpoint.json"),
        output_log_file: path("output.txt"),
        summary_file: Some(path("summary.json")),
        delay_between_records_ms: 0,
        delay_between_searches_ms: 0,
        retry_initial_delay_ms: 0,
        max_retries: 2,
        checkpoint_frequency: 1,
        ..Config::default()
    }
}

fn app_with(config: Config, fail_for: Option<u32>, primary: u8) -> App {
    let flow = RecordFlow::new(
        Arc::new(TitleQueries { fail_for }),
        Arc::new(ArchiveSearch),
        Arc::new(UrlRanker { primary }),
        Arc::new(OpenValidator),
        FlowSettings::from_config(&config),
    );
    App::with_flow(config, flow)
}

fn setup() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    fs::write(&config.decisions_file, DECISIONS).unwrap();
    (dir, config)
}

fn reload(config: &Config) -> Vec<CitationRecord> {
    DecisionsStore::new(&config.decisions_file, &config.backup_dir, config.parse_options())
        .load()
        .unwrap()
        .document
        .records
}

// ========== 测试 ==========

#[tokio::test]
async fn test_one_bad_record_does_not_halt_the_batch() {
    let (_dir, config) = setup();
    let app = app_with(config.clone(), Some(2), 95);

    let summary = app.run(false).await.unwrap();
    assert_eq!(summary.selected, 3);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.errored.len(), 1);
    assert_eq!(summary.errored[0].id, 2);
    assert!(summary.attention_ids().contains(&2));

    let records = reload(&config);
    assert_eq!(
        records[0].primary_url.as_deref(),
        Some("https://archive.example/radio-days-in-america")
    );
    assert_eq!(
        records[0].secondary_url.as_deref(),
        Some("https://reviews.example/radio-days-in-america")
    );
    assert_eq!(records[0].queries, vec!["Radio Days in America".to_string()]);
    assert_eq!(records[1].primary_url.as_deref(), Some("https://old.example/tv"));
    assert!(records[1].queries.is_empty());
    assert!(records[2].has_primary_url());

    let checkpoint = CheckpointStore::new(&config.checkpoint_file).load().unwrap();
    assert!(checkpoint.is_completed(1));
    assert!(checkpoint.is_completed(3));
    assert!(!checkpoint.is_completed(2));
    assert_eq!(checkpoint.errors.len(), 1);

    let summary_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config.summary_file.as_ref().unwrap()).unwrap()).unwrap();
    assert_eq!(summary_json["processed"], 2);

    let log = fs::read_to_string(&config.output_log_file).unwrap();
    assert!(log.contains("文献链接整理日志"));
}

#[tokio::test]
async fn test_resume_only_processes_remaining_records() {
    let (_dir, config) = setup();
    app_with(config.clone(), Some(2), 95).run(false).await.unwrap();

    let summary = app_with(config.clone(), None, 95).run(true).await.unwrap();
    assert_eq!(summary.selected, 1);
    assert_eq!(summary.processed, 1);
    assert!(summary.errored.is_empty());

    let records = reload(&config);
    assert_eq!(
        records[1].primary_url.as_deref(),
        Some("https://archive.example/television-and-memory")
    );
    let checkpoint = CheckpointStore::new(&config.checkpoint_file).load().unwrap();
    assert_eq!(checkpoint.completed_ids.len(), 3);
    assert!(checkpoint.errors.is_empty());
}

#[tokio::test]
async fn test_low_scores_flag_for_review_and_keep_existing_links() {
    let (_dir, config) = setup();
    let summary = app_with(config.clone(), None, 60).run(false).await.unwrap();
    assert_eq!(summary.flagged, 3);
    assert_eq!(summary.assigned, 0);

    let records = reload(&config);
    for record in &records {
        assert!(record.flags.contains(MANUAL_REVIEW));
        assert!(!record.is_finalized());
    }
    assert_eq!(records[1].primary_url.as_deref(), Some("https://old.example/tv"));
    // 次链接不需要主链接达标
    assert!(records[0].has_secondary_url());
    assert!(!records[0].has_primary_url());
}

#[tokio::test]
async fn test_auto_finalize_keeps_the_finalize_invariant() {
    let (_dir, mut config) = setup();
    config.auto_finalize = true;
    config.batch_flag = Some("BATCH_v20.0".to_string());

    let summary = app_with(config.clone(), None, 95).run(false).await.unwrap();
    assert_eq!(summary.finalized, 3);

    let records = reload(&config);
    for record in &records {
        assert!(record.is_finalized());
        assert!(record.has_primary_url());
        assert!(!record.flags.needs_manual_review());
        assert!(record.flags.contains("BATCH_v20.0"));
    }
}

#[tokio::test]
async fn test_auto_finalize_requires_min_score() {
    let (_dir, mut config) = setup();
    config.auto_finalize = true;

    let summary = app_with(config.clone(), None, 80).run(false).await.unwrap();
    assert_eq!(summary.assigned, 3);
    assert_eq!(summary.finalized, 0);
    assert!(reload(&config).iter().all(|r| !r.is_finalized()));
}

#[tokio::test]
async fn test_stop_flag_prevents_further_records() {
    let (_dir, config) = setup();
    let app = app_with(config.clone(), None, 95);
    app.stop_flag().store(true, Ordering::SeqCst);

    let summary = app.run(false).await.unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.processed, 0);
    assert!(reload(&config).iter().all(|r| r.queries.is_empty()));
}

#[tokio::test]
async fn test_range_selection_limits_the_run() {
    let (_dir, mut config) = setup();
    config.selection_mode = reference_refinement::config::SelectionMode::Range;
    config.range_start = Some(2);
    config.range_end = Some(3);

    let summary = app_with(config.clone(), None, 95).run(false).await.unwrap();
    assert_eq!(summary.processed, 2);
    let records = reload(&config);
    assert!(records[0].queries.is_empty());
    assert!(!records[1].queries.is_empty());
}

const WITH_FINALIZED: &str = "\
[1] Smith, J. (2020). Radio Days in America. Acme Press. Relevance: Shows early broadcasting. FLAGS[FINALIZED] PRIMARY_URL[https://curated.example/keep]

[2] Lee, K. (2018). Television and Memory. Beacon Press. Relevance: Memory studies.
";

fn assert_curated_record_untouched(config: &Config) {
    let records = reload(config);
    assert!(records[0].is_finalized());
    assert_eq!(records[0].primary_url.as_deref(), Some("https://curated.example/keep"));
    assert!(records[0].secondary_url.is_none());
    assert!(records[0].queries.is_empty());
    assert!(!records[1].queries.is_empty());

    let checkpoint = CheckpointStore::new(&config.checkpoint_file).load().unwrap();
    assert!(!checkpoint.is_completed(1));
    assert!(checkpoint.is_completed(2));
}

#[tokio::test]
async fn test_range_selection_never_touches_finalized_records() {
    let (_dir, mut config) = setup();
    fs::write(&config.decisions_file, WITH_FINALIZED).unwrap();
    config.selection_mode = reference_refinement::config::SelectionMode::Range;
    config.range_start = Some(1);
    config.range_end = Some(2);

    let summary = app_with(config.clone(), None, 95).run(false).await.unwrap();
    assert_eq!(summary.selected, 1);
    assert_eq!(summary.processed, 1);
    assert!(!summary.attention_ids().contains(&1));
    assert_curated_record_untouched(&config);
}

#[tokio::test]
async fn test_finalized_records_are_skipped_even_when_criteria_allow_them() {
    let (_dir, mut config) = setup();
    fs::write(&config.decisions_file, WITH_FINALIZED).unwrap();
    config.selection_mode = reference_refinement::config::SelectionMode::Criteria;
    config.not_finalized = false;

    let summary = app_with(config.clone(), None, 95).run(false).await.unwrap();
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped_finalized, 1);
    assert_curated_record_untouched(&config);
}

#[tokio::test]
async fn test_missing_decisions_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    assert!(app_with(config, None, 95).run(false).await.is_err());
}

#[tokio::test]
#[ignore] // 默认忽略，需要真实 API 凭据：cargo test -- --ignored
async fn test_real_services_single_record() {
    reference_refinement::utils::logging::init(true);

    let (_dir, mut config) = setup();
    let real = Config::load(None).unwrap();
    config.llm_api_key = real.llm_api_key;
    config.google_api_key = real.google_api_key;
    config.google_cx = real.google_cx;
    config.selection_mode = reference_refinement::config::SelectionMode::Range;
    config.range_start = Some(1);
    config.range_end = Some(1);

    let app = App::initialize(config).expect("初始化失败");
    let summary = app.run(false).await.expect("运行失败");
    assert_eq!(summary.processed + summary.errored.len(), 1);
}
