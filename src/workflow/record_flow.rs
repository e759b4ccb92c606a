//! 记录处理流程 - 流程层
//!
//! 核心职责：定义"一条记录"的完整处理流程
//!
//! 流程顺序：
//! 1. 生成搜索语句
//! 2. 逐条搜索，合并去重；已有的主/次链接作为不带标签的候选加入
//! 3. LLM 打分
//! 4. 按分数校验排名靠前的候选
//! 5. 分配主/次链接，找不到合格主链接时标记人工复核
//! 6. （可选）满足条件时自动标记终稿
//!
//! 状态：`Pending → QueriesGenerated → CandidatesFound → Ranked → Validated
//! → {Assigned | FlaggedForReview} → [Finalized]`

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{CandidateScore, CitationRecord, SearchCandidate, ValidationResult, MANUAL_REVIEW};
use crate::services::search_service::{merge_candidates, normalize_url};
use crate::services::url_validator::is_paywall_domain;
use crate::services::{QueryGenerator, Ranker, UrlValidator, WebSearch};
use crate::utils::logging::truncate_text;
use crate::utils::{with_retry, RetryPolicy};
use crate::workflow::record_ctx::RecordCtx;

const TITLE_STOP_WORDS: &[&str] = &["the", "and", "of", "in", "a", "an", "to", "for", "on", "with", "by", "from"];

/// 记录处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    QueriesGenerated,
    CandidatesFound,
    Ranked,
    Validated,
    Assigned,
    FlaggedForReview,
    Finalized,
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordState::Pending => "待处理",
            RecordState::QueriesGenerated => "已生成搜索语句",
            RecordState::CandidatesFound => "已找到候选",
            RecordState::Ranked => "已打分",
            RecordState::Validated => "已校验",
            RecordState::Assigned => "已分配链接",
            RecordState::FlaggedForReview => "待人工复核",
            RecordState::Finalized => "已终稿",
        };
        write!(f, "{}", name)
    }
}

/// 自动终稿条件
#[derive(Debug, Clone, Copy)]
pub struct AutoFinalize {
    pub enabled: bool,
    pub min_score: u8,
    pub max_warnings: usize,
}

/// 流程参数
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub min_primary_score: u8,
    pub min_secondary_score: u8,
    pub validate_top_n: usize,
    pub delay_between_searches: Duration,
    pub auto_finalize: AutoFinalize,
    pub batch_flag: Option<String>,
    pub retry: RetryPolicy,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_primary_score: config.min_primary_score,
            min_secondary_score: config.min_secondary_score,
            validate_top_n: config.validate_top_n.max(1),
            delay_between_searches: Duration::from_millis(config.delay_between_searches_ms),
            auto_finalize: AutoFinalize {
                enabled: config.auto_finalize,
                min_score: config.auto_finalize_min_score,
                max_warnings: config.auto_finalize_max_warnings,
            },
            batch_flag: config.batch_flag.clone().filter(|f| !f.trim().is_empty()),
            retry: config.retry_policy(),
        }
    }
}

/// 选中的链接
#[derive(Debug, Clone)]
pub struct ChosenLink {
    pub url: String,
    pub title: String,
    pub score: u8,
    pub validation: ValidationResult,
}

/// 单条记录的处理结果
#[derive(Debug, Clone)]
pub struct RecordReport {
    pub id: u32,
    pub state: RecordState,
    pub candidates: usize,
    pub primary: Option<ChosenLink>,
    pub secondary: Option<ChosenLink>,
    /// 自动终稿检查中的警告
    pub warnings: Vec<String>,
}

impl RecordReport {
    fn new(id: u32) -> Self {
        Self {
            id,
            state: RecordState::Pending,
            candidates: 0,
            primary: None,
            secondary: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self.state, RecordState::Assigned | RecordState::Finalized)
    }
}

/// 记录处理流程
///
/// - 编排完整的单条记录处理流程
/// - 只依赖业务能力（services 中的 trait）
/// - 不读写文件，结果直接写回传入的记录
pub struct RecordFlow {
    query_generator: Arc<dyn QueryGenerator>,
    web_search: Arc<dyn WebSearch>,
    ranker: Arc<dyn Ranker>,
    validator: Arc<dyn UrlValidator>,
    settings: FlowSettings,
}

impl RecordFlow {
    pub fn new(
        query_generator: Arc<dyn QueryGenerator>,
        web_search: Arc<dyn WebSearch>,
        ranker: Arc<dyn Ranker>,
        validator: Arc<dyn UrlValidator>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            query_generator,
            web_search,
            ranker,
            validator,
            settings,
        }
    }

    /// 处理一条记录
    ///
    /// 返回 `Err` 时记录可能已被部分修改，调用方应丢弃它。
    pub async fn run(&self, record: &mut CitationRecord, ctx: &RecordCtx) -> AppResult<RecordReport> {
        let mut report = RecordReport::new(record.id);
        let retry = &self.settings.retry;

        // ========== 1. 生成搜索语句 ==========
        info!("{} 🧠 正在生成搜索语句...", ctx);
        let queries = {
            let generator = &self.query_generator;
            let snapshot: &CitationRecord = record;
            with_retry(retry, "生成搜索语句", move || generator.generate(snapshot)).await?
        };
        record.queries = queries;
        report.state = RecordState::QueriesGenerated;
        info!("{} ✓ 生成 {} 条搜索语句", ctx, record.queries.len());

        // ========== 2. 搜索并合并候选 ==========
        let mut candidates: Vec<SearchCandidate> = Vec::new();
        for (i, query) in record.queries.iter().enumerate() {
            if i > 0 && !self.settings.delay_between_searches.is_zero() {
                sleep(self.settings.delay_between_searches).await;
            }
            let search = &self.web_search;
            let query_ref = query.as_str();
            let results = with_retry(retry, "网页搜索", move || search.search(query_ref)).await?;
            debug!("{}   \"{}\" → {} 条结果", ctx, truncate_text(query, 60), results.len());
            merge_candidates(&mut candidates, results);
        }

        let existing = [record.primary_url.clone(), record.secondary_url.clone()];
        merge_candidates(
            &mut candidates,
            existing
                .into_iter()
                .flatten()
                .filter(|u| !u.trim().is_empty())
                .map(SearchCandidate::unlabeled),
        );
        report.candidates = candidates.len();

        if candidates.is_empty() {
            warn!("{} ⚠️ 没有找到任何候选链接，标记人工复核", ctx);
            self.flag_for_review(record, &mut report);
            return Ok(report);
        }
        report.state = RecordState::CandidatesFound;
        info!("{} ✓ 共 {} 个候选链接", ctx, candidates.len());

        // ========== 3. 打分 ==========
        let scores = {
            let ranker = &self.ranker;
            let snapshot: &CitationRecord = record;
            let candidates_ref = candidates.as_slice();
            with_retry(retry, "候选打分", move || ranker.rank(snapshot, candidates_ref)).await?
        };
        report.state = RecordState::Ranked;

        // ========== 4. 校验 ==========
        let citation = record.citation_text();
        let primary_order = top_by(&scores, self.settings.min_primary_score, self.settings.validate_top_n, |s| {
            s.primary_score
        });
        let secondary_order = top_by(
            &scores,
            self.settings.min_secondary_score,
            self.settings.validate_top_n,
            |s| s.secondary_score,
        );

        let mut cache: HashMap<String, ValidationResult> = HashMap::new();
        let mut primary: Option<ChosenLink> = None;
        for score in &primary_order {
            let Some(candidate) = candidates.get(score.index) else {
                continue;
            };
            let validation = self.validate_cached(&mut cache, &candidate.url, &citation).await;
            log_validation(ctx, "主", candidate, score.primary_score, &validation);
            if validation.accessible {
                primary = Some(ChosenLink {
                    url: candidate.url.clone(),
                    title: candidate.title.clone(),
                    score: score.primary_score,
                    validation,
                });
                break;
            }
        }

        let taken_primary = primary
            .as_ref()
            .map(|p| p.url.clone())
            .or_else(|| record.primary_url.clone())
            .map(|u| normalize_url(&u));
        let mut secondary: Option<ChosenLink> = None;
        for score in &secondary_order {
            let Some(candidate) = candidates.get(score.index) else {
                continue;
            };
            if taken_primary.as_deref() == Some(normalize_url(&candidate.url).as_str()) {
                continue;
            }
            let validation = self.validate_cached(&mut cache, &candidate.url, &citation).await;
            log_validation(ctx, "次", candidate, score.secondary_score, &validation);
            if validation.accessible || validation.login_required {
                secondary = Some(ChosenLink {
                    url: candidate.url.clone(),
                    title: candidate.title.clone(),
                    score: score.secondary_score,
                    validation,
                });
                break;
            }
        }
        report.state = RecordState::Validated;

        // ========== 5. 分配 ==========
        if let Some(link) = &secondary {
            record.secondary_url = Some(link.url.clone());
        }
        match &primary {
            Some(link) => {
                record.primary_url = Some(link.url.clone());
                // 新主链接与旧的次链接重复时清掉次链接
                if secondary.is_none()
                    && record
                        .secondary_url
                        .as_deref()
                        .is_some_and(|u| normalize_url(u) == normalize_url(&link.url))
                {
                    record.secondary_url = None;
                }
                record.flags.remove(MANUAL_REVIEW);
                report.state = RecordState::Assigned;
                info!(
                    "{} ✅ 主链接 ({}分): {}",
                    ctx,
                    link.score,
                    truncate_text(&link.url, 80)
                );
                if let Some(sec) = &secondary {
                    info!("{} ✅ 次链接 ({}分): {}", ctx, sec.score, truncate_text(&sec.url, 80));
                }
            }
            None => {
                warn!("{} ⚠️ 没有达到 {} 分且可访问的主链接，标记人工复核", ctx, self.settings.min_primary_score);
                self.flag_for_review(record, &mut report);
            }
        }
        report.primary = primary;
        report.secondary = secondary;

        if let Some(flag) = &self.settings.batch_flag {
            record.flags.insert(flag);
        }

        // ========== 6. 自动终稿 ==========
        if report.state == RecordState::Assigned && self.settings.auto_finalize.enabled {
            self.try_auto_finalize(record, &mut report, ctx)?;
        }

        Ok(report)
    }

    fn flag_for_review(&self, record: &mut CitationRecord, report: &mut RecordReport) {
        record.flag_for_review();
        if let Some(flag) = &self.settings.batch_flag {
            record.flags.insert(flag);
        }
        report.state = RecordState::FlaggedForReview;
    }

    async fn validate_cached(
        &self,
        cache: &mut HashMap<String, ValidationResult>,
        url: &str,
        citation: &str,
    ) -> ValidationResult {
        let key = normalize_url(url);
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }
        let result = self.validator.validate(url, citation).await;
        cache.insert(key, result.clone());
        result
    }

    fn try_auto_finalize(
        &self,
        record: &mut CitationRecord,
        report: &mut RecordReport,
        ctx: &RecordCtx,
    ) -> AppResult<()> {
        let Some(primary) = &report.primary else {
            return Ok(());
        };
        let rules = self.settings.auto_finalize;

        if primary.score < rules.min_score {
            debug!("{} 主链接 {} 分，未达到自动终稿要求 {}", ctx, primary.score, rules.min_score);
            return Ok(());
        }
        let title_ok = if primary.title.is_empty() {
            primary.validation.content_matches
        } else {
            title_matches(&record.title, &primary.title)
        };
        if !title_ok {
            debug!("{} 主链接标题与记录标题不符，不自动终稿", ctx);
            return Ok(());
        }

        let warnings = finalize_warnings(record, primary);
        if warnings.len() > rules.max_warnings {
            info!("{} 自动终稿跳过: {} 条警告 ({})", ctx, warnings.len(), warnings.join("; "));
            report.warnings = warnings;
            return Ok(());
        }

        record.finalize()?;
        report.warnings = warnings;
        report.state = RecordState::Finalized;
        info!("{} 🏁 已自动标记为 FINALIZED", ctx);
        Ok(())
    }
}

/// 分数不低于 `min` 的候选，按分数降序取前 `n` 个（同分保持原顺序）
fn top_by(scores: &[CandidateScore], min: u8, n: usize, key: impl Fn(&CandidateScore) -> u8) -> Vec<CandidateScore> {
    let mut picked: Vec<CandidateScore> = scores.iter().filter(|&s| key(s) >= min).cloned().collect();
    picked.sort_by(|a, b| key(b).cmp(&key(a)));
    picked.truncate(n);
    picked
}

fn significant_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 3 && !TITLE_STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// 记录标题前 5 个关键词中至少一半出现在候选标题里
pub fn title_matches(record_title: &str, candidate_title: &str) -> bool {
    let words: Vec<String> = significant_words(record_title).into_iter().take(5).collect();
    if words.is_empty() {
        return true;
    }
    let candidate = candidate_title.to_lowercase();
    let found = words.iter().filter(|w| candidate.contains(w.as_str())).count();
    found * 2 >= words.len()
}

/// 自动终稿的警告项
pub fn finalize_warnings(record: &CitationRecord, primary: &ChosenLink) -> Vec<String> {
    let mut warnings = Vec::new();
    if !record.has_secondary_url() {
        warnings.push("没有次链接".to_string());
    }
    if !primary.validation.content_matches {
        warnings.push("主链接内容未与引用信息核对".to_string());
    }
    if is_paywall_domain(&primary.url) {
        warnings.push("主链接属于付费数据库域名".to_string());
    }
    warnings
}

fn log_validation(ctx: &RecordCtx, role: &str, candidate: &SearchCandidate, score: u8, v: &ValidationResult) {
    let status = if v.accessible {
        "✅"
    } else if v.login_required {
        "🔒"
    } else if v.paywall {
        "💰"
    } else {
        "❌"
    };
    debug!(
        "{}   {} [{}] {}分 校验{}分 {} ({})",
        ctx,
        status,
        role,
        score,
        v.score,
        truncate_text(&candidate.url, 70),
        v.reason
    );
}
