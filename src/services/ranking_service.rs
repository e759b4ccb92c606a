//! 候选排序服务 - 业务能力层
//!
//! 只负责"给候选链接打分"能力，不关心流程
//!
//! 每个候选同时得到两个分数：作为主链接（作品本身）和作为次链接（评论、综述）。

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::clients::LlmClient;
use crate::error::{AppResult, LlmError};
use crate::models::{CandidateScore, CitationRecord, SearchCandidate};
use crate::services::search_service::normalize_url;
use crate::services::Ranker;

const SYSTEM_PROMPT: &str = "You evaluate web search results for academic references. \
You answer with JSON only.";

/// 单个候选在提示词中展示的摘要长度上限
const SNIPPET_LIMIT: usize = 300;

/// JSON 对象数组的开头
static ARRAY_START_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\s*\{").unwrap());

/// 基于 LLM 的候选排序
pub struct LlmRanker {
    llm: LlmClient,
}

impl LlmRanker {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

/// 构建排序提示词
pub fn build_rank_prompt(record: &CitationRecord, candidates: &[SearchCandidate]) -> String {
    let mut listing = String::new();
    for (idx, c) in candidates.iter().enumerate() {
        listing.push_str(&format!(
            "[{}] {}\n    URL: {}\n    Snippet: {}\n",
            idx,
            display_title(c),
            c.url,
            crate::utils::logging::truncate_text(&c.snippet, SNIPPET_LIMIT)
        ));
    }

    format!(
        r#"Reference: {citation}
Relevance: {relevance}

Candidates:
{listing}
Score every candidate twice, 0-100:
- primary_score: how likely the URL is the work itself (full text, publisher or archive page of this exact edition)
- secondary_score: how useful the URL is as a review, summary or scholarly discussion of this work

Return a JSON array only:
[{{"index": 0, "primary_score": 85, "secondary_score": 20, "rationale": "one sentence"}}]"#,
        citation = record.citation_text(),
        relevance = record.relevance.as_deref().unwrap_or("(none)"),
        listing = listing,
    )
}

/// 没有标题的候选用规范化后的链接代替
fn display_title(candidate: &SearchCandidate) -> String {
    if candidate.title.trim().is_empty() {
        normalize_url(&candidate.url)
    } else {
        candidate.title.clone()
    }
}

#[async_trait]
impl Ranker for LlmRanker {
    async fn rank(
        &self,
        record: &CitationRecord,
        candidates: &[SearchCandidate],
    ) -> AppResult<Vec<CandidateScore>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = build_rank_prompt(record, candidates);
        let response = self.llm.chat(SYSTEM_PROMPT, &prompt, 2048).await?;
        let scores = parse_rank_response(&response, candidates.len())?;
        debug!(
            "[RID {}] 排序完成: {}/{} 个候选有分数",
            record.id,
            scores.len(),
            candidates.len()
        );
        Ok(scores)
    }
}

#[derive(Debug, Deserialize)]
struct RawScore {
    index: usize,
    #[serde(default)]
    primary_score: f64,
    #[serde(default)]
    secondary_score: f64,
    #[serde(default)]
    rationale: String,
}

/// 解析排序响应
///
/// 容忍代码块包裹和前后说明文字；越界或重复的下标丢弃，分数截断到 0-100。
pub fn parse_rank_response(response: &str, candidate_count: usize) -> AppResult<Vec<CandidateScore>> {
    // 跳过说明文字里的 `[0]` 之类，优先找 `[{`
    let start = ARRAY_START_RE
        .find(response)
        .map(|m| m.start())
        .or_else(|| response.find('['));
    let json = match (start, response.rfind(']')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => {
            return Err(LlmError::UnparsableResponse {
                reason: format!(
                    "排序结果中没有 JSON 数组: {}",
                    crate::utils::logging::truncate_text(response, 120)
                ),
            }
            .into())
        }
    };

    let raw: Vec<RawScore> = serde_json::from_str(json).map_err(|e| LlmError::UnparsableResponse {
        reason: format!("排序结果 JSON 解析失败: {}", e),
    })?;

    let mut scores: Vec<CandidateScore> = Vec::with_capacity(raw.len());
    for item in raw {
        if item.index >= candidate_count {
            warn!("排序结果下标 {} 超出范围 [0, {})，已忽略", item.index, candidate_count);
            continue;
        }
        if scores.iter().any(|s| s.index == item.index) {
            continue;
        }
        scores.push(CandidateScore {
            index: item.index,
            primary_score: clamp_score(item.primary_score),
            secondary_score: clamp_score(item.secondary_score),
            rationale: item.rationale,
        });
    }
    Ok(scores)
}

fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}
