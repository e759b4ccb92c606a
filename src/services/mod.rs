//! 业务能力层（Services）
//!
//! 每个能力描述"我能做什么"，只处理单条记录，不关心流程顺序。
//! 流程层只依赖这里的 trait，测试时可以换成进程内的假实现。

pub mod query_service;
pub mod ranking_service;
pub mod search_service;
pub mod url_validator;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{CandidateScore, CitationRecord, SearchCandidate, ValidationResult};

pub use query_service::LlmQueryGenerator;
pub use ranking_service::LlmRanker;
pub use search_service::GoogleWebSearch;
pub use url_validator::HttpUrlValidator;

/// 搜索语句生成
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, record: &CitationRecord) -> AppResult<Vec<String>>;
}

/// 网页搜索
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> AppResult<Vec<SearchCandidate>>;
}

/// 候选打分
#[async_trait]
pub trait Ranker: Send + Sync {
    /// 返回的分数通过 `index` 对应 `candidates` 中的位置，未打分的候选不出现
    async fn rank(
        &self,
        record: &CitationRecord,
        candidates: &[SearchCandidate],
    ) -> AppResult<Vec<CandidateScore>>;
}

/// 链接校验
///
/// 校验失败不是错误：无法访问的链接得到 0 分的结果。
#[async_trait]
pub trait UrlValidator: Send + Sync {
    async fn validate(&self, url: &str, citation: &str) -> ValidationResult;
}
