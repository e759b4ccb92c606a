use serde::{Deserialize, Serialize};

/// 候选链接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchCandidate {
    /// 由记录中已有的链接构造一个不带标签的候选
    ///
    /// 不标注它原来是主链接还是次链接，和新搜索到的候选公平竞争。
    pub fn unlabeled(url: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            url: url.into(),
            snippet: String::new(),
        }
    }
}

/// 排序服务对单个候选的打分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// 候选在输入列表中的下标（0-based）
    pub index: usize,
    /// 作为主链接的得分 (0-100)
    pub primary_score: u8,
    /// 作为次链接的得分 (0-100)
    pub secondary_score: u8,
    #[serde(default)]
    pub rationale: String,
}

/// 链接可访问性校验结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    /// 内容可直接访问（score >= 90）
    pub accessible: bool,
    /// 0-100
    pub score: u8,
    pub paywall: bool,
    pub login_required: bool,
    pub preview_only: bool,
    /// HTTP 200 但页面内容是错误提示
    pub soft_404: bool,
    /// 页面内容与引用信息吻合
    pub content_matches: bool,
    pub reason: String,
}

impl ValidationResult {
    /// 无法访问（连接失败、HTTP 错误等）
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Default::default()
        }
    }
}
