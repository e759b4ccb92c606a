use std::fmt;

/// 解析问题（非致命）
///
/// 每条记录缺失的字段都会以 issue 的形式上报，不会中断解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIssue {
    MissingAuthors,
    MissingYear,
    MissingTitle,
    MissingRelevance,
    /// 带 FINALIZED 标记但没有主链接
    FinalizedWithoutPrimary,
    /// 记录之前出现的无法归属的行（行号从 1 开始）
    StrayLine { line_no: usize },
    /// ID 重复
    DuplicateId,
    /// 形如记录行，但 ID 超出范围
    InvalidId { line_no: usize, raw: String },
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIssue::MissingAuthors => write!(f, "缺少作者"),
            ParseIssue::MissingYear => write!(f, "缺少年份"),
            ParseIssue::MissingTitle => write!(f, "缺少标题"),
            ParseIssue::MissingRelevance => write!(f, "缺少相关性说明"),
            ParseIssue::FinalizedWithoutPrimary => write!(f, "已标记 FINALIZED 但没有主链接"),
            ParseIssue::StrayLine { line_no } => write!(f, "第 {} 行无法归属到任何记录", line_no),
            ParseIssue::DuplicateId => write!(f, "ID 重复"),
            ParseIssue::InvalidId { line_no, raw } => write!(f, "第 {} 行的 ID [{}] 无效", line_no, raw),
        }
    }
}

/// 某条记录（或文件头部）的问题列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIssues {
    /// 文件头部或 ID 无效的行没有 ID
    pub id: Option<u32>,
    pub issues: Vec<ParseIssue>,
}
