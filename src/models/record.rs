use serde::Serialize;

use crate::error::RecordError;
use crate::models::flags::{FlagSet, FINALIZED, MANUAL_REVIEW};

/// 一条文献记录
///
/// 对应 decisions.txt 中以 `[N]` 开头的一行，以及紧随其后的 `Q:` 行。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitationRecord {
    /// 记录ID（稳定，不会重新生成）
    pub id: u32,
    pub authors: String,
    pub year: Option<u16>,
    pub title: String,
    /// 出版信息等其他内容
    pub other_info: String,
    /// 相关性说明，输出时总是带 `Relevance:` 标签
    pub relevance: Option<String>,
    pub primary_url: Option<String>,
    pub secondary_url: Option<String>,
    pub tertiary_url: Option<String>,
    /// 最近一次生成的搜索语句（每次运行覆盖）
    pub queries: Vec<String>,
    pub flags: FlagSet,
    /// 记录行之后既不是 `Q:` 也不是新记录的行，原样保留
    pub notes: Vec<String>,
}

impl CitationRecord {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.flags.contains(FINALIZED)
    }

    pub fn has_primary_url(&self) -> bool {
        self.primary_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    pub fn has_secondary_url(&self) -> bool {
        self.secondary_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// 标记为终稿
    ///
    /// 没有主链接时拒绝；成功后清除所有人工复核标记。
    pub fn finalize(&mut self) -> Result<(), RecordError> {
        if !self.has_primary_url() {
            return Err(RecordError::MissingPrimaryUrl { id: self.id });
        }
        self.flags.clear_manual_review();
        self.flags.insert(FINALIZED);
        Ok(())
    }

    /// 标记为需要人工复核（已是终稿时不做处理）
    pub fn flag_for_review(&mut self) {
        if !self.is_finalized() {
            self.flags.insert(MANUAL_REVIEW);
        }
    }

    /// 用于校验和提示词的完整引用文本
    pub fn citation_text(&self) -> String {
        let mut text = self.authors.clone();
        if let Some(year) = self.year {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&format!("({})", year));
        }
        push_sentence(&mut text, &self.title);
        push_sentence(&mut text, &self.other_info);
        text
    }
}

/// 追加一个句子：前文不以句末标点结尾时补上 `.`，再以空格分隔
pub(crate) fn push_sentence(buf: &mut String, sentence: &str) {
    if sentence.is_empty() {
        return;
    }
    if !buf.is_empty() {
        if !ends_with_terminal(buf) {
            buf.push('.');
        }
        buf.push(' ');
    }
    buf.push_str(sentence);
}

/// 是否以句末标点结尾
pub(crate) fn ends_with_terminal(text: &str) -> bool {
    text.ends_with(['.', '?', '!'])
}

/// 单条记录的简要信息（用于报告输出）
#[derive(Debug, Clone, Serialize)]
pub struct RecordBrief {
    pub id: u32,
    pub title: String,
    pub primary_url: Option<String>,
}

impl From<&CitationRecord> for RecordBrief {
    fn from(record: &CitationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            primary_url: record.primary_url.clone(),
        }
    }
}
