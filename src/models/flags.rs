//! 标记集合
//!
//! `FLAGS[...]` 里的标记：保持首次出现的顺序，重复项合并，
//! 比较时不关心顺序。

use std::fmt;

/// 终稿标记
pub const FINALIZED: &str = "FINALIZED";

/// 人工复核标记（写入时使用的规范形式）
pub const MANUAL_REVIEW: &str = "MANUAL_REVIEW";

/// 所有被视为"需要人工复核"的标记
pub const MANUAL_REVIEW_FLAGS: &[&str] = &[MANUAL_REVIEW, "NEEDS_REVIEW", "NEEDS_DEEP_VALIDATION"];

#[derive(Debug, Clone, Default, Eq)]
pub struct FlagSet(Vec<String>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从空格分隔的文本解析
    pub fn parse(text: &str) -> Self {
        let mut set = Self::new();
        for token in text.split_whitespace() {
            set.insert(token);
        }
        set
    }

    /// 插入标记，已存在时返回 false
    pub fn insert(&mut self, flag: impl AsRef<str>) -> bool {
        let flag = flag.as_ref().trim();
        if flag.is_empty() || self.contains(flag) {
            return false;
        }
        self.0.push(flag.to_string());
        true
    }

    pub fn remove(&mut self, flag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|f| f != flag);
        self.0.len() != before
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|f| f == flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否包含任意一个人工复核标记
    pub fn needs_manual_review(&self) -> bool {
        MANUAL_REVIEW_FLAGS.iter().any(|f| self.contains(f))
    }

    /// 清除所有人工复核标记
    pub fn clear_manual_review(&mut self) {
        self.0
            .retain(|f| !MANUAL_REVIEW_FLAGS.contains(&f.as_str()));
    }
}

impl PartialEq for FlagSet {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|f| other.contains(f))
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

impl<S: AsRef<str>> FromIterator<S> for FlagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}
