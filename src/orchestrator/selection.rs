//! 记录选择
//!
//! 决定本次运行要处理哪些记录。所有条件按 AND 组合，结果按 ID 升序。

use std::ops::RangeInclusive;

use crate::config::{Config, SelectionMode};
use crate::models::CitationRecord;

/// 记录选择条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub id_range: Option<RangeInclusive<u32>>,
    pub not_finalized: bool,
    pub missing_primary: bool,
    pub missing_secondary: bool,
    pub missing_queries: bool,
    /// 只取前 N 条
    pub limit: Option<usize>,
}

impl Selection {
    /// 按 ID 范围选择（含两端）
    pub fn range(start: u32, end: u32) -> Self {
        Self {
            id_range: Some(start..=end),
            ..Default::default()
        }
    }

    /// 根据配置构建
    ///
    /// - `range`：ID 范围内未终稿的记录
    /// - `criteria`：按配置中的各项字段条件
    /// - `all_incomplete`：所有未终稿的记录
    pub fn from_config(config: &Config) -> Self {
        let base = match config.selection_mode {
            SelectionMode::Range => Self {
                id_range: Some(config.range_start.unwrap_or(1)..=config.range_end.unwrap_or(u32::MAX)),
                not_finalized: true,
                ..Default::default()
            },
            SelectionMode::Criteria => Self {
                id_range: None,
                not_finalized: config.not_finalized,
                missing_primary: config.missing_primary,
                missing_secondary: config.missing_secondary,
                missing_queries: config.missing_queries,
                limit: None,
            },
            SelectionMode::AllIncomplete => Self {
                not_finalized: true,
                ..Default::default()
            },
        };
        Self {
            limit: config.limit,
            ..base
        }
    }

    /// 单条记录是否满足所有条件
    pub fn matches(&self, record: &CitationRecord) -> bool {
        if let Some(range) = &self.id_range {
            if !range.contains(&record.id) {
                return false;
            }
        }
        if self.not_finalized && record.is_finalized() {
            return false;
        }
        if self.missing_primary && record.has_primary_url() {
            return false;
        }
        if self.missing_secondary && record.has_secondary_url() {
            return false;
        }
        if self.missing_queries && !record.queries.is_empty() {
            return false;
        }
        true
    }

    /// 返回选中的记录 ID（升序，按 `limit` 截断）
    pub fn apply(&self, records: &[CitationRecord]) -> Vec<u32> {
        let mut ids: Vec<u32> = records.iter().filter(|r| self.matches(r)).map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if let Some(limit) = self.limit {
            ids.truncate(limit);
        }
        ids
    }

    /// 日志用的条件描述
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(range) = &self.id_range {
            parts.push(format!("ID {}-{}", range.start(), range.end()));
        }
        if self.not_finalized {
            parts.push("未终稿".to_string());
        }
        if self.missing_primary {
            parts.push("缺主链接".to_string());
        }
        if self.missing_secondary {
            parts.push("缺次链接".to_string());
        }
        if self.missing_queries {
            parts.push("无搜索语句".to_string());
        }
        if let Some(limit) = self.limit {
            parts.push(format!("最多 {} 条", limit));
        }
        if parts.is_empty() {
            "全部记录".to_string()
        } else {
            parts.join(" + ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32) -> CitationRecord {
        CitationRecord::new(id)
    }

    fn sample() -> Vec<CitationRecord> {
        let mut records: Vec<CitationRecord> = [5, 1, 3, 2, 8, 4].into_iter().map(record).collect();
        records[1].primary_url = Some("https://example.org/1".to_string());
        records[1].finalize().unwrap();
        records[2].primary_url = Some("https://example.org/3".to_string());
        records[3].queries = vec!["q".to_string()];
        records
    }

    #[test]
    fn test_range_returns_exactly_the_ids_inside() {
        let records = sample();
        assert_eq!(Selection::range(2, 5).apply(&records), vec![2, 3, 4, 5]);
        assert_eq!(Selection::range(6, 7).apply(&records), Vec::<u32>::new());
        assert_eq!(Selection::range(8, 8).apply(&records), vec![8]);
    }

    #[test]
    fn test_predicates_compose_with_and() {
        let records = sample();
        let selection = Selection {
            not_finalized: true,
            missing_primary: true,
            ..Default::default()
        };
        assert_eq!(selection.apply(&records), vec![2, 4, 5, 8]);

        let selection = Selection {
            missing_queries: true,
            id_range: Some(1..=3),
            ..Default::default()
        };
        assert_eq!(selection.apply(&records), vec![1, 3]);
    }

    #[test]
    fn test_limit_truncates_after_sorting() {
        let records = sample();
        let selection = Selection {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(selection.apply(&records), vec![1, 2]);
    }

    #[test]
    fn test_from_config_modes() {
        let mut config = Config::default();
        assert_eq!(Selection::from_config(&config).apply(&sample()), vec![2, 3, 4, 5, 8]);

        config.selection_mode = SelectionMode::Range;
        config.range_start = Some(3);
        config.range_end = Some(4);
        assert_eq!(Selection::from_config(&config).apply(&sample()), vec![3, 4]);

        // 范围内的终稿记录不会被选中
        config.range_start = Some(1);
        assert_eq!(Selection::from_config(&config).apply(&sample()), vec![2, 3, 4]);

        config.selection_mode = SelectionMode::Criteria;
        config.not_finalized = false;
        config.missing_secondary = true;
        config.limit = Some(3);
        assert_eq!(Selection::from_config(&config).apply(&sample()), vec![1, 2, 3]);
    }
}
