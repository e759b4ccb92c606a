//! 交互命令
//!
//! `stats` / `check` / `finalize` / `export-clean`，和批处理共用同一个 [`DecisionsStore`]。

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::decisions::{format_clean, DecisionsDocument};
use crate::error::RecordError;
use crate::infrastructure::{write_atomic, DecisionsStore};
use crate::models::{CitationRecord, RecordBrief, RecordIssues};
use crate::utils::logging::truncate_text;

/// 文件整体状态
#[derive(Debug, Clone, Default)]
pub struct DocumentStats {
    pub total: usize,
    pub finalized: usize,
    pub with_primary: usize,
    pub with_secondary: usize,
    pub needs_review: usize,
    pub with_queries: usize,
    pub unfinalized: Vec<RecordBrief>,
}

impl DocumentStats {
    pub fn from_document(document: &DecisionsDocument) -> Self {
        let mut stats = Self {
            total: document.records.len(),
            ..Default::default()
        };
        for record in &document.records {
            if record.is_finalized() {
                stats.finalized += 1;
            } else {
                stats.unfinalized.push(RecordBrief::from(record));
            }
            if record.has_primary_url() {
                stats.with_primary += 1;
            }
            if record.has_secondary_url() {
                stats.with_secondary += 1;
            }
            if record.flags.needs_manual_review() {
                stats.needs_review += 1;
            }
            if !record.queries.is_empty() {
                stats.with_queries += 1;
            }
        }
        stats
    }

    fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total as f64
        }
    }
}

/// 统计并打印文件状态
pub fn stats(store: &DecisionsStore) -> Result<DocumentStats> {
    let document = store.load()?.document;
    let stats = DocumentStats::from_document(&document);

    info!("{}", "=".repeat(60));
    info!("📊 {} 状态", store.path().display());
    info!("{}", "=".repeat(60));
    info!("记录总数: {}", stats.total);
    info!("🏁 已终稿: {} ({:.1}%)", stats.finalized, stats.percent(stats.finalized));
    info!("🔗 有主链接: {} ({:.1}%)", stats.with_primary, stats.percent(stats.with_primary));
    info!("🔗 有次链接: {} ({:.1}%)", stats.with_secondary, stats.percent(stats.with_secondary));
    info!("🔍 有搜索语句: {}", stats.with_queries);
    info!("⚠️ 待人工复核: {}", stats.needs_review);
    if !stats.unfinalized.is_empty() {
        info!("{}", "─".repeat(60));
        info!("未终稿的记录:");
        for brief in &stats.unfinalized {
            let marker = if brief.primary_url.is_some() { "🔗" } else { "  " };
            info!("  {} [RID {}] {}", marker, brief.id, truncate_text(&brief.title, 70));
        }
    }
    info!("{}", "=".repeat(60));
    Ok(stats)
}

/// 检查解析问题并打印
pub fn check(store: &DecisionsStore) -> Result<Vec<RecordIssues>> {
    let parsed = store.load()?;
    if parsed.issues.is_empty() {
        info!("✅ {} 条记录均未发现问题", parsed.document.records.len());
        return Ok(parsed.issues);
    }

    for entry in &parsed.issues {
        let label = match entry.id {
            Some(id) => format!("[RID {}]", id),
            None => "[无ID]".to_string(),
        };
        let text: Vec<String> = entry.issues.iter().map(ToString::to_string).collect();
        warn!("{} {}", label, text.join("；"));
    }
    warn!("⚠️ 共 {} 条记录存在问题", parsed.issues.len());
    Ok(parsed.issues)
}

/// 将单条记录标记为终稿
///
/// 没有主链接时拒绝；成功后备份并保存文件。
pub fn finalize(store: &DecisionsStore, id: u32) -> Result<CitationRecord> {
    let mut document = store.load_unique()?.document;
    let Some(record) = document.get_mut(id) else {
        return Err(RecordError::NotFound { id }.into());
    };
    if record.is_finalized() {
        info!("[RID {}] 已经是终稿，无需处理", id);
        return Ok(record.clone());
    }
    record.finalize()?;
    let finalized = record.clone();

    store.save(&document)?;
    info!("[RID {}] 🏁 已标记为 FINALIZED", id);
    Ok(finalized)
}

/// 导出终稿记录的干净版本（无标记、链接、搜索语句和备注）
pub fn export_clean(store: &DecisionsStore, output: &Path) -> Result<usize> {
    let document = store.load()?.document;
    let lines: Vec<String> = document
        .records
        .iter()
        .filter(|r| r.is_finalized())
        .map(format_clean)
        .collect();

    let mut content = lines.join("\n\n");
    if !content.is_empty() {
        content.push('\n');
    }
    write_atomic(output, content.as_bytes())
        .with_context(|| format!("无法写入 {}", output.display()))?;
    info!("📄 已导出 {} 条终稿记录到 {}", lines.len(), output.display());
    Ok(lines.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decisions::ParseOptions;
    use std::fs;

    const CONTENT: &str = "\
[1] Smith, J. (2020). Untitled Work. Acme Press. Relevance: test. FLAGS[FINALIZED] PRIMARY_URL[https://acme.example/1]

[2] Lee, K. (2022). Title Here. Press. Relevance: other. FLAGS[MANUAL_REVIEW] PRIMARY_URL[https://press.example/2]
Q: title here lee

[3] Park, M. (2019). No Links Yet. Some Press.
";

    fn store_with(content: &str) -> (tempfile::TempDir, DecisionsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DecisionsStore::new(
            dir.path().join("decisions.txt"),
            dir.path().join("backups"),
            ParseOptions::default(),
        );
        fs::write(store.path(), content).unwrap();
        (dir, store)
    }

    #[test]
    fn test_stats_counts() {
        let (_dir, store) = store_with(CONTENT);
        let stats = stats(&store).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.finalized, 1);
        assert_eq!(stats.with_primary, 2);
        assert_eq!(stats.with_secondary, 0);
        assert_eq!(stats.needs_review, 1);
        assert_eq!(stats.with_queries, 1);
        assert_eq!(
            stats.unfinalized.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn test_check_reports_missing_relevance() {
        let (_dir, store) = store_with(CONTENT);
        let issues = check(&store).unwrap();
        assert!(issues.iter().any(|ri| ri.id == Some(3)));
    }

    #[test]
    fn test_finalize_clears_review_flag_and_saves() {
        let (dir, store) = store_with(CONTENT);
        let record = finalize(&store, 2).unwrap();
        assert!(record.is_finalized());
        assert!(!record.flags.needs_manual_review());

        let reloaded = store.load().unwrap().document;
        assert!(reloaded.get(2).unwrap().is_finalized());
        assert!(dir.path().join("backups").exists());
    }

    #[test]
    fn test_finalize_without_primary_is_refused() {
        let (_dir, store) = store_with(CONTENT);
        assert!(finalize(&store, 3).is_err());
        assert!(finalize(&store, 42).is_err());

        let reloaded = store.load().unwrap().document;
        assert!(!reloaded.get(3).unwrap().is_finalized());
    }

    #[test]
    fn test_export_clean_only_finalized() {
        let (dir, store) = store_with(CONTENT);
        let output = dir.path().join("clean.txt");
        assert_eq!(export_clean(&store, &output).unwrap(), 1);

        let text = fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("[1] Smith, J. (2020). Untitled Work."));
        assert!(!text.contains("FLAGS["));
        assert!(!text.contains("PRIMARY_URL["));
    }
}
