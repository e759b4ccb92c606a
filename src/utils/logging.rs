use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing
///
/// `RUST_LOG` 优先；未设置时默认 `info`，`verbose` 为真时使用 `debug`。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n文献链接整理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 追加一段文本到日志文件
pub fn append_log(log_file_path: &str, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(file, "{}", text)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `decisions_file`: decisions 文件路径
/// - `model`: LLM 模型名称
pub fn log_startup(decisions_file: &str, model: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 顺序批处理模式");
    info!("📄 文件: {}", decisions_file);
    info!("🤖 模型: {}", model);
    info!("{}", "=".repeat(60));
}

/// 记录选中的记录数量
///
/// # 参数
/// - `selected`: 选中的记录数量
/// - `resumed`: 因断点续跑而跳过的数量
pub fn log_records_selected(selected: usize, resumed: usize) {
    info!("✓ 找到 {} 条待处理的记录", selected);
    if resumed > 0 {
        info!("⏭️ 断点续跑: 跳过 {} 条已完成的记录", resumed);
    }
    info!("💡 逐条顺序处理，每 N 条保存一次\n");
}

/// 记录单条开始
pub fn log_record_start(index: usize, total: usize, id: u32, title: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📖 [{}/{}] [RID {}] {}", index, total, id, truncate_text(title, 80));
    info!("{}", "─".repeat(60));
}

/// 最终统计中的各项数量
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalStats {
    pub processed: usize,
    pub assigned: usize,
    pub flagged: usize,
    pub finalized: usize,
    pub errored: usize,
    pub total: usize,
}

/// 打印最终统计信息
///
/// 同样的内容会返回，供写入日志文件
pub fn print_final_stats(stats: &FinalStats, log_file_path: &str) -> String {
    let lines = [
        "=".repeat(60),
        "📊 全部处理完成统计".to_string(),
        format!(
            "完成时间: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ),
        "=".repeat(60),
        format!("✅ 已处理: {}/{}", stats.processed, stats.total),
        format!("🔗 已分配链接: {}", stats.assigned),
        format!("🏁 自动终稿: {}", stats.finalized),
        format!("⚠️ 待人工复核: {}", stats.flagged),
        format!("❌ 出错: {}", stats.errored),
        "=".repeat(60),
    ];
    info!("");
    for line in &lines {
        info!("{}", line);
    }
    info!("\n日志已保存至: {}", log_file_path);
    lines.join("\n")
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("文献链接整理", 4), "文献链接...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_log_file_header_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let path = path.to_str().unwrap();

        init_log_file(path).unwrap();
        append_log(path, "summary").unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert!(content.ends_with("summary\n"));
    }
}
