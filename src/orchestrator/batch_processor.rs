//! 批量记录处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是批处理的入口，负责整次运行的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建 LLM / 搜索 / 校验客户端，组装 `RecordFlow`
//! 2. **加载和选择**：读取 decisions 文件，按配置选出待处理的记录
//! 3. **断点续跑**：`--resume` 时跳过检查点中已完成的记录
//! 4. **顺序处理**：逐条处理，记录之间固定延时；单条失败只记录，不中断批次
//! 5. **定期保存**：每 `checkpoint_frequency` 条保存一次文件和检查点
//! 6. **全局统计**：输出统计信息，按需写出 JSON 汇总
//!
//! 中断（Ctrl-C）只在开始下一条记录之前生效，已处理的结果会在退出前保存。
//! 带 FINALIZED 标记的记录无论选择条件如何都不会被处理。

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::clients::{GoogleSearchClient, LlmClient};
use crate::config::Config;
use crate::decisions::DecisionsDocument;
use crate::infrastructure::{write_atomic, Checkpoint, CheckpointStore, DecisionsStore, RecordFailure};
use crate::models::{CitationRecord, RecordBrief};
use crate::orchestrator::selection::Selection;
use crate::services::{GoogleWebSearch, HttpUrlValidator, LlmQueryGenerator, LlmRanker};
use crate::utils::logging::{
    append_log, init_log_file, log_record_start, log_records_selected, log_startup, print_final_stats, FinalStats,
};
use crate::workflow::{FlowSettings, RecordCtx, RecordFlow, RecordReport, RecordState};

/// 单次运行的汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    /// 本次计划处理的记录数（不含续跑跳过的）
    pub selected: usize,
    pub processed: usize,
    pub assigned: usize,
    pub flagged: usize,
    pub finalized: usize,
    /// 选中但已是终稿、未做处理的记录数
    pub skipped_finalized: usize,
    pub errored: Vec<RecordFailure>,
    /// 需要人工处理的记录（标记复核或出错）
    pub needs_attention: Vec<RecordBrief>,
    pub interrupted: bool,
}

impl RunSummary {
    fn new(selected: usize) -> Self {
        Self {
            started_at: chrono::Local::now().to_rfc3339(),
            selected,
            ..Default::default()
        }
    }

    fn record_success(&mut self, report: &RecordReport, record: &CitationRecord) {
        self.processed += 1;
        match report.state {
            RecordState::Finalized => {
                self.assigned += 1;
                self.finalized += 1;
            }
            RecordState::Assigned => self.assigned += 1,
            RecordState::FlaggedForReview => {
                self.flagged += 1;
                self.needs_attention.push(RecordBrief::from(record));
            }
            _ => {}
        }
    }

    fn record_failure(&mut self, record: &CitationRecord, message: String) {
        self.errored.push(RecordFailure {
            id: record.id,
            message,
        });
        self.needs_attention.push(RecordBrief::from(record));
    }

    /// 需要人工处理的记录 ID
    pub fn attention_ids(&self) -> Vec<u32> {
        self.needs_attention.iter().map(|b| b.id).collect()
    }

    fn stats(&self) -> FinalStats {
        FinalStats {
            processed: self.processed,
            assigned: self.assigned,
            flagged: self.flagged,
            finalized: self.finalized,
            errored: self.errored.len(),
            total: self.selected,
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    store: DecisionsStore,
    checkpoints: CheckpointStore,
    flow: RecordFlow,
    stop: Arc<AtomicBool>,
}

impl App {
    /// 初始化应用：创建真实的外部服务客户端
    pub fn initialize(config: Config) -> Result<Self> {
        config.validate(true)?;

        let llm = LlmClient::new(&config);
        let search = GoogleSearchClient::new(&config)?;
        let flow = RecordFlow::new(
            Arc::new(LlmQueryGenerator::new(llm.clone(), config.max_queries)),
            Arc::new(GoogleWebSearch::new(search)),
            Arc::new(LlmRanker::new(llm)),
            Arc::new(HttpUrlValidator::new(&config)?),
            FlowSettings::from_config(&config),
        );
        Ok(Self::with_flow(config, flow))
    }

    /// 使用给定的流程创建（服务实现由调用方决定）
    pub fn with_flow(config: Config, flow: RecordFlow) -> Self {
        let store = DecisionsStore::new(
            &config.decisions_file,
            &config.backup_dir,
            config.parse_options(),
        );
        let checkpoints = CheckpointStore::new(&config.checkpoint_file);
        Self {
            config,
            store,
            checkpoints,
            flow,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 停止标志，置位后不再开始新的记录
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// 监听 Ctrl-C
    pub fn watch_ctrl_c(&self) {
        let stop = self.stop_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⏹️ 收到中断信号，当前记录完成后停止");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    /// 运行一次批处理
    pub async fn run(&self, resume: bool) -> Result<RunSummary> {
        init_log_file(&self.config.output_log_file)
            .with_context(|| format!("无法创建日志文件 {}", self.config.output_log_file))?;
        log_startup(&self.config.decisions_file, &self.config.llm_model_name);

        // 加载（ID 重复、文件不存在都是致命错误，此时还没有改动任何记录）
        let parsed = self.store.load_unique()?;
        let issue_count: usize = parsed.issues.iter().map(|ri| ri.issues.len()).sum();
        if issue_count > 0 {
            warn!("⚠️ 解析发现 {} 个问题（不影响处理，可用 check 命令查看）", issue_count);
        }
        let mut document = parsed.document;

        let selection = Selection::from_config(&self.config);
        info!("🔎 选择条件: {}", selection.describe());
        let selected = selection.apply(&document.records);

        let mut checkpoint = if resume {
            self.checkpoints.load()?
        } else {
            Checkpoint::default()
        };
        let pending: Vec<u32> = selected
            .iter()
            .copied()
            .filter(|id| !checkpoint.is_completed(*id))
            .collect();
        log_records_selected(pending.len(), selected.len() - pending.len());

        let mut summary = RunSummary::new(pending.len());
        if pending.is_empty() {
            warn!("⚠️ 没有需要处理的记录，程序结束");
            summary.finished_at = chrono::Local::now().to_rfc3339();
            return Ok(summary);
        }

        if let Some(backup) = self.store.backup()? {
            info!("💾 运行前备份: {}", backup.display());
        }

        self.process_all(&mut document, &pending, &mut checkpoint, &mut summary)
            .await?;

        // 最终保存
        self.persist(&document, &mut checkpoint)?;
        summary.finished_at = chrono::Local::now().to_rfc3339();
        self.report(&summary)?;
        Ok(summary)
    }

    /// 逐条处理
    async fn process_all(
        &self,
        document: &mut DecisionsDocument,
        pending: &[u32],
        checkpoint: &mut Checkpoint,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let delay = Duration::from_millis(self.config.delay_between_records_ms);
        let total = pending.len();
        let mut since_save = 0;

        for (idx, &id) in pending.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
            if self.stop.load(Ordering::SeqCst) {
                warn!("⏹️ 已中断，剩余 {} 条记录未处理", total - idx);
                summary.interrupted = true;
                break;
            }

            let Some(original) = document.get(id) else {
                continue;
            };
            // 终稿记录不再自动处理
            if original.is_finalized() {
                info!("[RID {}] 🏁 已是终稿，跳过", id);
                summary.skipped_finalized += 1;
                continue;
            }
            let ctx = RecordCtx::new(id, idx + 1, total);
            log_record_start(ctx.index, ctx.total, id, &original.title);

            // 在副本上处理，失败时原记录保持不变
            let mut working = original.clone();
            match self.flow.run(&mut working, &ctx).await {
                Ok(report) => {
                    info!("{} 📌 结果: {}", ctx, report.state);
                    summary.record_success(&report, &working);
                    document.replace(working);
                    checkpoint.mark_completed(id);
                }
                Err(e) => {
                    error!("{} ❌ 处理失败，跳过: {}", ctx, e);
                    summary.record_failure(original, e.to_string());
                    checkpoint.mark_failed(id, e.to_string());
                }
            }

            since_save += 1;
            if since_save >= self.config.checkpoint_frequency {
                self.persist(document, checkpoint)?;
                since_save = 0;
            }
        }
        Ok(())
    }

    fn persist(&self, document: &DecisionsDocument, checkpoint: &mut Checkpoint) -> Result<()> {
        self.store.write(document)?;
        self.checkpoints.save(checkpoint)?;
        Ok(())
    }

    fn report(&self, summary: &RunSummary) -> Result<()> {
        let text = print_final_stats(&summary.stats(), &self.config.output_log_file);
        let mut log_text = text;
        if !summary.needs_attention.is_empty() {
            warn!("📝 需要人工处理的记录: {:?}", summary.attention_ids());
            log_text.push_str(&format!("\n需要人工处理: {:?}", summary.attention_ids()));
        }
        for failure in &summary.errored {
            log_text.push_str(&format!("\n[RID {}] 出错: {}", failure.id, failure.message));
        }
        append_log(&self.config.output_log_file, &log_text)?;

        if let Some(path) = &self.config.summary_file {
            let json = serde_json::to_string_pretty(summary)?;
            write_atomic(Path::new(path), json.as_bytes())?;
            info!("📄 运行汇总已写入 {}", path);
        }
        Ok(())
    }
}
