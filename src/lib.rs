//! # Reference Refinement
//!
//! 为 decisions.txt 中的文献记录寻找并校验主/次链接的批处理工具
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 数据层（Models / Decisions）
//! - `models/` - `CitationRecord`、标记集合、候选链接、解析问题
//! - `decisions/` - 记录行的解析与格式化（保证可往返）
//!
//! ### ② 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - 原子写入、decisions 文件仓库、检查点
//! - `clients/` - LLM（OpenAI 兼容接口）和 Google 搜索的 HTTP 客户端
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单条记录
//! - `QueryGenerator` / `WebSearch` / `Ranker` / `UrlValidator`
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一条记录"的完整处理流程
//! - `RecordCtx` - 上下文封装（记录ID + 序号）
//! - `RecordFlow` - 流程编排（query → search → rank → validate → assign）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理、检查点、断点续跑
//! - `orchestrator/selection` - 记录选择
//! - `orchestrator/commands` - stats / check / finalize / export-clean
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod decisions;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use decisions::{format_record, parse_record, DecisionsDocument};
pub use error::{AppError, AppResult};
pub use infrastructure::{Checkpoint, CheckpointStore, DecisionsStore};
pub use models::CitationRecord;
pub use orchestrator::{App, RunSummary, Selection};
pub use workflow::{RecordCtx, RecordFlow};
