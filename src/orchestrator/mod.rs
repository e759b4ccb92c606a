//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和命令调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量记录处理器
//! - 管理运行生命周期（加载、处理、保存、统计）
//! - 顺序处理选中的记录，记录之间固定延时
//! - 定期保存文件和检查点，支持断点续跑
//!
//! ### `selection` - 记录选择
//! - 按 ID 范围或字段条件选出要处理的记录
//!
//! ### `commands` - 交互命令
//! - stats / check / finalize / export-clean
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<CitationRecord>)
//!     ↓
//! workflow::RecordFlow (处理单条记录)
//!     ↓
//! services (能力层：query / search / rank / validate)
//!     ↓
//! clients + infrastructure (HTTP 客户端、文件存储)
//! ```
//!
//! 只有编排层读写 decisions 文件；流程层只修改内存中的记录。

pub mod batch_processor;
pub mod commands;
pub mod selection;

pub use batch_processor::{App, RunSummary};
pub use commands::DocumentStats;
pub use selection::Selection;
