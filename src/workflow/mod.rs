//! 流程层（Workflow）
//!
//! 把业务能力串成"一条记录"的完整处理流程

pub mod record_ctx;
pub mod record_flow;

pub use record_ctx::RecordCtx;
pub use record_flow::{AutoFinalize, ChosenLink, FlowSettings, RecordFlow, RecordReport, RecordState};
