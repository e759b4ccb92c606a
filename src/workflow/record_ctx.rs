//! 记录处理上下文
//!
//! 封装"我正在处理第几条记录、它的 ID 是多少"这一信息

use std::fmt::Display;

/// 记录处理上下文
#[derive(Debug, Clone, Copy)]
pub struct RecordCtx {
    /// 记录ID
    pub id: u32,

    /// 在本次运行中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次运行选中的记录总数
    pub total: usize,
}

impl RecordCtx {
    pub fn new(id: u32, index: usize, total: usize) -> Self {
        Self { id, index, total }
    }
}

impl Display for RecordCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[RID {}]", self.id)
    }
}
