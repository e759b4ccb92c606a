//! 基础设施层
//!
//! 只负责文件的读写，不关心记录的处理流程。

pub mod atomic_file;
pub mod checkpoint_store;
pub mod decisions_store;

pub use atomic_file::write_atomic;
pub use checkpoint_store::{Checkpoint, CheckpointStore, RecordFailure};
pub use decisions_store::DecisionsStore;
