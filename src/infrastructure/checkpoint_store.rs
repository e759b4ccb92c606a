//! 断点续跑 - 基础设施层
//!
//! 记录已完成的 ID 和出错的记录，以 JSON 原子写入。

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FileError;
use crate::infrastructure::atomic_file::write_atomic;

/// 出错的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub id: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub completed_ids: BTreeSet<u32>,
    #[serde(default)]
    pub errors: Vec<RecordFailure>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Checkpoint {
    pub fn mark_completed(&mut self, id: u32) {
        self.completed_ids.insert(id);
        self.errors.retain(|e| e.id != id);
    }

    pub fn mark_failed(&mut self, id: u32, message: impl Into<String>) {
        self.errors.retain(|e| e.id != id);
        self.errors.push(RecordFailure {
            id,
            message: message.into(),
        });
    }

    pub fn is_completed(&self, id: u32) -> bool {
        self.completed_ids.contains(&id)
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取断点；文件不存在时返回空断点
    pub fn load(&self) -> Result<Checkpoint, FileError> {
        if !self.path.exists() {
            return Ok(Checkpoint::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| FileError::ReadFailed {
            path: self.path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| FileError::Json {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, checkpoint: &mut Checkpoint) -> Result<(), FileError> {
        checkpoint.updated_at = Some(chrono::Local::now().to_rfc3339());
        let json = serde_json::to_vec_pretty(checkpoint).map_err(|source| FileError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        write_atomic(&self.path, &json)
    }
}
