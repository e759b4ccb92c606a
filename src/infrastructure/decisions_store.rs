//! decisions.txt 存储 - 基础设施层
//!
//! 唯一负责读写 decisions 文件的地方，批处理和交互命令都通过它访问文件。
//! 每次覆盖写入之前先在备份目录留一份带时间戳的副本。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::decisions::{format_document, parse_document, DecisionsDocument, ParseOptions, ParsedDocument};
use crate::error::FileError;
use crate::infrastructure::atomic_file::write_atomic;

/// decisions 文件仓库
#[derive(Debug, Clone)]
pub struct DecisionsStore {
    path: PathBuf,
    backup_dir: PathBuf,
    options: ParseOptions,
}

impl DecisionsStore {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>, options: ParseOptions) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取并解析
    pub fn load(&self) -> Result<ParsedDocument, FileError> {
        if !self.path.exists() {
            return Err(FileError::NotFound {
                path: self.path.display().to_string(),
            });
        }
        let content = fs::read_to_string(&self.path).map_err(|source| FileError::ReadFailed {
            path: self.path.display().to_string(),
            source,
        })?;
        let parsed = parse_document(&content, &self.options);
        debug!(
            "📄 已读取 {}: {} 条记录",
            self.path.display(),
            parsed.document.records.len()
        );
        Ok(parsed)
    }

    /// 读取并要求 ID 唯一
    ///
    /// 批处理和终稿命令会写回文件，ID 重复时无法确定写回哪条，直接拒绝。
    pub fn load_unique(&self) -> Result<ParsedDocument, FileError> {
        let parsed = self.load()?;
        if let Some(&id) = parsed.duplicate_ids().first() {
            return Err(FileError::DuplicateId {
                path: self.path.display().to_string(),
                id,
            });
        }
        Ok(parsed)
    }

    /// 备份后原子写入
    pub fn save(&self, document: &DecisionsDocument) -> Result<(), FileError> {
        if let Some(backup) = self.backup()? {
            debug!("💾 已备份: {}", backup.display());
        }
        self.write(document)
    }

    /// 不备份，直接原子写入（批处理中途的检查点保存）
    pub fn write(&self, document: &DecisionsDocument) -> Result<(), FileError> {
        write_atomic(&self.path, format_document(document).as_bytes())?;
        info!("💾 已保存 {} ({} 条记录)", self.path.display(), document.records.len());
        Ok(())
    }

    /// 复制当前文件到备份目录；文件还不存在时跳过
    pub fn backup(&self) -> Result<Option<PathBuf>, FileError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let backup_failed = |source| FileError::BackupFailed {
            path: self.backup_dir.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.backup_dir).map_err(backup_failed)?;
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("decisions");
        let target = self.backup_dir.join(format!(
            "{}_backup_{}.txt",
            stem,
            chrono::Local::now().format("%Y%m%d_%H%M%S_%3f")
        ));
        fs::copy(&self.path, &target).map_err(backup_failed)?;
        Ok(Some(target))
    }
}
