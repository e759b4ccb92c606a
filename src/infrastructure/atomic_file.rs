//! 原子写文件
//!
//! 先写同目录下的临时文件，`sync_all` 后再 rename 覆盖目标，
//! 中途崩溃时目标文件要么是旧内容，要么是新内容。

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::FileError;

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
    let write_failed = |source| FileError::WriteFailed {
        path: path.display().to_string(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    fs::create_dir_all(parent).map_err(write_failed)?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let tmp = parent.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    {
        let mut f = fs::File::create(&tmp).map_err(write_failed)?;
        f.write_all(bytes).map_err(write_failed)?;
        f.sync_all().map_err(write_failed)?;
    }
    fs::rename(&tmp, path).map_err(write_failed)?;

    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}
