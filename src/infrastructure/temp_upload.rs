//! 上传文件的临时落盘
//!
//! 文件只在 `TempUpload` 存活期间存在，离开作用域（包括出错返回）时删除。

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::AppResult;

pub struct TempUpload {
    file: NamedTempFile,
}

impl TempUpload {
    /// 将上传内容写入 `dir` 下的临时文件
    pub fn persist(dir: &Path, bytes: &[u8], suffix: &str) -> AppResult<Self> {
        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("batch-")
            .suffix(suffix)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        debug!("上传文件已写入临时路径: {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// 显式删除，删除失败只记录日志
    pub fn remove(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("删除临时文件失败 {}: {}", path.display(), e);
        } else {
            debug!("临时文件已删除: {}", path.display());
        }
    }
}
