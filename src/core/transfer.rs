//! 文件传输 - 先写临时文件再原子重命名，失败时目标保持原状

use crate::error::{SyncError, SyncResult};
use filetime::FileTime;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// 复制文件内容和元数据（权限、修改时间），返回复制的字节数
///
/// 目标的父目录必须已经存在。
pub async fn transfer(source: &Path, dest: &Path) -> SyncResult<u64> {
    let fail = |e: io::Error| SyncError::transfer(source, dest, e);

    let temp_path = temp_path_for(dest).map_err(fail)?;

    // 任何一步失败都删除临时文件
    let temp = scopeguard::guard(temp_path, |path| {
        if let Err(e) = std::fs::remove_file(&path) {
            debug!("清理临时文件失败 {:?}: {}", path, e);
        }
    });

    // tokio::fs::copy 会同时复制权限位
    let bytes = fs::copy(source, &*temp).await.map_err(fail)?;

    let metadata = fs::metadata(source).await.map_err(fail)?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    let atime = FileTime::from_last_access_time(&metadata);
    filetime::set_file_times(&*temp, atime, mtime).map_err(fail)?;

    fs::rename(&*temp, dest).await.map_err(fail)?;
    let _ = scopeguard::ScopeGuard::into_inner(temp);

    debug!("传输完成: {:?} -> {:?} ({} 字节)", source, dest, bytes);
    Ok(bytes)
}

/// 同一目录下的隐藏临时文件，保证 rename 不跨文件系统
fn temp_path_for(dest: &Path) -> io::Result<PathBuf> {
    let invalid = || io::Error::new(io::ErrorKind::InvalidInput, "invalid destination path");
    let parent = dest.parent().ok_or_else(invalid)?;
    let name = dest.file_name().ok_or_else(invalid)?;

    Ok(parent.join(format!(
        ".{}.{}.tmp",
        name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    )))
}
