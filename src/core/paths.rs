//! 路径解析 - 把用户输入的路径转换为绝对路径，必要时创建目标目录

use crate::error::{SyncError, SyncResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// 解析后的目标目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination {
    pub path: PathBuf,
    /// 本次是否新建了目录
    pub created: bool,
}

/// 解析源目录，源目录必须已经存在
pub async fn resolve_source(path: &Path) -> SyncResult<PathBuf> {
    let not_found = || SyncError::NotFound {
        path: path.to_path_buf(),
    };

    let resolved = fs::canonicalize(path).await.map_err(|e| {
        debug!("无法解析源目录 {:?}: {}", path, e);
        not_found()
    })?;

    let metadata = fs::metadata(&resolved).await.map_err(|_| not_found())?;
    if !metadata.is_dir() {
        debug!("源路径不是目录: {:?}", resolved);
        return Err(not_found());
    }

    Ok(resolved)
}

/// 解析目标目录；不存在时逐级创建（权限 rwxr-xr-x）
///
/// 已存在时返回规范化路径；新建时返回拼接到当前工作目录上的绝对路径，不做规范化。
pub async fn resolve_or_create_destination(path: &Path) -> SyncResult<ResolvedDestination> {
    if let Ok(resolved) = fs::canonicalize(path).await {
        let metadata = fs::metadata(&resolved)
            .await
            .map_err(|e| SyncError::directory_access(&resolved, e))?;
        if !metadata.is_dir() {
            return Err(SyncError::directory_access(
                &resolved,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "destination exists and is not a directory",
                ),
            ));
        }
        return Ok(ResolvedDestination {
            path: resolved,
            created: false,
        });
    }

    let absolute = absolutize(path)?;
    create_dir_all(&absolute).await?;
    info!("已创建目标目录: {:?}", absolute);

    Ok(ResolvedDestination {
        path: absolute,
        created: true,
    })
}

/// 幂等地创建目录树，已存在的层级直接跳过
pub async fn create_dir_all(path: &Path) -> SyncResult<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);

    builder
        .create(path)
        .await
        .map_err(|e| SyncError::directory_access(path, e))
}

fn absolutize(path: &Path) -> SyncResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| SyncError::directory_access(".", e))?;
    Ok(cwd.join(path))
}
