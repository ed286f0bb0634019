//! 错误类型

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 同步过程中的错误
///
/// `Usage`、`NotFound`、`DirectoryAccess` 会终止整个同步；
/// `Read`、`Transfer` 只影响单个文件，引擎记录后继续处理下一个。
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Usage: filesync <source_directory> <destination_directory>")]
    Usage,

    #[error("Source directory '{}' does not exist.", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot access directory '{}': {source}", path.display())]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot copy '{}' to '{}': {source}", from.display(), to.display())]
    Transfer {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn transfer(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Transfer {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    pub fn directory_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::DirectoryAccess {
            path: path.into(),
            source,
        }
    }

    /// 是否为致命错误（需要以退出码 1 结束进程）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Usage | SyncError::NotFound { .. } | SyncError::DirectoryAccess { .. }
        )
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::Usage.is_fatal());
        assert!(SyncError::NotFound {
            path: PathBuf::from("missing")
        }
        .is_fatal());
        assert!(SyncError::directory_access("d", io::Error::other("boom")).is_fatal());
        assert!(!SyncError::read("a", io::Error::other("boom")).is_fatal());
        assert!(!SyncError::transfer("a", "b", io::Error::other("boom")).is_fatal());
    }

    #[test]
    fn test_not_found_message() {
        let err = SyncError::NotFound {
            path: PathBuf::from("nonexistent_src"),
        };
        assert_eq!(
            err.to_string(),
            "Source directory 'nonexistent_src' does not exist."
        );
    }
}
