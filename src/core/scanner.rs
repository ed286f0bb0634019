use crate::error::{SyncError, SyncResult};
use regex::Regex;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 文件扫描器配置
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// 排除规则（支持 `*` 和 `?` 通配符，不区分大小写）
    pub exclude_patterns: Vec<String>,
}

/// 文件扫描器，只列出目录第一层的普通文件
pub struct FileScanner {
    excludes: Vec<Regex>,
}

impl FileScanner {
    pub fn new() -> Self {
        Self {
            excludes: Vec::new(),
        }
    }

    pub fn with_config(config: &ScanConfig) -> Self {
        let excludes = config
            .exclude_patterns
            .iter()
            .filter_map(|pattern| match Self::compile_pattern(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("忽略无效的排除规则 {}: {}", pattern, e);
                    None
                }
            })
            .collect();
        Self { excludes }
    }

    /// 把简单的 glob 模式转换为正则
    fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
        let escaped = regex::escape(&pattern.to_lowercase())
            .replace("\\*", ".*")
            .replace("\\?", ".");
        Regex::new(&format!("^{}$", escaped))
    }

    /// 检查文件名是否应该被排除，非 UTF-8 部分按替换字符匹配
    fn should_exclude(&self, name: &OsStr) -> bool {
        let name = name.to_string_lossy().to_lowercase();
        self.excludes.iter().any(|re| re.is_match(&name))
    }

    /// 扫描目录，返回普通文件的文件名（不含路径）
    ///
    /// 目录、符号链接、设备文件、套接字都会被跳过，即使符号链接指向普通文件。
    pub async fn scan_dir(&self, root: &Path) -> SyncResult<Vec<OsString>> {
        let root_buf = root.to_path_buf();
        let entries = tokio::task::spawn_blocking(move || list_entries(&root_buf))
            .await
            .map_err(|e| SyncError::directory_access(root, std::io::Error::other(e)))??;

        let total = entries.len();
        let files: Vec<OsString> = entries
            .into_iter()
            .filter(|name| {
                if self.should_exclude(name) {
                    debug!("排除文件: {:?}", name);
                    false
                } else {
                    true
                }
            })
            .collect();

        info!(
            "扫描完成: {} 个普通文件, {} 个被排除",
            files.len(),
            total - files.len()
        );
        Ok(files)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// 列出目录第一层的普通文件名
pub async fn list_regular_files(root: &Path) -> SyncResult<Vec<OsString>> {
    FileScanner::new().scan_dir(root).await
}

fn list_entries(root: &Path) -> SyncResult<Vec<OsString>> {
    let mut names = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                return Err(SyncError::directory_access(root, source));
            }
            Err(e) => {
                warn!("读取目录项失败: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            debug!("跳过非普通文件: {:?}", entry.path());
            continue;
        }

        names.push(entry.file_name().to_os_string());
    }

    Ok(names)
}

/// 按文件名的原始字节排序，与区域设置无关
pub fn sort_bytewise(names: &mut [OsString]) {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        names.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    }
    #[cfg(not(unix))]
    names.sort();
}
