//! 同步配置模块
//!
//! 没有配置文件和环境变量，所有选项都来自命令行。

use crate::core::ScanConfig;
use std::path::PathBuf;

/// 一次同步运行的配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 源目录（必须存在）
    pub source: PathBuf,
    /// 目标目录（不存在时自动创建）
    pub destination: PathBuf,
    /// 排除规则，按文件名匹配
    pub exclude_patterns: Vec<String>,
}

impl SyncConfig {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            exclude_patterns: Vec::new(),
        }
    }

    pub fn with_excludes(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            exclude_patterns: self.exclude_patterns.clone(),
        }
    }
}
