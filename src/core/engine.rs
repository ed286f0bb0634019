use crate::config::SyncConfig;
use crate::core::comparator::{FileComparator, SyncDecision};
use crate::core::paths::{resolve_or_create_destination, resolve_source};
use crate::core::scanner::{sort_bytewise, FileScanner};
use crate::core::transfer::transfer;
use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// 同步过程中产生的事件，按处理顺序发送
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    DestinationCreated { path: PathBuf },
    WorkingDirectory { path: PathBuf },
    Started { source: PathBuf, destination: PathBuf },
    NewFile { name: String },
    Copied { from: PathBuf, to: PathBuf },
    Identical { name: String },
    Updating { name: String },
    DestinationNewer { name: String },
    Failed { name: String, error: String },
    Completed,
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::DestinationCreated { path } => {
                write!(f, "Created destination directory '{}'.", path.display())
            }
            SyncEvent::WorkingDirectory { path } => {
                write!(f, "Current working directory: {}", path.display())
            }
            SyncEvent::Started {
                source,
                destination,
            } => write!(
                f,
                "Synchronizing from {} to {}",
                source.display(),
                destination.display()
            ),
            SyncEvent::NewFile { name } => write!(f, "New file found: {}", name),
            SyncEvent::Copied { from, to } => {
                write!(f, "Copied: {} -> {}", from.display(), to.display())
            }
            SyncEvent::Identical { name } => write!(f, "File {} is identical. Skipping...", name),
            SyncEvent::Updating { name } => {
                write!(f, "File {} is newer in source. Updating...", name)
            }
            SyncEvent::DestinationNewer { name } => {
                write!(f, "File {} is newer in destination. Skipping...", name)
            }
            SyncEvent::Failed { name, error } => {
                write!(f, "Failed to synchronize {}: {}", name, error)
            }
            SyncEvent::Completed => write!(f, "Synchronization complete."),
        }
    }
}

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Completed,
    /// 有文件处理失败，其余文件照常完成
    CompletedWithErrors,
}

/// 单个文件的处理结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    /// 非 UTF-8 的文件名以替换字符显示
    pub name: String,
    /// 比较阶段就失败时为 None
    pub decision: Option<SyncDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub start_time: i64,
    pub end_time: i64,
    pub status: SyncStatus,
    pub files_scanned: u64,
    pub files_copied: u64,
    pub files_updated: u64,
    pub files_skipped_identical: u64,
    pub files_skipped_destination_newer: u64,
    pub files_failed: u64,
    pub bytes_transferred: u64,
    pub duration_ms: u64,
    pub outcomes: Vec<FileOutcome>,
    pub errors: Vec<String>,
}

impl SyncReport {
    /// 按处理顺序返回成功的决策
    pub fn decisions(&self) -> Vec<(&str, SyncDecision)> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_failed())
            .filter_map(|o| o.decision.map(|d| (o.name.as_str(), d)))
            .collect()
    }
}

/// 同步引擎
pub struct SyncEngine {
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// 运行一次完整的同步：解析路径、扫描源目录、逐个处理文件
    ///
    /// 只有路径解析和源目录扫描的错误会中止同步。
    pub async fn run(&self, progress_tx: Option<mpsc::Sender<SyncEvent>>) -> SyncResult<SyncReport> {
        let source = resolve_source(&self.config.source).await?;
        let destination = resolve_or_create_destination(&self.config.destination).await?;

        if destination.created {
            self.send_progress(
                &progress_tx,
                SyncEvent::DestinationCreated {
                    path: self.config.destination.clone(),
                },
            )
            .await;
        }

        let cwd = std::env::current_dir().map_err(|e| SyncError::directory_access(".", e))?;
        self.send_progress(&progress_tx, SyncEvent::WorkingDirectory { path: cwd })
            .await;
        self.send_progress(
            &progress_tx,
            SyncEvent::Started {
                source: source.clone(),
                destination: destination.path.clone(),
            },
        )
        .await;

        let scanner = FileScanner::with_config(&self.config.scan_config());
        let candidates = scanner.scan_dir(&source).await?;

        let report = self
            .sync_candidates(&source, &destination.path, candidates, &progress_tx)
            .await;

        self.send_progress(&progress_tx, SyncEvent::Completed).await;
        Ok(report)
    }

    /// 按文件名字节序依次处理候选文件
    ///
    /// 单个文件失败只记录错误，不影响后续文件，也不回滚已完成的传输。
    pub async fn sync_candidates(
        &self,
        source_root: &Path,
        dest_root: &Path,
        mut candidates: Vec<OsString>,
        progress_tx: &Option<mpsc::Sender<SyncEvent>>,
    ) -> SyncReport {
        let start_time = chrono::Utc::now().timestamp();
        let started = Instant::now();

        sort_bytewise(&mut candidates);

        info!(
            "开始同步: {:?} -> {:?}, {} 个候选文件",
            source_root,
            dest_root,
            candidates.len()
        );

        let mut report = SyncReport {
            source: source_root.to_path_buf(),
            destination: dest_root.to_path_buf(),
            start_time,
            end_time: start_time,
            status: SyncStatus::Completed,
            files_scanned: candidates.len() as u64,
            files_copied: 0,
            files_updated: 0,
            files_skipped_identical: 0,
            files_skipped_destination_newer: 0,
            files_failed: 0,
            bytes_transferred: 0,
            duration_ms: 0,
            outcomes: Vec::with_capacity(candidates.len()),
            errors: Vec::new(),
        };

        for file_name in candidates {
            let source_path = source_root.join(&file_name);
            let dest_path = dest_root.join(&file_name);
            let name = file_name.to_string_lossy().into_owned();

            let mut decision = None;
            let result = self
                .sync_file(&name, &source_path, &dest_path, &mut decision, progress_tx)
                .await;

            match result {
                Ok(bytes) => {
                    report.bytes_transferred += bytes;
                    match decision {
                        Some(SyncDecision::CopyNew) => report.files_copied += 1,
                        Some(SyncDecision::CopyUpdate) => report.files_updated += 1,
                        Some(SyncDecision::SkipIdentical) => report.files_skipped_identical += 1,
                        Some(SyncDecision::SkipDestinationNewer) => {
                            report.files_skipped_destination_newer += 1
                        }
                        None => {}
                    }
                    report.outcomes.push(FileOutcome {
                        name,
                        decision,
                        error: None,
                    });
                }
                Err(e) => {
                    error!("同步文件失败 {}: {}", name, e);
                    let message = e.to_string();
                    self.send_progress(
                        progress_tx,
                        SyncEvent::Failed {
                            name: name.clone(),
                            error: message.clone(),
                        },
                    )
                    .await;
                    report.files_failed += 1;
                    report.errors.push(format!("{}: {}", name, message));
                    report.outcomes.push(FileOutcome {
                        name,
                        decision,
                        error: Some(message),
                    });
                }
            }
        }

        if report.files_failed > 0 {
            report.status = SyncStatus::CompletedWithErrors;
        }
        report.end_time = chrono::Utc::now().timestamp();
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "同步完成: {} 个新文件, {} 个更新, {} 个相同, {} 个目标较新, {} 个失败, {} 字节",
            report.files_copied,
            report.files_updated,
            report.files_skipped_identical,
            report.files_skipped_destination_newer,
            report.files_failed,
            report.bytes_transferred
        );

        report
    }

    /// 处理单个文件，返回传输的字节数
    async fn sync_file(
        &self,
        name: &str,
        source_path: &Path,
        dest_path: &Path,
        decision_out: &mut Option<SyncDecision>,
        progress_tx: &Option<mpsc::Sender<SyncEvent>>,
    ) -> SyncResult<u64> {
        let decision = FileComparator::decide(source_path, dest_path).await?;
        *decision_out = Some(decision);
        debug!("{}: {:?}", name, decision);

        let event = match decision {
            SyncDecision::CopyNew => SyncEvent::NewFile {
                name: name.to_string(),
            },
            SyncDecision::CopyUpdate => SyncEvent::Updating {
                name: name.to_string(),
            },
            SyncDecision::SkipIdentical => SyncEvent::Identical {
                name: name.to_string(),
            },
            SyncDecision::SkipDestinationNewer => SyncEvent::DestinationNewer {
                name: name.to_string(),
            },
        };
        self.send_progress(progress_tx, event).await;

        if !decision.requires_transfer() {
            return Ok(0);
        }

        let bytes = transfer(source_path, dest_path).await?;
        self.send_progress(
            progress_tx,
            SyncEvent::Copied {
                from: source_path.to_path_buf(),
                to: dest_path.to_path_buf(),
            },
        )
        .await;

        Ok(bytes)
    }

    /// 发送进度事件
    async fn send_progress(&self, tx: &Option<mpsc::Sender<SyncEvent>>, event: SyncEvent) {
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        src: PathBuf,
        dst: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let src = temp.path().join("src");
            let dst = temp.path().join("dst");
            std::fs::create_dir(&src).unwrap();
            Self {
                _temp: temp,
                src,
                dst,
            }
        }

        fn engine(&self) -> SyncEngine {
            SyncEngine::new(SyncConfig::new(&self.src, &self.dst))
        }

        fn write_src(&self, name: &str, data: &[u8], mtime: i64) {
            let path = self.src.join(name);
            std::fs::write(&path, data).unwrap();
            set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
        }

        fn write_dst(&self, name: &str, data: &[u8], mtime: i64) {
            std::fs::create_dir_all(&self.dst).unwrap();
            let path = self.dst.join(name);
            std::fs::write(&path, data).unwrap();
            set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
        }
    }

    async fn collect_events(engine: &SyncEngine) -> (SyncReport, Vec<SyncEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let report = engine.run(Some(tx)).await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (report, events)
    }

    #[tokio::test]
    async fn test_new_file_into_missing_destination() {
        let fx = Fixture::new();
        fx.write_src("report.txt", b"q3 results", 1_000);

        let (report, events) = collect_events(&fx.engine()).await;

        assert_eq!(report.decisions(), vec![("report.txt", SyncDecision::CopyNew)]);
        assert_eq!(
            std::fs::read(fx.dst.join("report.txt")).unwrap(),
            b"q3 results"
        );
        assert_eq!(
            events.first(),
            Some(&SyncEvent::DestinationCreated {
                path: fx.dst.clone()
            })
        );
        assert!(events.contains(&SyncEvent::NewFile {
            name: "report.txt".to_string()
        }));
        assert_eq!(events.last(), Some(&SyncEvent::Completed));
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.bytes_transferred, 10);
    }

    #[tokio::test]
    async fn test_identical_leaves_mtime() {
        let fx = Fixture::new();
        fx.write_src("notes.txt", b"same", 5_000);
        fx.write_dst("notes.txt", b"same", 1_000);

        let report = fx.engine().run(None).await.unwrap();

        assert_eq!(
            report.decisions(),
            vec![("notes.txt", SyncDecision::SkipIdentical)]
        );
        let meta = std::fs::metadata(fx.dst.join("notes.txt")).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta),
            FileTime::from_unix_time(1_000, 0)
        );
    }

    #[tokio::test]
    async fn test_source_newer_updates() {
        let fx = Fixture::new();
        fx.write_src("notes.txt", b"New content", 2_000);
        fx.write_dst("notes.txt", b"Old content!", 1_000);

        let report = fx.engine().run(None).await.unwrap();

        assert_eq!(report.decisions(), vec![("notes.txt", SyncDecision::CopyUpdate)]);
        assert_eq!(
            std::fs::read(fx.dst.join("notes.txt")).unwrap(),
            b"New content"
        );
        assert_eq!(report.files_updated, 1);
    }

    #[tokio::test]
    async fn test_destination_newer_skips() {
        let fx = Fixture::new();
        fx.write_src("notes.txt", b"Old content", 1_000);
        fx.write_dst("notes.txt", b"Newer content", 2_000);

        let report = fx.engine().run(None).await.unwrap();

        assert_eq!(
            report.decisions(),
            vec![("notes.txt", SyncDecision::SkipDestinationNewer)]
        );
        assert_eq!(
            std::fs::read(fx.dst.join("notes.txt")).unwrap(),
            b"Newer content"
        );
        assert_eq!(report.files_skipped_destination_newer, 1);
        assert_eq!(report.files_skipped_identical, 0);
    }

    #[tokio::test]
    async fn test_equal_mtime_different_content_skips() {
        let fx = Fixture::new();
        fx.write_src("tie.txt", b"left", 1_000);
        fx.write_dst("tie.txt", b"right", 1_000);

        let report = fx.engine().run(None).await.unwrap();

        assert_eq!(
            report.decisions(),
            vec![("tie.txt", SyncDecision::SkipDestinationNewer)]
        );
        assert_eq!(std::fs::read(fx.dst.join("tie.txt")).unwrap(), b"right");
    }

    #[tokio::test]
    async fn test_lexicographic_order() {
        let fx = Fixture::new();
        for name in ["b.txt", "a.txt", "c.txt", "B.txt"] {
            fx.write_src(name, name.as_bytes(), 1_000);
        }

        let report = fx.engine().run(None).await.unwrap();
        let names: Vec<&str> = report.decisions().iter().map(|(n, _)| *n).collect();

        assert_eq!(names, vec!["B.txt", "a.txt", "b.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn test_second_run_is_all_identical() {
        let fx = Fixture::new();
        fx.write_src("a.txt", b"alpha", 1_000);
        fx.write_src("b.txt", b"beta", 1_000);
        fx.write_dst("b.txt", b"stale", 500);

        let first = fx.engine().run(None).await.unwrap();
        assert_eq!(
            first.decisions(),
            vec![
                ("a.txt", SyncDecision::CopyNew),
                ("b.txt", SyncDecision::CopyUpdate)
            ]
        );

        let second = fx.engine().run(None).await.unwrap();
        assert!(second
            .decisions()
            .iter()
            .all(|(_, d)| *d == SyncDecision::SkipIdentical));
        assert_eq!(second.files_skipped_identical, 2);
        assert_eq!(second.files_skipped_destination_newer, 0);
        assert_eq!(second.files_copied + second.files_updated, 0);
        assert_eq!(second.bytes_transferred, 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_run() {
        let fx = Fixture::new();
        fx.write_src("a.txt", b"alpha", 1_000);
        fx.write_src("b.txt", b"beta", 1_000);
        fx.write_src("c.txt", b"gamma", 1_000);
        std::fs::create_dir_all(&fx.dst).unwrap();

        let engine = fx.engine();
        // b.txt 在扫描后消失
        let candidates = vec![
            OsString::from("c.txt"),
            OsString::from("b.txt"),
            OsString::from("a.txt"),
        ];
        std::fs::remove_file(fx.src.join("b.txt")).unwrap();

        let report = engine
            .sync_candidates(&fx.src, &fx.dst, candidates, &None)
            .await;

        assert_eq!(report.status, SyncStatus::CompletedWithErrors);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.files_copied, 2);
        assert!(report.outcomes[1].is_failed());
        assert_eq!(report.outcomes[1].name, "b.txt");
        assert!(fx.dst.join("a.txt").exists());
        assert!(fx.dst.join("c.txt").exists());
        assert!(!fx.dst.join("b.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_destination_is_reported_and_run_continues() {
        let fx = Fixture::new();
        // 同名目录能打开但读取时报 EISDIR；长度相同才会进入逐字节比较
        std::fs::create_dir_all(fx.dst.join("b.txt")).unwrap();
        std::fs::write(fx.dst.join("b.txt").join("inner"), b"x").unwrap();
        let dir_len = std::fs::metadata(fx.dst.join("b.txt")).unwrap().len() as usize;
        fx.write_src("a.txt", b"alpha", 1_000);
        fx.write_src("b.txt", &vec![b'x'; dir_len], 2_000);
        fx.write_src("c.txt", b"gamma", 1_000);

        let (report, events) = collect_events(&fx.engine()).await;

        assert_eq!(report.status, SyncStatus::CompletedWithErrors);
        assert_eq!(report.files_failed, 1);
        let failed = &report.outcomes[1];
        assert_eq!(failed.name, "b.txt");
        assert_eq!(failed.decision, None);
        assert!(failed.error.as_deref().unwrap().starts_with("cannot read"));
        assert_eq!(
            report.decisions(),
            vec![("a.txt", SyncDecision::CopyNew), ("c.txt", SyncDecision::CopyNew)]
        );
        assert!(fx.dst.join("b.txt").is_dir());
        assert!(events
            .iter()
            .any(|e| matches!(e, SyncEvent::Failed { name, .. } if name == "b.txt")));
        assert!(!events.iter().any(|e| matches!(
            e,
            SyncEvent::Identical { name } | SyncEvent::Updating { name } | SyncEvent::DestinationNewer { name }
                if name == "b.txt"
        )));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_names_are_synchronized_bytewise() {
        use std::os::unix::ffi::OsStrExt;

        let fx = Fixture::new();
        let latin1 = std::ffi::OsStr::from_bytes(b"caf\xe9.txt");
        std::fs::write(fx.src.join(latin1), b"menu").unwrap();
        fx.write_src("cafe.txt", b"coffee", 1_000);

        let report = fx.engine().run(None).await.unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_copied, 2);
        assert_eq!(std::fs::read(fx.dst.join(latin1)).unwrap(), b"menu");
        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["cafe.txt", "caf\u{FFFD}.txt"]);
    }

    #[tokio::test]
    async fn test_destination_file_is_fatal() {
        let fx = Fixture::new();
        fx.write_src("a.txt", b"alpha", 1_000);
        std::fs::write(&fx.dst, b"i am a file").unwrap();

        let err = fx.engine().run(None).await.unwrap_err();
        assert!(matches!(err, SyncError::DirectoryAccess { .. }));
        assert_eq!(std::fs::read(&fx.dst).unwrap(), b"i am a file");
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let temp = TempDir::new().unwrap();
        let engine = SyncEngine::new(SyncConfig::new(
            temp.path().join("nonexistent_src"),
            temp.path().join("dst"),
        ));

        let err = engine.run(None).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
        assert!(!temp.path().join("dst").exists());
    }

    #[tokio::test]
    async fn test_empty_source() {
        let fx = Fixture::new();

        let (report, events) = collect_events(&fx.engine()).await;

        assert!(report.outcomes.is_empty());
        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(events.last(), Some(&SyncEvent::Completed));
    }

    #[test]
    fn test_event_lines() {
        assert_eq!(
            SyncEvent::Identical {
                name: "a.txt".to_string()
            }
            .to_string(),
            "File a.txt is identical. Skipping..."
        );
        assert_eq!(
            SyncEvent::DestinationNewer {
                name: "a.txt".to_string()
            }
            .to_string(),
            "File a.txt is newer in destination. Skipping..."
        );
        assert_eq!(SyncEvent::Completed.to_string(), "Synchronization complete.");
    }
}
