//! 日志模块 - 控制台诊断输出和可选的文件日志（按大小轮转）

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// 日志文件名，轮转后的旧文件追加 `.old` 后缀
pub const LOG_FILE_NAME: &str = "filesync.log";

const DEFAULT_MAX_SIZE_MB: u32 = 5;

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    /// 为 None 时只输出到 stderr
    pub log_dir: Option<PathBuf>,
    pub max_size_mb: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            log_dir: None,
            max_size_mb: DEFAULT_MAX_SIZE_MB,
        }
    }
}

impl LogConfig {
    /// 根据命令行的 -v / -q 计算日志级别，-q 优先
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => Level::ERROR,
            (false, 0) => Level::WARN,
            (false, 1) => Level::INFO,
            (false, 2) => Level::DEBUG,
            (false, _) => Level::TRACE,
        };
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn tracing_level(&self) -> Level {
        self.level
    }
}

/// 当前日志文件的状态，按已写入字节数判断是否需要轮转
struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    written: u64,
    writer: Option<BufWriter<File>>,
}

impl RotatingFile {
    fn open(path: PathBuf, max_size: u64) -> io::Result<Self> {
        let mut file = Self {
            path,
            max_size,
            written: 0,
            writer: None,
        };
        file.reopen()?;
        if file.written > max_size {
            file.rotate()?;
        }
        Ok(file)
    }

    fn reopen(&mut self) -> io::Result<()> {
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = handle.metadata()?.len();
        self.writer = Some(BufWriter::new(handle));
        Ok(())
    }

    /// filesync.log -> filesync.log.old，旧备份直接覆盖
    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        let backup = backup_path(&self.path);
        if backup.exists() {
            fs::remove_file(&backup)?;
        }
        fs::rename(&self.path, &backup)?;
        self.reopen()
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.max_size && self.written > 0 {
            // 轮转失败时继续写当前文件
            if let Err(e) = self.rotate() {
                eprintln!("日志轮转失败 {}: {}", self.path.display(), e);
                if self.writer.is_none() {
                    self.reopen()?;
                }
            }
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))?;
        writer.write_all(buf)?;
        writer.flush()?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".old");
    PathBuf::from(name)
}

/// 带大小限制的日志写入器，可在多个 fmt layer 之间共享
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    state: Arc<Mutex<RotatingFile>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        Self::with_limit(log_dir, u64::from(max_size_mb) * 1024 * 1024)
    }

    pub fn with_limit(log_dir: &Path, max_bytes: u64) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let file_path = log_dir.join(LOG_FILE_NAME);
        let state = RotatingFile::open(file_path.clone(), max_bytes)?;

        Ok(Self {
            file_path,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn lock(&self) -> MutexGuard<'_, RotatingFile> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 单条日志事件使用的写入句柄
pub struct LogWriter {
    owner: SizeRotatingWriter,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.owner.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.owner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            owner: self.clone(),
        }
    }
}
