use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

/// 比较时每次读取的块大小
const COMPARE_BUFFER_SIZE: usize = 64 * 1024;

/// 单个文件的同步决策
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncDecision {
    /// 目标不存在，复制新文件
    CopyNew,
    /// 内容不同且源文件更新，覆盖目标
    CopyUpdate,
    /// 内容相同，跳过
    SkipIdentical,
    /// 内容不同但源文件不比目标新（包括时间相同），跳过
    SkipDestinationNewer,
}

impl SyncDecision {
    /// 是否需要执行传输
    pub fn requires_transfer(&self) -> bool {
        matches!(self, SyncDecision::CopyNew | SyncDecision::CopyUpdate)
    }
}

/// 文件比较器
pub struct FileComparator;

impl FileComparator {
    /// 根据目标是否存在、内容是否相同、修改时间先后给出决策
    pub async fn decide(source: &Path, dest: &Path) -> SyncResult<SyncDecision> {
        if !path_exists(dest).await? {
            return Ok(SyncDecision::CopyNew);
        }

        if contents_equal(source, dest).await? {
            return Ok(SyncDecision::SkipIdentical);
        }

        if is_strictly_newer(source, dest).await? {
            Ok(SyncDecision::CopyUpdate)
        } else {
            Ok(SyncDecision::SkipDestinationNewer)
        }
    }
}

async fn path_exists(path: &Path) -> SyncResult<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| SyncError::read(path, e))
}

/// 逐字节比较两个文件的内容
///
/// 任一文件无法打开或读取时返回 `SyncError::Read`，不会当作“内容不同”。
pub async fn contents_equal(a: &Path, b: &Path) -> SyncResult<bool> {
    let meta_a = fs::metadata(a).await.map_err(|e| SyncError::read(a, e))?;
    let meta_b = fs::metadata(b).await.map_err(|e| SyncError::read(b, e))?;

    if meta_a.len() != meta_b.len() {
        tracing::debug!(
            "文件大小不同: {:?} ({}) vs {:?} ({})",
            a,
            meta_a.len(),
            b,
            meta_b.len()
        );
        return Ok(false);
    }

    let mut file_a = fs::File::open(a).await.map_err(|e| SyncError::read(a, e))?;
    let mut file_b = fs::File::open(b).await.map_err(|e| SyncError::read(b, e))?;
    let mut buf_a = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut buf_b = vec![0u8; COMPARE_BUFFER_SIZE];

    loop {
        let read_a = fill_buffer(&mut file_a, &mut buf_a)
            .await
            .map_err(|e| SyncError::read(a, e))?;
        let read_b = fill_buffer(&mut file_b, &mut buf_b)
            .await
            .map_err(|e| SyncError::read(b, e))?;

        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

/// 尽量填满缓冲区，只有到达文件末尾时才会返回不足一块的长度
async fn fill_buffer(file: &mut fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// `a` 的修改时间是否严格晚于 `b`，时间相同返回 false
pub async fn is_strictly_newer(a: &Path, b: &Path) -> SyncResult<bool> {
    let modified_a = fs::metadata(a)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| SyncError::read(a, e))?;
    let modified_b = fs::metadata(b)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| SyncError::read(b, e))?;

    Ok(modified_a > modified_b)
}
