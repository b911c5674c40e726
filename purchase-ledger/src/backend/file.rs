//! Append-only log backend.
//!
//! Log layout, one frame per accepted record:
//! ```text
//! len(4, LE) || SCALE(LogEntry { owner, record })
//! ```
//! The log is replayed into memory at open. A final frame that runs past the
//! end of the file (crash during write) is truncated away with a warning. A
//! complete frame that fails to decode is corruption: open fails and the file
//! is left untouched.

use super::{HandleLocation, LedgerBackend, LedgerIndex};
use crate::{LedgerError, Result};
use async_trait::async_trait;
use parity_scale_codec::{Decode, DecodeAll, Encode};
use parking_lot::RwLock;
use purchase_ledger_primitives::{AccountId, CiphertextHandle, PurchaseRecord};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

const FRAME_HEADER: usize = 4;

#[derive(Encode, Decode)]
struct LogEntry {
    owner: AccountId,
    record: PurchaseRecord,
}

struct LogFile {
    file: File,
    /// Bytes of fully written frames.
    len: u64,
    /// A write started but did not complete; bytes past `len` are garbage.
    dirty: bool,
}

impl LogFile {
    async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        if self.dirty {
            self.file.set_len(self.len).await?;
        }
        self.dirty = true;
        self.file.seek(SeekFrom::Start(self.len)).await?;
        self.file.write_all(bytes).await?;
        self.file.sync_data().await?;
        self.len += bytes.len() as u64;
        self.dirty = false;
        Ok(())
    }
}

pub struct FileBackend {
    path: PathBuf,
    log: Arc<Mutex<LogFile>>,
    index: Arc<RwLock<LedgerIndex>>,
}

impl FileBackend {
    /// Open or create the log at `path` and replay it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;

        let (index, valid, entries) = replay(&bytes)?;
        if valid < bytes.len() {
            tracing::warn!(
                path = %path.display(),
                dropped = bytes.len() - valid,
                "truncating torn tail of ledger log"
            );
            file.set_len(valid as u64).await?;
            file.sync_data().await?;
        }
        tracing::info!(path = %path.display(), records = entries, "ledger log replayed");

        Ok(Self {
            path,
            log: Arc::new(Mutex::new(LogFile { file, len: valid as u64, dirty: false })),
            index: Arc::new(RwLock::new(index)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Rebuild the index from raw log bytes. Returns the index, the length of
/// the valid prefix and the number of frames applied.
///
/// Only a frame cut short by the end of the file ends the valid prefix early.
fn replay(mut bytes: &[u8]) -> Result<(LedgerIndex, usize, usize)> {
    let mut index = LedgerIndex::default();
    let mut valid = 0usize;
    let mut entries = 0usize;
    while bytes.len() >= FRAME_HEADER {
        let mut len = [0u8; FRAME_HEADER];
        len.copy_from_slice(&bytes[..FRAME_HEADER]);
        let len = u32::from_le_bytes(len) as usize;
        let Some(frame) = bytes.get(FRAME_HEADER..FRAME_HEADER + len) else { break };
        let entry = LogEntry::decode_all(&mut &frame[..]).map_err(|e| {
            LedgerError::Backend(format!("corrupt ledger log at byte {valid}: {e}"))
        })?;

        index.check_unaliased(&entry.record).map_err(|e| {
            LedgerError::Backend(format!("corrupt ledger log at byte {valid}: {e}"))
        })?;
        index.insert(entry.owner, entry.record);

        valid += FRAME_HEADER + len;
        entries += 1;
        bytes = &bytes[FRAME_HEADER + len..];
    }
    Ok((index, valid, entries))
}

fn frame(entry: &LogEntry) -> Vec<u8> {
    let body = entry.encode();
    let mut out = Vec::with_capacity(FRAME_HEADER + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

#[async_trait]
impl LedgerBackend for FileBackend {
    async fn append(&self, owner: AccountId, record: PurchaseRecord) -> Result<u64> {
        // Serializes appenders; readers keep going against the index.
        let mut log = self.log.clone().lock_owned().await;

        let expected = {
            let index = self.index.read();
            index.check_unaliased(&record)?;
            index.next_index(&owner)
        };

        // The write and the index update run as one task, so dropping the
        // caller cannot leave a frame on disk that memory does not know about.
        let index = self.index.clone();
        tokio::spawn(async move {
            log.write_frame(&frame(&LogEntry { owner, record })).await?;
            let at = index.write().insert(owner, record);
            debug_assert_eq!(at, expected);
            Ok::<_, LedgerError>(at)
        })
        .await
        .map_err(|e| LedgerError::Backend(format!("append task: {e}")))?
    }

    fn count(&self, owner: &AccountId) -> u64 {
        self.index.read().count(owner)
    }

    fn record(&self, owner: &AccountId, index: u64) -> Option<PurchaseRecord> {
        self.index.read().record(owner, index)
    }

    fn records(&self, owner: &AccountId) -> Vec<PurchaseRecord> {
        self.index.read().records(owner)
    }

    fn locate(&self, handle: &CiphertextHandle) -> Option<HandleLocation> {
        self.index.read().locate(handle)
    }
}
