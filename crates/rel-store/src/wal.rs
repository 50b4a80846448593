use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::record::CommitRecord;

/// When appended commits reach the disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` before a commit is acknowledged.
    EveryWrite,
    /// Leave durability to the OS page cache.
    #[default]
    OsDefault,
}

#[derive(Clone, Debug, Default)]
pub struct WalConfig {
    pub sync_mode: SyncMode,
}

/// Length and CRC32, both little-endian `u32`.
const FRAME_HEADER: usize = 8;

/// Outcome of reading one frame from the recovered bytes.
enum Frame<'a> {
    Intact(&'a [u8]),
    Corrupt,
    Torn,
}

fn read_frame(bytes: &[u8]) -> Frame<'_> {
    if bytes.len() < FRAME_HEADER {
        return Frame::Torn;
    }
    let (header, rest) = bytes.split_at(FRAME_HEADER);
    let mut len = [0u8; 4];
    let mut crc = [0u8; 4];
    len.copy_from_slice(&header[..4]);
    crc.copy_from_slice(&header[4..]);
    let len = u32::from_le_bytes(len) as usize;
    if len == 0 || len > rest.len() {
        return Frame::Torn;
    }
    let payload = &rest[..len];
    if crc32fast::hash(payload) == u32::from_le_bytes(crc) {
        Frame::Intact(payload)
    } else {
        Frame::Corrupt
    }
}

/// Append-only log of [`CommitRecord`]s backing [`WalStateStore`].
///
/// Each commit is one frame: payload length, CRC32 of the payload, then the
/// bincode-encoded record. The log is valid up to its first damaged frame
/// (torn, failing its checksum, or undecodable). [`recover`](Self::recover)
/// truncates the file there, so commits appended afterwards are reachable on
/// the next replay and the surviving sequence has no gaps.
///
/// [`WalStateStore`]: crate::WalStateStore
pub struct WriteAheadLog {
    path: PathBuf,
    sync_mode: SyncMode,
    /// Writer and the current end-of-file offset.
    tail: Mutex<(BufWriter<File>, u64)>,
}

impl WriteAheadLog {
    pub fn open(path: &Path, config: WalConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let end = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            sync_mode: config.sync_mode,
            tail: Mutex::new((BufWriter::new(file), end)),
        })
    }

    /// Append one commit record and return the offset of its frame.
    pub fn append(&self, record: &CommitRecord) -> StoreResult<u64> {
        let payload =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("commit record exceeds 4 GiB".into()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut tail = self.tail.lock().map_err(|_| StoreError::LockPoisoned)?;
        let (writer, end) = &mut *tail;
        let at = *end;
        writer.write_all(&frame)?;
        writer.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            writer.get_ref().sync_all()?;
        }
        *end += frame.len() as u64;

        debug!(seq = record.seq, offset = at, bytes = frame.len(), "commit appended to WAL");
        Ok(at)
    }

    /// Every commit record before the first damaged frame, in append order.
    ///
    /// Anything from the damaged frame onwards is cut off the file and
    /// synced before this returns; later appends continue at the cut.
    pub fn recover(&self) -> StoreResult<Vec<CommitRecord>> {
        let mut tail = self.tail.lock().map_err(|_| StoreError::LockPoisoned)?;
        let (writer, end) = &mut *tail;
        writer.flush()?;

        let bytes = fs::read(&self.path)?;
        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < bytes.len() {
            let payload = match read_frame(&bytes[offset..]) {
                Frame::Intact(payload) => payload,
                Frame::Torn => {
                    warn!(offset, file_len = bytes.len(), "torn WAL frame, log ends here");
                    break;
                }
                Frame::Corrupt => {
                    warn!(offset, file_len = bytes.len(), "WAL frame failed CRC check, log ends here");
                    break;
                }
            };
            match bincode::deserialize::<CommitRecord>(payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable WAL frame, log ends here");
                    break;
                }
            }
            offset += FRAME_HEADER + payload.len();
        }

        if offset < bytes.len() {
            let file = writer.get_ref();
            file.set_len(offset as u64)?;
            file.sync_all()?;
            warn!(
                valid_len = offset,
                dropped = bytes.len() - offset,
                "WAL truncated to last intact frame"
            );
        }
        *end = offset as u64;

        debug!(commits = records.len(), "WAL replayed");
        Ok(records)
    }

    /// Bytes written so far.
    pub fn offset(&self) -> StoreResult<u64> {
        Ok(self.tail.lock().map_err(|_| StoreError::LockPoisoned)?.1)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
