//! Table file channel: exclusive owner of one table's container file.

use crate::descriptor::TableDescriptor;
use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use rowstore_codec::{
    decode_container, encode_container, ContainerHeader, HEADER_LEN, SEQUENCE_OFFSET,
};
use rowstore_storage::TableFile;
use std::path::Path;
use tracing::debug;

/// Sequence value of a table that has never assigned an identity.
const FRESH_SEQUENCE: i64 = -1;

/// Exclusive channel to one table's container file.
///
/// The channel owns the file for its whole lifetime: opening acquires
/// the exclusive lock (creating a fresh, empty container if the file
/// is absent) and closing releases it. All operations after [`close`]
/// fail with an `InvalidState` error; double-close is a no-op.
///
/// Saves rewrite the container in place **without truncating**: a save
/// that shrinks the payload leaves the previous tail bytes as dead
/// space. [`data_length`] reports the whole payload region including
/// that dead space, and [`compact_percent`] reports how much of the
/// region a full rewrite would still occupy.
///
/// The sequence counter lives at a fixed header offset so that
/// [`next_sequence`] can persist it with a positioned write and sync,
/// leaving the payload untouched.
///
/// [`close`]: TableChannel::close
/// [`data_length`]: TableChannel::data_length
/// [`compact_percent`]: TableChannel::compact_percent
/// [`next_sequence`]: TableChannel::next_sequence
pub struct TableChannel {
    descriptor: TableDescriptor,
    inner: Mutex<Option<ChannelState>>,
}

struct ChannelState {
    file: TableFile,
    sequence: i64,
    record_count: i32,
    payload_len: u32,
}

impl TableChannel {
    /// Opens the channel, creating the container file if absent.
    ///
    /// A fresh table starts with zero records and sequence `-1`.
    ///
    /// # Errors
    ///
    /// - `TableLocked` if another channel holds the file
    /// - `CorruptContainer` if the existing header is invalid or its
    ///   framing version is below the descriptor's minimum
    pub fn open(path: &Path, descriptor: TableDescriptor) -> CoreResult<Self> {
        let file = TableFile::open(path)?;

        let state = if file.is_empty() {
            let bytes = encode_container(b"", 0, FRESH_SEQUENCE, descriptor.compression())?;
            file.overwrite(&bytes)?;
            file.sync()?;

            let payload_len = (bytes.len() - HEADER_LEN) as u32;
            ChannelState {
                file,
                sequence: FRESH_SEQUENCE,
                record_count: 0,
                payload_len,
            }
        } else {
            let bytes = file.read_all()?;
            let header = ContainerHeader::decode(&bytes)?;

            if u32::from(header.version) < descriptor.minimum_version() {
                return Err(CoreError::corrupt_container(format!(
                    "container version {} is below table minimum {}",
                    header.version,
                    descriptor.minimum_version()
                )));
            }

            ChannelState {
                file,
                sequence: header.sequence,
                record_count: header.record_count,
                payload_len: header.payload_len,
            }
        };

        debug!(table = descriptor.name(), "opened table channel");

        Ok(Self {
            descriptor,
            inner: Mutex::new(Some(state)),
        })
    }

    /// Returns the table descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    /// Saves an encoded row payload as a fresh v2 container.
    ///
    /// The write is a durable in-place overwrite: contents are synced
    /// before the call returns, and the file is never truncated.
    pub fn save(&self, rows_bytes: &[u8], record_count: i32) -> CoreResult<()> {
        let mut guard = self.inner.lock();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed("table channel"))?;

        let bytes = encode_container(
            rows_bytes,
            record_count,
            state.sequence,
            self.descriptor.compression(),
        )?;

        state.file.overwrite(&bytes)?;
        state.file.sync()?;

        state.record_count = record_count;
        state.payload_len = (bytes.len() - HEADER_LEN) as u32;

        debug!(
            table = self.descriptor.name(),
            records = record_count,
            bytes = bytes.len(),
            "saved container"
        );

        Ok(())
    }

    /// Reads and decodes the container, returning the row payload.
    pub fn read(&self) -> CoreResult<Vec<u8>> {
        let mut guard = self.inner.lock();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed("table channel"))?;

        let bytes = state.file.read_all()?;
        let (header, payload) = decode_container(&bytes)?;

        state.sequence = header.sequence;
        state.record_count = header.record_count;
        state.payload_len = header.payload_len;

        Ok(payload)
    }

    /// Increments the sequence counter, persists it, and returns it.
    ///
    /// The new value is synced to disk before this method returns; a
    /// process restart immediately afterwards observes it.
    pub fn next_sequence(&self) -> CoreResult<i64> {
        self.take_sequences(1)
    }

    /// Reserves `count` consecutive sequence values with one flush.
    ///
    /// Returns the first reserved value; the counter ends up at the
    /// last one. Used by batch inserts.
    pub fn take_sequences(&self, count: usize) -> CoreResult<i64> {
        if count == 0 {
            return Err(CoreError::invalid_argument(
                "sequence reservation must be non-zero",
            ));
        }

        let mut guard = self.inner.lock();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed("table channel"))?;

        state.sequence += count as i64;
        persist_sequence(state)?;

        Ok(state.sequence - count as i64 + 1)
    }

    /// Forces the sequence counter to `value` and persists it.
    ///
    /// The next call to [`next_sequence`] returns `value + 1`.
    ///
    /// [`next_sequence`]: TableChannel::next_sequence
    pub fn reset_sequence(&self, value: i64) -> CoreResult<()> {
        let mut guard = self.inner.lock();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed("table channel"))?;

        state.sequence = value;
        persist_sequence(state)
    }

    /// Returns the persisted sequence counter.
    pub fn sequence(&self) -> CoreResult<i64> {
        let guard = self.inner.lock();
        let state = guard
            .as_ref()
            .ok_or_else(|| CoreError::disposed("table channel"))?;
        Ok(state.sequence)
    }

    /// Returns the number of live records in the container.
    pub fn record_count(&self) -> CoreResult<i32> {
        let guard = self.inner.lock();
        let state = guard
            .as_ref()
            .ok_or_else(|| CoreError::disposed("table channel"))?;
        Ok(state.record_count)
    }

    /// Returns the byte length of the payload region, dead space included.
    pub fn data_length(&self) -> CoreResult<u64> {
        let guard = self.inner.lock();
        let state = guard
            .as_ref()
            .ok_or_else(|| CoreError::disposed("table channel"))?;
        Ok(state.file.len().saturating_sub(HEADER_LEN as u64))
    }

    /// Returns the percentage (0–100) of the payload region a full
    /// rewrite would still occupy, rounded up.
    ///
    /// Deterministic across reopen: derived from the stored payload
    /// length and the file length alone.
    pub fn compact_percent(&self) -> CoreResult<u8> {
        let guard = self.inner.lock();
        let state = guard
            .as_ref()
            .ok_or_else(|| CoreError::disposed("table channel"))?;

        let region = state.file.len().saturating_sub(HEADER_LEN as u64);
        if region == 0 {
            return Ok(100);
        }

        let live = u64::from(state.payload_len);
        let percent = (live * 100).div_ceil(region).min(100);
        Ok(percent as u8)
    }

    /// Closes the channel, releasing the exclusive file lock.
    ///
    /// Idempotent: closing twice is a no-op.
    pub fn close(&self) {
        let mut guard = self.inner.lock();
        if guard.take().is_some() {
            debug!(table = self.descriptor.name(), "closed table channel");
        }
    }

    /// Returns true if the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

/// Writes the sequence counter at its header offset and syncs.
fn persist_sequence(state: &ChannelState) -> CoreResult<()> {
    state
        .file
        .write_at(SEQUENCE_OFFSET, &state.sequence.to_le_bytes())?;
    state.file.sync()?;
    Ok(())
}
