// Copyright 2025 the Strata project authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use error_stack::Result;
use indexmap::IndexMap;
use strata_protos::Value;

use crate::codec;
use crate::segment;
use crate::segment::Frame;
use crate::StorageError;

/// Replica role of a partition on its hosting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Leader => write!(f, "leader"),
            Role::Follower => write!(f, "follower"),
        }
    }
}

/// Which tier currently answers for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLocation {
    Hot,
    Cold,
    NotFound,
}

impl std::fmt::Display for KeyLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyLocation::Hot => write!(f, "HOT_STORAGE"),
            KeyLocation::Cold => write!(f, "COLD_STORAGE"),
            KeyLocation::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

/// Fan-out requested by a leader partition after a local write commits.
///
/// Implementations must not block the caller: the leader acknowledges the
/// write before replication completes, and a stuck follower must never stall
/// it. The partition holds this interface instead of any reference to its
/// hosting node.
pub trait ReplicationSink: Send + Sync + 'static {
    fn replicate(&self, partition_id: u64, key: &str, value: &Value);
}

/// One shard of the keyspace: a bounded in-memory hot buffer in front of an
/// append-only segment log with an in-memory offset index.
///
/// A key lives in exactly one tier at a time. Puts land in the hot buffer;
/// when the buffer reaches capacity it is drained to the log in insertion
/// order and the keys move to the cold index. The log is append-only: a
/// re-flushed key gets a new frame and the index moves past the old bytes.
pub struct Partition {
    partition_id: u64,
    role: Role,
    log_path: PathBuf,
    hot_capacity: usize,
    sink: Option<Arc<dyn ReplicationSink>>,
    tiers: Mutex<Tiers>,
}

struct Tiers {
    hot: IndexMap<String, Value>,
    cold_index: HashMap<String, u64>,
}

impl Partition {
    /// Opens (or creates) the partition rooted at
    /// `<node_dir>/partition_<id>`, rebuilding the cold index from the
    /// segment log. Sequential replay leaves each key pointing at its most
    /// recent intact frame; a torn trailing frame is discarded.
    pub fn open(
        partition_id: u64,
        role: Role,
        node_dir: &Path,
        hot_capacity: usize,
        sink: Option<Arc<dyn ReplicationSink>>,
    ) -> Result<Self, StorageError> {
        let dir = node_dir.join(format!("partition_{partition_id}"));
        std::fs::create_dir_all(&dir).map_err(StorageError::Io)?;
        let log_path = dir.join("segment.log");

        let mut cold_index = HashMap::new();
        for (offset, frame) in segment::scan_log(&log_path).map_err(StorageError::Io)? {
            cold_index.insert(frame.key, offset);
        }
        if !cold_index.is_empty() {
            log::info!(
                "partition {partition_id} recovered {} cold entries from {}",
                cold_index.len(),
                log_path.display()
            );
        }

        Ok(Partition {
            partition_id,
            role,
            log_path,
            hot_capacity: hot_capacity.max(1),
            sink,
            tiers: Mutex::new(Tiers {
                hot: IndexMap::new(),
                cold_index,
            }),
        })
    }

    pub fn partition_id(&self) -> u64 {
        self.partition_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Writes a key into the hot buffer, flushing first if the buffer is at
    /// capacity. On a leader the sink is asked to fan the write out to
    /// followers after the local write is in place; the call returns without
    /// waiting for replication.
    pub fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let should_flush = {
            let mut tiers = self.tiers();
            tiers.hot.insert(key.to_string(), value.clone());
            tiers.hot.len() >= self.hot_capacity
        };
        if should_flush {
            self.flush()?;
        }
        if self.role == Role::Leader {
            if let Some(sink) = &self.sink {
                sink.replicate(self.partition_id, key, &value);
            }
        }
        Ok(())
    }

    /// Tiered lookup: hot first, then the cold index. Cold hits decode the
    /// frame at the recorded offset and return the logical value.
    pub fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let offset = {
            let tiers = self.tiers();
            if let Some(value) = tiers.hot.get(key) {
                return Ok(Some(value.clone()));
            }
            match tiers.cold_index.get(key) {
                Some(offset) => *offset,
                None => return Ok(None),
            }
        };
        let frame = self.read_frame(offset)?;
        let decoded = codec::decode_value(&frame.value_bytes).map_err(StorageError::Codec)?;
        Ok(Some(decoded.into_value()))
    }

    pub fn location(&self, key: &str) -> KeyLocation {
        let tiers = self.tiers();
        if tiers.hot.contains_key(key) {
            KeyLocation::Hot
        } else if tiers.cold_index.contains_key(key) {
            KeyLocation::Cold
        } else {
            KeyLocation::NotFound
        }
    }

    /// The raw encoded value bytes of the key's cold frame, undecoded. Keys
    /// that only exist in the hot buffer have no on-disk bytes to show.
    pub fn raw_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let offset = {
            let tiers = self.tiers();
            match tiers.cold_index.get(key) {
                Some(offset) => *offset,
                None => return Ok(None),
            }
        };
        let frame = self.read_frame(offset)?;
        Ok(Some(frame.value_bytes))
    }

    /// Hot buffer keys in insertion order.
    pub fn hot_keys(&self) -> Vec<String> {
        self.tiers().hot.keys().cloned().collect()
    }

    /// Drains the hot buffer into the segment log.
    ///
    /// The snapshot-and-clear happens under the lock; the append loop runs
    /// outside it so reads stay responsive during a long flush, re-acquiring
    /// the lock only to move each key's index entry. If an append fails the
    /// remaining snapshot keys are dropped from both tiers; recovery's
    /// short-read rule erases any torn frame the failure left behind.
    pub fn flush(&self) -> Result<(), StorageError> {
        let batch: Vec<(String, Value)> = {
            let mut tiers = self.tiers();
            if tiers.hot.is_empty() {
                return Ok(());
            }
            tiers.hot.drain(..).collect()
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(StorageError::Io)?;
        file.seek(SeekFrom::End(0)).map_err(StorageError::Io)?;

        for (key, value) in &batch {
            let value_bytes = codec::encode_value(value);
            let offset =
                segment::append_frame(&mut file, key, &value_bytes).map_err(StorageError::Io)?;
            self.tiers().cold_index.insert(key.clone(), offset);
        }

        file.sync_all().map_err(StorageError::Io)?;
        log::debug!(
            "partition {} flushed {} records to cold storage",
            self.partition_id,
            batch.len()
        );
        Ok(())
    }

    /// Flushes whatever is still hot. Safe to call more than once.
    pub fn close(&self) -> Result<(), StorageError> {
        log::info!(
            "partition {} flushing remaining data before shutdown",
            self.partition_id
        );
        self.flush()
    }

    fn read_frame(&self, offset: u64) -> Result<Frame, StorageError> {
        let mut file = File::open(&self.log_path).map_err(StorageError::Io)?;
        match segment::try_read_frame(&mut file, offset).map_err(StorageError::Io)? {
            Some((frame, _)) => Ok(frame),
            // The index only ever points at frames the scan or a completed
            // append produced, so a short read here means real corruption.
            None => Err(StorageError::Codec(codec::CodecError::CorruptRecord).into()),
        }
    }

    fn tiers(&self) -> MutexGuard<'_, Tiers> {
        self.tiers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
