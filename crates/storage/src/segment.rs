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

//! Frame layout of the append-only segment log.
//!
//! ```text
//! u32 total_len (big endian)
//! u32 key_len   (big endian)
//! u8[key_len]   key (UTF-8)
//! u8[...]       encoded value (see `codec`)
//! ```
//!
//! `total_len` counts everything after itself: `4 + key_len + value len`.
//! There is no file header, footer, or checksum; a torn trailing frame is
//! treated as end-of-log.

use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

/// One decoded frame: the key and the raw encoded value bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub key: String,
    pub value_bytes: Vec<u8>,
}

/// Appends one frame at the writer's current position (the end of the log)
/// and returns the frame's start offset.
pub(crate) fn append_frame(file: &mut File, key: &str, value_bytes: &[u8]) -> io::Result<u64> {
    let offset = file.stream_position()?;
    let key_bytes = key.as_bytes();
    let total_len = 4 + key_bytes.len() + value_bytes.len();
    file.write_u32::<BigEndian>(total_len as u32)?;
    file.write_u32::<BigEndian>(key_bytes.len() as u32)?;
    file.write_all(key_bytes)?;
    file.write_all(value_bytes)?;
    Ok(offset)
}

/// Reads the frame starting at `offset`, returning the frame and the offset
/// of the next one. `None` means the log ends here: either a clean EOF on the
/// frame boundary or a torn trailing frame.
pub(crate) fn try_read_frame(file: &mut File, offset: u64) -> io::Result<Option<(Frame, u64)>> {
    file.seek(SeekFrom::Start(offset))?;

    let total_len = match file.read_u32::<BigEndian>() {
        Ok(total_len) => total_len as usize,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut payload = vec![0u8; total_len];
    let mut read = 0;
    while read < total_len {
        match file.read(&mut payload[read..]) {
            Ok(0) => return Ok(None),
            Ok(n) => read += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    let Some(frame) = parse_payload(&payload) else {
        return Ok(None);
    };
    Ok(Some((frame, offset + 4 + total_len as u64)))
}

fn parse_payload(payload: &[u8]) -> Option<Frame> {
    let key_len = u32::from_be_bytes(payload.get(..4)?.try_into().ok()?) as usize;
    let key_bytes = payload.get(4..4 + key_len)?;
    let key = std::str::from_utf8(key_bytes).ok()?.to_string();
    let value_bytes = payload[4 + key_len..].to_vec();
    Some(Frame { key, value_bytes })
}

/// Scans a segment log sequentially from offset zero, yielding every intact
/// frame with its start offset. A missing file is an empty log; a torn
/// trailing frame ends the scan silently.
pub fn scan_log(path: &Path) -> io::Result<Vec<(u64, Frame)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut file = File::open(path)?;
    let mut frames = Vec::new();
    let mut offset = 0;
    while let Some((frame, next_offset)) = try_read_frame(&mut file, offset)? {
        frames.push((offset, frame));
        offset = next_offset;
    }
    Ok(frames)
}
