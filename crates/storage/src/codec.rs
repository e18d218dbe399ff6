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

//! The self-describing value encoding.
//!
//! Every encoded value starts with a one-byte schema version selecting the
//! payload layout; integers are big-endian unsigned throughout. The decoder
//! reads every version ever written (backward compatible); readers that
//! predate a version reject it by construction.

use std::io::Cursor;
use std::io::Read;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use strata_protos::Value;

/// V1: `version | value_len (u32) | value (UTF-8)`.
pub const SCHEMA_TEXT: u8 = 1;
/// V2: `version | data_len (u32) | data (UTF-8) | timestamp (u64)`.
pub const SCHEMA_TIMESTAMPED: u8 = 2;
/// V3: `version | json_len (u32) | json (UTF-8, canonical)`.
pub const SCHEMA_STRUCTURED: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unknown schema version: {0}")]
    UnknownSchemaVersion(u8),
    #[error("truncated or corrupt record")]
    CorruptRecord,
}

/// A decoded value, still tagged with the schema version it was read under.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    V1(String),
    V2 { data: String, timestamp: u64 },
    V3(serde_json::Value),
}

impl DecodedValue {
    pub fn schema_version(&self) -> u8 {
        match self {
            DecodedValue::V1(_) => SCHEMA_TEXT,
            DecodedValue::V2 { .. } => SCHEMA_TIMESTAMPED,
            DecodedValue::V3(_) => SCHEMA_STRUCTURED,
        }
    }

    /// Strips the version tag, leaving the logical value.
    pub fn into_value(self) -> Value {
        match self {
            DecodedValue::V1(text) => Value::Text(text),
            DecodedValue::V2 { data, timestamp } => Value::Timestamped { data, timestamp },
            DecodedValue::V3(json) => Value::Structured(json),
        }
    }
}

/// Encodes a logical value under the newest schema version that fits it.
///
/// V3 payloads use the canonical JSON text form: compact separators, object
/// keys in lexicographic order.
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    match value {
        Value::Text(text) => {
            buf.push(SCHEMA_TEXT);
            put_len_prefixed(&mut buf, text.as_bytes());
        }
        Value::Timestamped { data, timestamp } => {
            buf.push(SCHEMA_TIMESTAMPED);
            put_len_prefixed(&mut buf, data.as_bytes());
            buf.extend_from_slice(&timestamp.to_be_bytes());
        }
        Value::Structured(json) => {
            buf.push(SCHEMA_STRUCTURED);
            let text = serde_json::to_string(json).expect("json value always serializes");
            put_len_prefixed(&mut buf, text.as_bytes());
        }
    }
    buf
}

fn put_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

pub fn decode_value(bytes: &[u8]) -> Result<DecodedValue, CodecError> {
    let mut cursor = Cursor::new(bytes);
    let version = cursor.read_u8().map_err(|_| CodecError::CorruptRecord)?;
    match version {
        SCHEMA_TEXT => Ok(DecodedValue::V1(read_string(&mut cursor)?)),
        SCHEMA_TIMESTAMPED => {
            let data = read_string(&mut cursor)?;
            let timestamp = cursor
                .read_u64::<BigEndian>()
                .map_err(|_| CodecError::CorruptRecord)?;
            Ok(DecodedValue::V2 { data, timestamp })
        }
        SCHEMA_STRUCTURED => {
            let text = read_string(&mut cursor)?;
            let json = serde_json::from_str(&text).map_err(|_| CodecError::CorruptRecord)?;
            Ok(DecodedValue::V3(json))
        }
        other => Err(CodecError::UnknownSchemaVersion(other)),
    }
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, CodecError> {
    let len = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| CodecError::CorruptRecord)? as usize;
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::CorruptRecord)?;
    String::from_utf8(buf).map_err(|_| CodecError::CorruptRecord)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip() {
        let value = Value::Text("hello".to_string());
        let bytes = encode_value(&value);
        assert_eq!(bytes[0], SCHEMA_TEXT);
        assert_eq!(
            decode_value(&bytes).unwrap(),
            DecodedValue::V1("hello".to_string())
        );
    }

    #[test]
    fn test_timestamped_round_trip() {
        let value = Value::Timestamped {
            data: "x".to_string(),
            timestamp: 1700000000,
        };
        let bytes = encode_value(&value);
        assert_eq!(bytes[0], SCHEMA_TIMESTAMPED);
        let decoded = decode_value(&bytes).unwrap();
        assert_eq!(decoded.schema_version(), SCHEMA_TIMESTAMPED);
        assert_eq!(decoded.into_value(), value);
    }

    #[test]
    fn test_timestamped_layout_is_exact() {
        let bytes = encode_value(&Value::Timestamped {
            data: "ab".to_string(),
            timestamp: 7,
        });
        let mut expected = vec![2u8, 0, 0, 0, 2];
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&7u64.to_be_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_structured_round_trips_up_to_canonicalization() {
        let json = serde_json::json!({"b": [2, 3], "a": 1});
        let bytes = encode_value(&Value::Structured(json.clone()));
        assert_eq!(bytes[0], SCHEMA_STRUCTURED);
        assert_eq!(decode_value(&bytes).unwrap(), DecodedValue::V3(json));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        assert!(matches!(
            decode_value(&[9, 0, 0, 0, 0]),
            Err(CodecError::UnknownSchemaVersion(9))
        ));
    }

    #[test]
    fn test_truncation_is_rejected() {
        let bytes = encode_value(&Value::Text("hello".to_string()));
        for cut in [0, 1, 3, bytes.len() - 1] {
            assert!(matches!(
                decode_value(&bytes[..cut]),
                Err(CodecError::CorruptRecord)
            ));
        }
    }
}
