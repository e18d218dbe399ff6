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

use serde::de::Error as _;
use serde::Deserialize;
use serde::Serialize;

/// A logical value stored under a key.
///
/// Values arrive on the wire as JSON literals; the storage engine encodes
/// each variant under its own schema version (see `strata-storage`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A plain UTF-8 string.
    Text(String),
    /// A string payload stamped with seconds since the epoch.
    Timestamped { data: String, timestamp: u64 },
    /// An arbitrary structured container (any other JSON object or array).
    Structured(serde_json::Value),
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported value type: {0}")]
pub struct UnsupportedValueType(pub &'static str);

impl Value {
    /// Maps a JSON literal onto the value model.
    ///
    /// An object carrying exactly `data: string` and `timestamp: uint` is a
    /// timestamped record; any other object or array is a structured
    /// container. Scalars other than strings are not storable.
    pub fn from_json(json: serde_json::Value) -> Result<Self, UnsupportedValueType> {
        match json {
            serde_json::Value::String(text) => Ok(Value::Text(text)),
            serde_json::Value::Object(members) => match as_timestamped(&members) {
                Some(value) => Ok(value),
                None => Ok(Value::Structured(serde_json::Value::Object(members))),
            },
            array @ serde_json::Value::Array(_) => Ok(Value::Structured(array)),
            serde_json::Value::Null => Err(UnsupportedValueType("null")),
            serde_json::Value::Bool(_) => Err(UnsupportedValueType("boolean")),
            serde_json::Value::Number(_) => Err(UnsupportedValueType("number")),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(text) => serde_json::Value::String(text.clone()),
            Value::Timestamped { data, timestamp } => serde_json::json!({
                "data": data,
                "timestamp": timestamp,
            }),
            Value::Structured(json) => json.clone(),
        }
    }
}

fn as_timestamped(members: &serde_json::Map<String, serde_json::Value>) -> Option<Value> {
    if members.len() != 2 {
        return None;
    }
    let data = members.get("data")?.as_str()?;
    let timestamp = members.get("timestamp")?.as_u64()?;
    Some(Value::Timestamped {
        data: data.to_string(),
        timestamp,
    })
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(D::Error::custom)
    }
}
