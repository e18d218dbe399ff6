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

use std::fmt;

use crate::UnsupportedValueType;
use crate::Value;

/// One request line of the node protocol.
///
/// Requests are a single UTF-8 line tokenized on ASCII space; for `PUT` and
/// `REPLICATE` the value argument is the remainder of the line, a JSON
/// literal. Connections are one-shot: one request, one reply, close.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Put {
        partition_id: u64,
        key: String,
        value: Value,
    },
    Get {
        partition_id: u64,
        key: String,
    },
    Replicate {
        partition_id: u64,
        key: String,
        value: Value,
    },
    Status {
        partition_id: u64,
        key: String,
    },
    Hex {
        partition_id: u64,
        key: String,
    },
    Inspect,
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Unknown verb or wrong argument count.
    #[error("invalid command")]
    Invalid,
    #[error("invalid partition id: {0}")]
    BadPartitionId(#[from] std::num::ParseIntError),
    #[error("malformed value literal: {0}")]
    MalformedValue(#[from] serde_json::Error),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedValueType),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut parts = line.trim().splitn(4, ' ');
        let verb = parts.next().unwrap_or_default().to_ascii_uppercase();
        match verb.as_str() {
            "PUT" | "REPLICATE" => {
                let partition_id = parse_partition_id(parts.next())?;
                let key = parse_key(parts.next())?;
                let literal = parts.next().ok_or(CommandError::Invalid)?;
                let value = Value::from_json(serde_json::from_str(literal)?)?;
                if verb == "PUT" {
                    Ok(Command::Put {
                        partition_id,
                        key,
                        value,
                    })
                } else {
                    Ok(Command::Replicate {
                        partition_id,
                        key,
                        value,
                    })
                }
            }
            "GET" | "STATUS" | "HEX" => {
                let partition_id = parse_partition_id(parts.next())?;
                let key = parse_key(parts.next())?;
                if parts.next().is_some() {
                    return Err(CommandError::Invalid);
                }
                match verb.as_str() {
                    "GET" => Ok(Command::Get { partition_id, key }),
                    "STATUS" => Ok(Command::Status { partition_id, key }),
                    _ => Ok(Command::Hex { partition_id, key }),
                }
            }
            "INSPECT" => Ok(Command::Inspect),
            "SHUTDOWN" => Ok(Command::Shutdown),
            _ => Err(CommandError::Invalid),
        }
    }
}

fn parse_partition_id(token: Option<&str>) -> Result<u64, CommandError> {
    let token = token.ok_or(CommandError::Invalid)?;
    Ok(token.parse::<u64>()?)
}

fn parse_key(token: Option<&str>) -> Result<String, CommandError> {
    match token {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(CommandError::Invalid),
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Put {
                partition_id,
                key,
                value,
            } => write!(f, "PUT {partition_id} {key} {}", value.to_json()),
            Command::Get { partition_id, key } => write!(f, "GET {partition_id} {key}"),
            Command::Replicate {
                partition_id,
                key,
                value,
            } => write!(f, "REPLICATE {partition_id} {key} {}", value.to_json()),
            Command::Status { partition_id, key } => write!(f, "STATUS {partition_id} {key}"),
            Command::Hex { partition_id, key } => write!(f, "HEX {partition_id} {key}"),
            Command::Inspect => write!(f, "INSPECT"),
            Command::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}
