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

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Upper bound on a single reply, matching the node's one-shot framing.
pub const MAX_REPLY_BYTES: usize = 1024;

/// Sends one request line over a fresh connection and returns the reply.
///
/// Transport failures never surface as errors: they fold into the reply
/// string (`Error: ...`) so callers can pass them through verbatim. No
/// retries, no persistent connections.
pub async fn send_request(host: &str, port: u16, message: &str) -> String {
    match try_send(host, port, message).await {
        Ok(reply) => reply,
        Err(err) if err.kind() == std::io::ErrorKind::ConnectionRefused => {
            format!("Error: Connection refused from {host}:{port}. Node might be down.")
        }
        Err(err) => format!("Error: {err}"),
    }
}

async fn try_send(host: &str, port: u16, message: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(message.as_bytes()).await?;
    let mut buf = vec![0u8; MAX_REPLY_BYTES];
    let n = stream.read(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}
