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

use std::net::SocketAddr;
use std::sync::Arc;

use error_stack::ResultExt;
use mea::latch::Latch;
use mea::waitgroup::WaitGroup;
use strata_protos::Command;
use strata_protos::CommandError;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;

use crate::Node;
use crate::NodeError;

/// Requests are a single line; anything longer is cut off at this bound,
/// matching the reply bound on the client side.
const MAX_REQUEST_BYTES: usize = 1024;

/// Accepts connections until the shutdown latch opens, spawning one handler
/// task per connection. Connections are one-shot: read once, reply once,
/// close.
pub async fn serve(
    node: Arc<Node>,
    listener: TcpListener,
    wg: WaitGroup,
    shutdown: Arc<Latch>,
) -> error_stack::Result<(), NodeError> {
    let addr = listener.local_addr().change_context_lazy(|| {
        NodeError("failed to get local address of node listener".to_string())
    })?;

    log::info!("node {} serving at {addr}", node.node_id());
    drop(wg);

    loop {
        let socket = tokio::select! {
            _ = shutdown.wait() => {
                log::info!("node {} is closing", node.node_id());
                return Ok(());
            }
            socket = listener.accept() => socket,
        };

        let (socket, remote_addr) = socket
            .change_context_lazy(|| NodeError("failed to accept new connections".to_string()))?;
        let node_ref = node.clone();
        let shutdown_ref = shutdown.clone();
        let _forget = strata_runtime::server_runtime().spawn(async move {
            if let Err(err) = process_request(socket, remote_addr, node_ref, shutdown_ref).await {
                log::error!("failed to process request: {err:?}");
            }
        });
    }
}

async fn process_request(
    mut socket: TcpStream,
    remote_addr: SocketAddr,
    node: Arc<Node>,
    shutdown: Arc<Latch>,
) -> error_stack::Result<(), NodeError> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let n = socket
        .read(&mut buf)
        .await
        .change_context_lazy(|| NodeError("failed to read request".to_string()))?;
    if n == 0 {
        return Ok(());
    }
    let line = String::from_utf8_lossy(&buf[..n]).into_owned();
    log::debug!("request from {remote_addr}: {}", line.trim_end());

    let reply = match Command::parse(&line) {
        Ok(Command::Shutdown) => {
            // Flush everything before acknowledging; counting the latch down
            // stops the accept loop once the reply is on the wire.
            let node_ref = node.clone();
            let reply = match strata_runtime::io_runtime()
                .spawn_blocking(move || node_ref.close())
                .await
            {
                Ok(Ok(())) => "SUCCESS: Shutting down.".to_string(),
                Ok(Err(err)) => format!("SERVER_ERROR: {err}"),
                Err(err) => format!("SERVER_ERROR: {err}"),
            };
            write_reply(&mut socket, &reply).await?;
            shutdown.count_down();
            return Ok(());
        }
        Ok(command) => node.dispatch(command).await,
        Err(CommandError::Invalid) => "ERROR: Invalid command".to_string(),
        Err(err) => format!("SERVER_ERROR: {err}"),
    };
    write_reply(&mut socket, &reply).await
}

async fn write_reply(
    socket: &mut TcpStream,
    reply: &str,
) -> error_stack::Result<(), NodeError> {
    socket
        .write_all(reply.as_bytes())
        .await
        .change_context_lazy(|| NodeError("failed to send reply".to_string()))
}
