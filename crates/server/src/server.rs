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

use error_stack::Result;
use error_stack::ResultExt;
use mea::latch::Latch;
use mea::waitgroup::WaitGroup;
use strata_node::Node;
use strata_protos::config::ClusterConfig;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ServerError(pub(crate) String);

pub(crate) type ServerFuture<T> = strata_runtime::JoinHandle<Result<T, ServerError>>;

/// A running node: its bound address, the accept-loop future, and the latch
/// that stops it.
#[derive(Debug)]
pub struct ServerState {
    advertise_addr: SocketAddr,
    serve_fut: ServerFuture<()>,
    shutdown: Arc<Latch>,
}

impl ServerState {
    pub fn advertise_addr(&self) -> SocketAddr {
        self.advertise_addr
    }

    pub fn shutdown_handle(&self) -> impl Fn() {
        let shutdown = self.shutdown.clone();
        move || shutdown.count_down()
    }

    pub fn shutdown(&self) {
        self.shutdown_handle()();
    }

    pub async fn await_shutdown(self) {
        self.shutdown.wait().await;

        match flatten(self.serve_fut).await {
            Ok(()) => log::info!("Strata node stopped."),
            Err(err) => log::error!(err:?; "Strata node failed."),
        }
    }
}

/// Binds the node's listener, recovers its partitions, and spawns the accept
/// loop. Returns once the node is ready to serve.
pub async fn start(node_id: u64, config: ClusterConfig) -> Result<ServerState, ServerError> {
    let make_error = move || ServerError(format!("failed to start node {node_id}"));

    config.topology.validate().change_context_lazy(make_error)?;
    let entry = config
        .topology
        .node(node_id)
        .ok_or_else(|| ServerError(format!("node id {node_id} not found in topology")))?;

    let listener = tokio::net::TcpListener::bind((entry.host.as_str(), entry.port))
        .await
        .change_context_lazy(|| {
            ServerError(format!(
                "failed to listen at {}:{} for node {node_id}",
                entry.host, entry.port
            ))
        })?;
    let advertise_addr = listener.local_addr().change_context_lazy(make_error)?;

    let shutdown = Arc::new(Latch::new(1));
    let wg = WaitGroup::new();

    // Partition recovery replays segment logs, so it runs on the blocking
    // pool.
    let node = {
        let config = config.clone();
        strata_runtime::io_runtime()
            .spawn_blocking(move || Node::new(node_id, &config))
            .await
            .map_err(|err| ServerError(format!("failed to build node {node_id}: {err}")))?
            .map(Arc::new)
            .change_context_lazy(make_error)?
    };

    let serve_fut = {
        let fut = strata_node::serve(node, listener, wg.clone(), shutdown.clone());
        strata_runtime::server_runtime()
            .spawn(async move { fut.await.change_context_lazy(make_error) })
    };

    // wait for the accept loop to take over the listener and return
    wg.await;
    Ok(ServerState {
        advertise_addr,
        serve_fut,
        shutdown,
    })
}

async fn flatten<T>(fut: ServerFuture<T>) -> Result<T, ServerError> {
    let make_error = || ServerError("failed to join server future".to_string());
    fut.await.change_context_lazy(make_error)?
}
