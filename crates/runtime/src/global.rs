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

use std::num::NonZeroUsize;
use std::sync::OnceLock;

use mea::latch::Latch;

use crate::Builder;
use crate::Runtime;

pub use strata_protos::config::RuntimeOptions;

/// Logical CPU count, defaulting to one on platforms that cannot report it.
pub fn num_cpus() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or_else(|err| {
        log::warn!(err:?; "failed to fetch the available parallelism; fallback to 1");
        NonZeroUsize::MIN
    })
}

pub fn make_runtime(runtime_name: &str, thread_name: &str, worker_threads: usize) -> Runtime {
    log::info!(
        "creating runtime with runtime_name: {runtime_name}, thread_name: {thread_name}, worker_threads: {worker_threads}."
    );
    Builder::default()
        .runtime_name(runtime_name)
        .thread_name(thread_name)
        .worker_threads(worker_threads)
        .build()
        .expect("failed to create runtime")
}

#[cfg(any(test, feature = "test"))]
pub fn test_runtime() -> &'static Runtime {
    static RT: OnceLock<Runtime> = OnceLock::new();
    RT.get_or_init(|| make_runtime("test_runtime", "test_thread", 4))
}

#[derive(Debug)]
struct GlobalRuntimes {
    server_runtime: Runtime,
    io_runtime: Runtime,
}

static GLOBAL_RUNTIMES: OnceLock<GlobalRuntimes> = OnceLock::new();

pub fn init(opts: &RuntimeOptions) {
    GLOBAL_RUNTIMES.get_or_init(|| do_initialize_runtimes(opts));
}

fn do_initialize_runtimes(opts: &RuntimeOptions) -> GlobalRuntimes {
    log::info!("initializing global runtimes: {opts:?}");

    set_panic_hook();

    let RuntimeOptions {
        server_runtime_threads,
        io_runtime_threads,
    } = opts;

    let server_runtime = make_runtime(
        "server_runtime",
        "server_thread",
        server_runtime_threads
            .unwrap_or_else(default_server_threads)
            .get(),
    );
    let io_runtime = make_runtime(
        "io_runtime",
        "io_thread",
        io_runtime_threads.unwrap_or_else(default_io_threads).get(),
    );

    GlobalRuntimes {
        server_runtime,
        io_runtime,
    }
}

fn default_server_threads() -> NonZeroUsize {
    NonZeroUsize::new(2).unwrap()
}

fn default_io_threads() -> NonZeroUsize {
    num_cpus()
}

fn set_panic_hook() {
    std::panic::set_hook(Box::new(move |info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        log::error!("panic occurred: {info}\nbacktrace:\n{backtrace}");
        log::info!("shutting down runtimes");
        std::process::exit(1);
    }));
}

fn fetch_runtimes_or_default() -> &'static GlobalRuntimes {
    GLOBAL_RUNTIMES.get_or_init(|| do_initialize_runtimes(&RuntimeOptions::default()))
}

pub fn server_runtime() -> &'static Runtime {
    &fetch_runtimes_or_default().server_runtime
}

pub fn io_runtime() -> &'static Runtime {
    &fetch_runtimes_or_default().io_runtime
}

fn shutdown_latch() -> &'static Latch {
    static LATCH: OnceLock<Latch> = OnceLock::new();
    LATCH.get_or_init(|| Latch::new(1))
}

/// Requests process-wide shutdown. Idempotent; callable from any thread,
/// including signal handlers and panicking tasks.
pub fn shutdown() {
    shutdown_latch().count_down();
}

/// Resolves once [`shutdown`] has been requested.
pub async fn wait_shutdown() {
    shutdown_latch().wait().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_block_on() {
        let handle = server_runtime().spawn(async { 1 + 1 });
        assert_eq!(2, server_runtime().block_on(handle).unwrap());

        let handle = io_runtime().spawn(async { 4 + 4 });
        assert_eq!(8, io_runtime().block_on(handle).unwrap());
    }
}
