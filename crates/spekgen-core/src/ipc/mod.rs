//! Inter-process communication with generator worker processes.
//!
//! A worker runs one pinned generator version. The host spawns it, checks
//! its version with a handshake and sends it generation requests.

pub mod protocol;
mod server;
mod worker;

pub use protocol::{WorkerCommand, WorkerResponse, read_message, write_message};
pub(crate) use server::panic_message;
pub use server::serve;
pub use worker::{WORKER_PATH_ENV, WorkerHandle, WorkerKillHandle, find_worker_binary, worker_binary_name};
