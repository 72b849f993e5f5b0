//! Fleet daemon runtime: scheduler + sync processor + socket server.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_action, request_directory, request_search, request_status, request_stop,
    request_sync, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{run, start_blocking, SyncSummary};
