use std::path::{Path, PathBuf};

pub use fleet_core::config::fleet_dir as fleet_root;

pub const DAEMON_LABEL: &str = "dev.fleet.daemon";
pub const DAEMON_SOCKET: &str = "daemon.sock";
pub const DAEMON_PID: &str = "daemon.pid";

pub fn run_dir(home: &Path) -> PathBuf {
    fleet_root(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    fleet_root(home).join(DAEMON_SOCKET)
}

pub fn pid_path(home: &Path) -> PathBuf {
    run_dir(home).join(DAEMON_PID)
}
