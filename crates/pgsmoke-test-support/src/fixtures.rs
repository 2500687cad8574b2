//! Test fixtures and environment helpers.

use std::path::Path;
use std::process::{Command, Stdio};

const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Returns `true` if a Docker daemon is reachable for integration tests.
#[must_use]
pub fn docker_available() -> bool {
    docker_reachable(std::env::var("DOCKER_HOST").ok().as_deref())
}

/// Returns `true` when the named test must be skipped because no container
/// runtime is reachable. Prints the skip reason to stderr.
#[must_use]
pub fn skip_without_docker(test_name: &str) -> bool {
    if docker_available() {
        return false;
    }
    eprintln!("skipping {test_name}: docker socket missing");
    true
}

/// A `unix://` host must point at an existing socket; any other explicit
/// host is trusted. Without one, the default socket or a working CLI will do.
fn docker_reachable(docker_host: Option<&str>) -> bool {
    match docker_host.map(str::trim).filter(|host| !host.is_empty()) {
        Some(host) => host
            .strip_prefix("unix://")
            .is_none_or(|socket| Path::new(socket).exists()),
        None => Path::new(DEFAULT_DOCKER_SOCKET).exists() || docker_cli_responds(),
    }
}

fn docker_cli_responds() -> bool {
    Command::new("docker")
        .arg("info")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_unix_socket_is_unavailable() {
        assert!(!docker_reachable(Some("unix:///definitely/missing.sock")));
    }

    #[test]
    fn tcp_host_is_assumed_available() {
        assert!(docker_reachable(Some("tcp://127.0.0.1:2375")));
    }

    #[test]
    fn blank_host_falls_back_to_local_checks() {
        assert_eq!(docker_reachable(Some("   ")), docker_reachable(None));
    }

    #[test]
    fn skip_guard_agrees_with_availability() {
        assert_eq!(skip_without_docker("skip_guard_agrees_with_availability"), !docker_available());
    }
}
