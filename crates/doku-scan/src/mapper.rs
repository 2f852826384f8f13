//! Translate host paths into paths reachable from inside the scanner's container.

use std::path::PathBuf;

/// Prefix Docker Desktop puts in front of bind mount sources.
pub const HOST_MOUNT_PREFIX: &str = "/host_mnt";

/// Map `host_path` through a mount of `source` (host side) at `destination`
/// (container side).
///
/// Returns the local path only if it exists. When `source` is not a prefix of
/// `host_path` and starts with [`HOST_MOUNT_PREFIX`], the prefix is stripped
/// and the match retried once.
///
/// The prefix test is a plain string comparison, so a source of `/srv/a`
/// also claims `/srv/ab`; the existence check rejects most such accidents.
pub fn map_host_path(source: &str, destination: &str, host_path: &str) -> Option<PathBuf> {
    let mut source = source.trim_end_matches('/');
    let destination = destination.trim_end_matches('/');
    let host_path = host_path.trim_end_matches('/');

    if !host_path.starts_with(source) {
        source = source.strip_prefix(HOST_MOUNT_PREFIX)?;
        if !host_path.starts_with(source) {
            return None;
        }
    }

    let mut candidate = format!("{destination}{}", &host_path[source.len()..]);
    if candidate.is_empty() {
        candidate.push('/');
    }
    let candidate = PathBuf::from(candidate);
    candidate.exists().then_some(candidate)
}
