//! Docker disk usage scanners for doku.
//!
//! # Overview
//!
//! `doku-scan` measures what Docker occupies on the host while running inside
//! a container that only sees bind-mounted slices of the host filesystem.
//! Key pieces:
//!
//! - **Path mapping** from host paths to locally reachable paths ([`map_host_path`])
//! - **Size probing** with `du` delegation, throttling and cancellation ([`SizeProbe`])
//! - **Self discovery** of the scanner's own container and mounts ([`MountResolver`])
//! - **Four scanners**: system df, log files, bind mounts and overlay2 layers
//! - **Interval scheduling** with cooperative stop ([`ScanLoop`])
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use doku_core::ScanSettings;
//! use doku_docker::EngineClient;
//! use doku_scan::{BindMountScanner, ScanContext, Scanner};
//! use tokio_util::sync::CancellationToken;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let docker = EngineClient::new("unix:///var/run/docker.sock", runtime.handle().clone()).unwrap();
//! let ctx = ScanContext::new(Arc::new(docker), ScanSettings::new("/var/lib/doku"));
//!
//! let summary = BindMountScanner::new(ctx).scan(&CancellationToken::new()).unwrap();
//! println!("{} bind mounts, {} bytes", summary.items, summary.total_size);
//! ```

mod bind_mounts;
mod context;
mod df;
mod error;
mod logs;
mod mapper;
mod overlay2;
mod probe;
mod resolver;
mod scheduler;
mod summary;

pub use bind_mounts::BindMountScanner;
pub use context::{ScanContext, Scanner};
pub use df::{SystemDfScanner, attach_containers};
pub use error::{Error, Result};
pub use logs::LogScanner;
pub use mapper::{HOST_MOUNT_PREFIX, map_host_path};
pub use overlay2::{OVERLAY2_DIR, Overlay2Scanner, diff_root, in_use_layers};
pub use probe::{SizeProbe, THROTTLE_EVERY, du_available};
pub use resolver::{MountResolver, mounts_of};
pub use scheduler::ScanLoop;
pub use summary::ScanSummary;

// Re-export core types for convenience
pub use doku_core::{
    BindMountRecord, LogRecord, Mount, OverlayLayerRecord, ScanError, ScanIntensity, ScanSettings,
};
