//! Records persisted by the file-based scanners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size of one container's log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Short id of the container.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Image reference (first tag, or short image id).
    pub image: String,
    /// Host path of the log file.
    pub path: String,
    /// Log file size in bytes.
    pub size: u64,
    pub last_scan: DateTime<Utc>,
}

/// Size of one bind-mounted host path, shared by every container using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMountRecord {
    /// Host path of the bind mount.
    pub path: String,
    /// Set when the path could not be reached or measured.
    pub err: bool,
    pub size: u64,
    pub scan_in_progress: bool,
    pub last_scan: DateTime<Utc>,
    /// Containers using the bind mount.
    pub containers: Vec<String>,
}

impl BindMountRecord {
    /// A placeholder written before the path is measured.
    pub fn provisional(path: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            err: false,
            size: 0,
            scan_in_progress: true,
            last_scan: Utc::now(),
            containers: vec![container.into()],
        }
    }

    /// Record the measured size.
    pub fn finish(&mut self, size: u64) {
        self.size = size;
        self.err = false;
        self.scan_in_progress = false;
    }

    /// Record that the path could not be measured.
    pub fn fail(&mut self) {
        self.size = 0;
        self.err = true;
        self.scan_in_progress = false;
    }
}

/// Size of one overlay2 layer's `diff` directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayLayerRecord {
    /// Layer directory name.
    pub id: String,
    pub created: DateTime<Utc>,
    /// Where the layer content effectively starts inside `diff`.
    pub diff_root: String,
    pub err: bool,
    pub size: u64,
    pub scan_in_progress: bool,
    pub last_scan: DateTime<Utc>,
    /// Referenced by the graph driver data of a container or image.
    pub in_use: bool,
}

impl OverlayLayerRecord {
    /// A placeholder written before the layer is measured.
    pub fn provisional(
        id: impl Into<String>,
        created: DateTime<Utc>,
        diff_root: impl Into<String>,
        in_use: bool,
    ) -> Self {
        Self {
            id: id.into(),
            created,
            diff_root: diff_root.into(),
            err: false,
            size: 0,
            scan_in_progress: true,
            last_scan: Utc::now(),
            in_use,
        }
    }

    pub fn short_id(&self) -> &str {
        crate::short_id(&self.id)
    }

    /// Record the measured size.
    pub fn finish(&mut self, size: u64) {
        self.size = size;
        self.err = false;
        self.scan_in_progress = false;
    }

    /// Record that the layer could not be measured.
    pub fn fail(&mut self) {
        self.size = 0;
        self.err = true;
        self.scan_in_progress = false;
    }
}
