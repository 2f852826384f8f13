//! Scan configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ScanError;

/// How hard a scan may push the host's CPU and disks.
///
/// Every 100 filesystem entries the size probe sleeps for
/// [`ScanIntensity::sleep_duration`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScanIntensity {
    /// No sleep at all.
    Aggressive,
    /// 1ms every 100 entries.
    #[default]
    Normal,
    /// 10ms every 100 entries.
    Light,
}

impl ScanIntensity {
    /// Sleep applied by the throttle.
    pub fn sleep_duration(self) -> Duration {
        match self {
            Self::Aggressive => Duration::ZERO,
            Self::Normal => Duration::from_millis(1),
            Self::Light => Duration::from_millis(10),
        }
    }
}

/// How the scanner finds its own container among all containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfIdentity {
    /// Whether the scanner runs inside a container at all.
    #[serde(default)]
    pub in_docker: bool,
    /// Label filter (`key=value`) carried by the scanner's container.
    #[serde(default = "default_label")]
    pub label: String,
    /// Local hostname, used to pick between several labelled containers.
    #[serde(default)]
    pub hostname: Option<String>,
}

fn default_label() -> String {
    "github.repo=amerkurev/doku".to_string()
}

impl Default for SelfIdentity {
    fn default() -> Self {
        Self {
            in_docker: false,
            label: default_label(),
            hostname: None,
        }
    }
}

/// Configuration shared by all scanners.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanSettings {
    /// Directory holding the databases and last-scan timestamp files.
    pub db_dir: PathBuf,

    /// Interval between `docker system df` scans.
    #[builder(default = "Duration::from_secs(60)")]
    #[serde(default = "default_df_interval")]
    pub df_interval: Duration,

    /// Interval between log file scans.
    #[builder(default = "Duration::from_secs(60)")]
    #[serde(default = "default_df_interval")]
    pub logfile_interval: Duration,

    /// Interval between bind mount scans.
    #[builder(default = "Duration::from_secs(60 * 60)")]
    #[serde(default = "default_bindmounts_interval")]
    pub bindmounts_interval: Duration,

    /// Interval between overlay2 scans.
    #[builder(default = "Duration::from_secs(24 * 60 * 60)")]
    #[serde(default = "default_overlay2_interval")]
    pub overlay2_interval: Duration,

    /// Throttling level for directory walks.
    #[builder(default)]
    #[serde(default)]
    pub intensity: ScanIntensity,

    /// Prefer the `du` utility over an in-process walk.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub use_du: bool,

    /// Shell-glob patterns of bind mount host paths that are never measured.
    #[builder(default)]
    #[serde(default)]
    pub bindmount_ignore_patterns: Vec<String>,

    /// Self-discovery parameters.
    #[builder(default)]
    #[serde(default)]
    pub identity: SelfIdentity,

    /// Format sizes with SI units (base 1000) instead of binary units.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub si: bool,
}

fn default_true() -> bool {
    true
}

fn default_df_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_bindmounts_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_overlay2_interval() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl ScanSettingsBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.db_dir {
            Some(ref dir) if dir.as_os_str().is_empty() => {
                return Err("Database directory cannot be empty".to_string());
            }
            None => return Err("Database directory is required".to_string()),
            _ => {}
        }

        let intervals = [
            ("df", self.df_interval),
            ("logfile", self.logfile_interval),
            ("bindmounts", self.bindmounts_interval),
            ("overlay2", self.overlay2_interval),
        ];
        for (name, interval) in intervals {
            if interval == Some(Duration::ZERO) {
                return Err(format!("The {name} scan interval must be positive"));
            }
        }

        if let Some(ref patterns) = self.bindmount_ignore_patterns {
            compile_patterns(patterns).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl ScanSettings {
    /// Create a new settings builder.
    pub fn builder() -> ScanSettingsBuilder {
        ScanSettingsBuilder::default()
    }

    /// Create settings with defaults for everything except the database directory.
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: db_dir.into(),
            df_interval: default_df_interval(),
            logfile_interval: default_df_interval(),
            bindmounts_interval: default_bindmounts_interval(),
            overlay2_interval: default_overlay2_interval(),
            intensity: ScanIntensity::default(),
            use_du: true,
            bindmount_ignore_patterns: Vec::new(),
            identity: SelfIdentity::default(),
            si: true,
        }
    }

    /// Database for the system df and log file tables.
    pub fn df_db_path(&self) -> PathBuf {
        self.db_dir.join("df.sqlite3")
    }

    /// Database for the bind mount and overlay2 tables.
    pub fn du_db_path(&self) -> PathBuf {
        self.db_dir.join("du.sqlite3")
    }

    /// Throttle sleep derived from the scan intensity.
    pub fn sleep_duration(&self) -> Duration {
        self.intensity.sleep_duration()
    }

    /// Compile the bind mount ignore patterns.
    pub fn ignore_set(&self) -> Result<GlobSet, ScanError> {
        compile_patterns(&self.bindmount_ignore_patterns)
    }
}

/// `*` crosses `/` and backslashes are literal, as in shell fnmatch.
/// `{a,b}` is an alternation.
fn compile_patterns(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .backslash_escape(false)
            .build()
            .map_err(|e| {
                ScanError::invalid_config(format!("bad ignore pattern {pattern:?}: {e}"))
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ScanError::invalid_config(e.to_string()))
}
