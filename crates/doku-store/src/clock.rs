//! Last-scan timestamp markers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::StoreError;

/// Writes `<dir>/<table>.timestamp` files holding the unix time of a scan start.
#[derive(Debug, Clone)]
pub struct ScanClock {
    dir: PathBuf,
}

impl ScanClock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Marker file for a table.
    pub fn path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.timestamp"))
    }

    /// Record that a scan of `table` starts now.
    pub fn mark(&self, table: &str) -> Result<PathBuf, StoreError> {
        self.mark_at(table, Utc::now())
    }

    pub fn mark_at(&self, table: &str, at: DateTime<Utc>) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let path = self.path(table);
        std::fs::write(&path, at.timestamp().to_string()).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    /// Start time of the last scan of `table`, if one was ever recorded.
    pub fn last(&self, table: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let path = self.path(table);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let secs: i64 = content
            .trim()
            .parse()
            .map_err(|_| StoreError::InvalidTimestamp { path: path.clone() })?;
        DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or(StoreError::InvalidTimestamp { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mark_and_read_back() {
        let temp = TempDir::new().unwrap();
        let clock = ScanClock::new(temp.path().join("db"));

        assert_eq!(clock.last("logfiles").unwrap(), None);

        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let path = clock.mark_at("logfiles", at).unwrap();

        assert_eq!(path.file_name().unwrap(), "logfiles.timestamp");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1700000000");
        assert_eq!(clock.last("logfiles").unwrap(), Some(at));
    }

    #[test]
    fn test_garbage_timestamp() {
        let temp = TempDir::new().unwrap();
        let clock = ScanClock::new(temp.path());
        std::fs::write(clock.path("overlay2"), "yesterday").unwrap();

        assert!(matches!(
            clock.last("overlay2"),
            Err(StoreError::InvalidTimestamp { .. })
        ));
    }
}
