//! Read-only summary of the persisted scan results.

use std::path::Path;

use chrono::{DateTime, Utc};
use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use doku_core::{BindMountRecord, DfEntry, LogRecord, OverlayLayerRecord, ScanSettings};
use doku_store::{
    KvStore, ScanClock, TABLE_BINDMOUNTS, TABLE_LOGFILES, TABLE_OVERLAY2, TABLE_SYSTEM_DF,
};

use crate::OutputFormat;

/// Totals of one category of disk usage.
#[derive(Debug, Default, Serialize)]
struct Row {
    name: &'static str,
    items: usize,
    total_size: u64,
    errors: usize,
    in_progress: usize,
    last_scan: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize)]
struct Report {
    docker_version: Option<String>,
    root_mount: Option<String>,
    rows: Vec<Row>,
}

impl Report {
    fn total_size(&self) -> u64 {
        self.rows.iter().map(|r| r.total_size).sum()
    }
}

pub fn run_report(settings: &ScanSettings, format: OutputFormat) -> Result<()> {
    let report = build_report(settings)?;

    match format {
        OutputFormat::Text => print_text(&report, settings.si),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn build_report(settings: &ScanSettings) -> Result<Report> {
    let clock = ScanClock::new(&settings.db_dir);
    let mut report = Report::default();

    let df_scan = clock.last(TABLE_SYSTEM_DF)?;
    let mut images = Row::new("images", df_scan);
    let mut containers = Row::new("containers", df_scan);
    let mut volumes = Row::new("volumes", df_scan);
    let mut build_cache = Row::new("build cache", df_scan);
    let mut logs = Row::new("log files", clock.last(TABLE_LOGFILES)?);

    if let Some(store) = open_existing(&settings.df_db_path())? {
        for entry in store.table::<DfEntry>(TABLE_SYSTEM_DF)?.get_all()? {
            match entry {
                DfEntry::Images(list) => {
                    images.add_all(list.iter().map(|i| clamp(i.size)));
                }
                DfEntry::Containers(list) => {
                    containers.add_all(list.iter().map(|c| clamp(c.size_rw)));
                }
                DfEntry::Volumes(list) => {
                    volumes.add_all(list.iter().map(|v| v.size()));
                }
                DfEntry::BuildCache(list) => {
                    build_cache.add_all(list.iter().map(|b| clamp(b.size)));
                }
                DfEntry::RootMount(mount) => report.root_mount = Some(mount.to_string()),
                DfEntry::Version(version) => report.docker_version = Some(version.version),
            }
        }

        for record in store.table::<LogRecord>(TABLE_LOGFILES)?.get_all()? {
            logs.add(record.size);
        }
    }

    let mut bind_mounts = Row::new("bind mounts", clock.last(TABLE_BINDMOUNTS)?);
    let mut overlay2 = Row::new("overlay2 layers", clock.last(TABLE_OVERLAY2)?);

    if let Some(store) = open_existing(&settings.du_db_path())? {
        for record in store.table::<BindMountRecord>(TABLE_BINDMOUNTS)?.get_all()? {
            bind_mounts.add_record(record.size, record.err, record.scan_in_progress);
        }
        for record in store.table::<OverlayLayerRecord>(TABLE_OVERLAY2)?.get_all()? {
            overlay2.add_record(record.size, record.err, record.scan_in_progress);
        }
    }

    report.rows = vec![
        images,
        containers,
        volumes,
        build_cache,
        logs,
        bind_mounts,
        overlay2,
    ];
    Ok(report)
}

impl Row {
    fn new(name: &'static str, last_scan: Option<DateTime<Utc>>) -> Self {
        Self {
            name,
            last_scan,
            ..Self::default()
        }
    }

    fn add(&mut self, size: u64) {
        self.items += 1;
        self.total_size += size;
    }

    fn add_all(&mut self, sizes: impl Iterator<Item = u64>) {
        for size in sizes {
            self.add(size);
        }
    }

    fn add_record(&mut self, size: u64, err: bool, in_progress: bool) {
        self.add(size);
        self.errors += usize::from(err);
        self.in_progress += usize::from(in_progress);
    }
}

/// Docker reports unknown sizes as -1.
fn clamp(size: i64) -> u64 {
    u64::try_from(size).unwrap_or(0)
}

/// Open a database only if a scan already created it.
fn open_existing(path: &Path) -> Result<Option<KvStore>> {
    if !path.exists() {
        return Ok(None);
    }
    let store =
        KvStore::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Some(store))
}

fn format_size(bytes: u64, si: bool) -> String {
    if si {
        humansize::format_size(bytes, humansize::DECIMAL)
    } else {
        humansize::format_size(bytes, humansize::BINARY)
    }
}

fn print_text(report: &Report, si: bool) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" Docker Disk Usage Report");
    if let Some(ref version) = report.docker_version {
        println!(" Docker {version}");
    }
    match report.root_mount {
        Some(ref mount) => println!(" Root mount: {mount}"),
        None => println!(" Root mount: not found"),
    }
    println!("{}", "─".repeat(70));
    println!();

    println!(
        "   {:<16} {:>8} {:>12}  {:<20}",
        "CATEGORY", "ITEMS", "SIZE", "LAST SCAN"
    );
    for row in &report.rows {
        let last_scan = row
            .last_scan
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "   {:<16} {:>8} {:>12}  {:<20}",
            row.name,
            row.items,
            format_size(row.total_size, si),
            last_scan
        );
        if row.errors > 0 || row.in_progress > 0 {
            println!(
                "   {:<16} {} unreachable, {} still being measured",
                "", row.errors, row.in_progress
            );
        }
    }

    println!();
    println!(" Total: {}", format_size(report.total_size(), si));
    println!();
}
