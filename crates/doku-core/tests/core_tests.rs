use chrono::Utc;
use doku_core::{
    BindMountRecord, DfEntry, Mount, MountType, OverlayLayerRecord, ScanSettings, short_id,
};

#[test]
fn test_short_id() {
    assert_eq!(short_id("sha256:0123456789abcdef0123"), "0123456789ab");
    assert_eq!(short_id("7d2de847bebae847b"), "7d2de847beba");
    assert_eq!(short_id("abc"), "abc");
}

#[test]
fn test_bind_mount_record_lifecycle() {
    let mut record = BindMountRecord::provisional("/srv/data", "web");
    assert!(record.scan_in_progress);
    assert_eq!(record.size, 0);
    assert_eq!(record.containers, vec!["web".to_string()]);

    record.finish(4096);
    assert!(!record.scan_in_progress);
    assert!(!record.err);
    assert_eq!(record.size, 4096);

    record.fail();
    assert!(record.err);
    assert_eq!(record.size, 0);
    assert!(!record.scan_in_progress);
}

#[test]
fn test_overlay_record_lifecycle() {
    let mut record = OverlayLayerRecord::provisional(
        "f1e2d3c4b5a697887766554433221100",
        Utc::now(),
        "/usr/lib",
        true,
    );
    assert_eq!(record.short_id(), "f1e2d3c4b5a6");
    assert!(record.scan_in_progress);
    assert!(record.in_use);

    record.finish(123);
    assert_eq!(record.size, 123);
    assert!(!record.scan_in_progress);
}

#[test]
fn test_root_mount_entry_round_trip() {
    let mut mount = Mount::bind("/var/lib/docker", "/hostroot");
    mount.root = true;

    let entry = DfEntry::RootMount(mount.clone());
    let json = serde_json::to_string(&entry).unwrap();
    assert!(json.contains(r#""Source":"/var/lib/docker""#));
    assert!(json.contains(r#""Type":"bind""#));

    let decoded: DfEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, DfEntry::RootMount(mount));
    assert_eq!(decoded.key(), DfEntry::ROOT_MOUNT_KEY);
}

#[test]
fn test_volume_mount_type() {
    let mount: Mount = serde_json::from_str(
        r#"{"Type":"volume","Name":"pgdata","Source":"/var/lib/docker/volumes/pgdata/_data","Destination":"/var/lib/postgresql/data","RW":true}"#,
    )
    .unwrap();
    assert_eq!(mount.kind, MountType::Volume);
    assert_eq!(mount.name.as_deref(), Some("pgdata"));
    assert!(mount.is_volume());
}

#[test]
fn test_settings_serde_defaults() {
    let settings: ScanSettings = serde_json::from_str(r#"{"db_dir":"/db"}"#).unwrap();
    assert!(settings.use_du);
    assert!(settings.bindmount_ignore_patterns.is_empty());
    assert!(!settings.identity.in_docker);
    assert_eq!(settings.bindmounts_interval.as_secs(), 3600);
}
