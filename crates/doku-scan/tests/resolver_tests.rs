mod common;

use common::{FakeDocker, Host, SELF_ID, container};
use doku_core::SelfIdentity;
use doku_scan::MountResolver;
use serde_json::json;

fn labelled_twin(hostname: &str, running: bool) -> doku_docker::ContainerInfo {
    container(json!({
        "Id": "7417700000000000",
        "Name": "/doku-2",
        "Config": {"Hostname": hostname, "Labels": {"github.repo": "amerkurev/doku"}},
        "State": {"Running": running}
    }))
}

#[test]
fn test_single_labelled_container_is_self() {
    let host = Host::new();
    let docker = FakeDocker {
        containers: vec![
            host.self_container(),
            common::workload("0ther", "web", vec![]),
        ],
        ..Default::default()
    };
    let settings = host.settings();
    let resolver = MountResolver::new(&docker, &settings.identity);

    let me = resolver.find_self().unwrap().unwrap();
    assert_eq!(me.id, SELF_ID);
}

#[test]
fn test_hostname_breaks_ties() {
    let host = Host::new();
    let docker = FakeDocker {
        containers: vec![labelled_twin("elsewhere", true), host.self_container()],
        ..Default::default()
    };
    let settings = host.settings();
    let resolver = MountResolver::new(&docker, &settings.identity);
    assert_eq!(resolver.find_self().unwrap().unwrap().id, SELF_ID);

    let identity = SelfIdentity {
        hostname: Some("nobody".to_string()),
        ..settings.identity.clone()
    };
    let resolver = MountResolver::new(&docker, &identity);
    assert!(resolver.find_self().unwrap().is_none());

    let identity = SelfIdentity {
        hostname: None,
        ..settings.identity.clone()
    };
    let resolver = MountResolver::new(&docker, &identity);
    assert!(resolver.find_self().unwrap().is_none());
}

#[test]
fn test_stopped_labelled_container_is_ignored() {
    let host = Host::new();
    let docker = FakeDocker {
        containers: vec![labelled_twin("old-doku", false), host.self_container()],
        ..Default::default()
    };
    let identity = SelfIdentity {
        hostname: None,
        ..host.settings().identity
    };
    let resolver = MountResolver::new(&docker, &identity);

    assert_eq!(resolver.find_self().unwrap().unwrap().id, SELF_ID);
    assert!(resolver.root_mount().unwrap().is_some());
}

#[test]
fn test_no_labelled_container() {
    let host = Host::new();
    let docker = FakeDocker {
        containers: vec![common::workload("0ther", "web", vec![])],
        ..Default::default()
    };
    let settings = host.settings();
    let resolver = MountResolver::new(&docker, &settings.identity);

    assert!(resolver.find_self().unwrap().is_none());
    assert!(resolver.list_mounts().unwrap().is_empty());
}

#[test]
fn test_outside_docker_has_no_mounts() {
    let host = Host::new();
    let docker = FakeDocker {
        containers: vec![host.self_container()],
        ..Default::default()
    };
    let identity = SelfIdentity::default();
    let resolver = MountResolver::new(&docker, &identity);

    assert!(resolver.find_self().unwrap().is_none());
    assert!(resolver.list_mounts().unwrap().is_empty());
    assert!(resolver.root_mount().unwrap().is_none());
}

#[test]
fn test_root_mount_exposes_docker_root() {
    let host = Host::new();
    let docker = FakeDocker {
        containers: vec![host.self_container()],
        ..Default::default()
    };
    let settings = host.settings();
    let resolver = MountResolver::new(&docker, &settings.identity);

    let mounts = resolver.list_mounts().unwrap();
    assert_eq!(mounts.len(), 2);
    assert!(mounts.iter().all(|m| !m.is_docker_socket()));

    let root = resolver.root_mount().unwrap().unwrap();
    assert_eq!(root.source, "/var/lib/docker");
    assert_eq!(root.destination, host.docker_root().to_str().unwrap());
}

#[test]
fn test_docker_unreachable() {
    let host = Host::new();
    let docker = FakeDocker {
        unreachable: true,
        ..Default::default()
    };
    let settings = host.settings();
    let resolver = MountResolver::new(&docker, &settings.identity);
    assert!(resolver.find_self().is_err());
}
