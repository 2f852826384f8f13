#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use doku_core::{DockerVersion, ScanIntensity, ScanSettings, SelfIdentity, SystemDf};
use doku_docker::{ContainerFilter, ContainerInfo, DockerApi, DockerError, ImageInfo};
use doku_scan::ScanContext;

pub const SELF_ID: &str = "5e1f5e1f5e1f0000000000000000000000000000000000000000000000000000";

/// In-memory Docker daemon.
#[derive(Default, Clone)]
pub struct FakeDocker {
    pub containers: Vec<ContainerInfo>,
    pub images: Vec<ImageInfo>,
    pub df: SystemDf,
    pub version: DockerVersion,
    pub unreachable: bool,
}

impl FakeDocker {
    fn check(&self) -> Result<(), DockerError> {
        if self.unreachable {
            return Err(DockerError::Connect {
                endpoint: "unix:///fake.sock".to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        Ok(())
    }
}

impl DockerApi for FakeDocker {
    fn containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerInfo>, DockerError> {
        self.check()?;
        Ok(self
            .containers
            .iter()
            .filter(|c| filter.accepts(c))
            .cloned()
            .collect())
    }

    fn images(&self) -> Result<Vec<ImageInfo>, DockerError> {
        self.check()?;
        Ok(self.images.clone())
    }

    fn disk_usage(&self) -> Result<SystemDf, DockerError> {
        self.check()?;
        Ok(self.df.clone())
    }

    fn version(&self) -> Result<DockerVersion, DockerError> {
        self.check()?;
        Ok(self.version.clone())
    }
}

/// A fake host: `docker/` stands for `/var/lib/docker`, `srv/` for `/srv`.
pub struct Host {
    pub temp: TempDir,
}

impl Host {
    pub fn new() -> Self {
        let host = Self {
            temp: TempDir::new().unwrap(),
        };
        host.write("docker/containers/self/self-json.log", 10);
        fs::create_dir_all(host.srv()).unwrap();
        host
    }

    pub fn docker_root(&self) -> PathBuf {
        self.temp.path().join("docker")
    }

    pub fn srv(&self) -> PathBuf {
        self.temp.path().join("srv")
    }

    pub fn db_dir(&self) -> PathBuf {
        self.temp.path().join("db")
    }

    /// Create a file of `size` bytes below the fake host root.
    pub fn write(&self, rel: &str, size: usize) -> PathBuf {
        let path = self.temp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, vec![b'x'; size]).unwrap();
        path
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.temp.path().join(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn settings(&self) -> ScanSettings {
        ScanSettings::builder()
            .db_dir(self.db_dir())
            .intensity(ScanIntensity::Aggressive)
            .use_du(false)
            .identity(SelfIdentity {
                in_docker: true,
                hostname: Some("doku-host".to_string()),
                ..SelfIdentity::default()
            })
            .build()
            .unwrap()
    }

    /// The scanner's container, seeing the Docker root and `/srv`.
    pub fn self_container(&self) -> ContainerInfo {
        container(json!({
            "Id": SELF_ID,
            "Name": "/doku",
            "Image": "sha256:d0c0",
            "Config": {"Hostname": "doku-host", "Labels": {"github.repo": "amerkurev/doku"}},
            "LogPath": "/var/lib/docker/containers/self/self-json.log",
            "State": {"Status": "running", "Running": true},
            "Mounts": [
                bind("/var/run/docker.sock", "/var/run/docker.sock"),
                bind("/var/lib/docker", self.docker_root().to_str().unwrap()),
                bind("/srv", self.srv().to_str().unwrap())
            ]
        }))
    }

    pub fn context(&self, docker: FakeDocker) -> ScanContext {
        ScanContext::new(Arc::new(docker), self.settings())
    }
}

pub fn bind(source: &str, destination: &str) -> Value {
    json!({"Type": "bind", "Source": source, "Destination": destination, "Mode": "", "RW": true})
}

pub fn container(value: Value) -> ContainerInfo {
    serde_json::from_value(value).unwrap()
}

/// A workload container with the given bind mounts.
pub fn workload(id: &str, name: &str, mounts: Vec<Value>) -> ContainerInfo {
    container(json!({
        "Id": id,
        "Name": format!("/{name}"),
        "Image": "sha256:aaaaaaaaaaaaaaaa",
        "Mounts": mounts
    }))
}
