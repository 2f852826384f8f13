//! Docker's own disk usage accounting (`docker system df`).
//!
//! These types mirror the JSON returned by the Engine API `/system/df`
//! endpoint. The `containers` lists on images and volumes are not part of
//! Docker's answer; the system df scanner fills them from the container list.

use serde::{Deserialize, Serialize};

use crate::Mount;
use crate::serde_ext::null_as_default;

/// An image as accounted by `docker system df`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageUsage {
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repo_tags: Vec<String>,
    /// Creation time, unix seconds.
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub shared_size: i64,
    /// Number of containers as counted by Docker (-1 when not computed).
    #[serde(rename = "Containers", default)]
    pub container_count: i64,
    /// Names of the containers created from this image.
    #[serde(rename = "ContainerNames", default)]
    pub containers: Vec<String>,
}

/// A container as accounted by `docker system df`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerUsage {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(rename = "ImageID", default)]
    pub image_id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub size_rw: i64,
    #[serde(default)]
    pub size_root_fs: i64,
    #[serde(default)]
    pub state: String,
}

/// Size data Docker computes for a volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeUsageData {
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub ref_count: i64,
}

/// A volume as accounted by `docker system df`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeUsage {
    pub name: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub mountpoint: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage_data: VolumeUsageData,
    /// Names of the containers mounting this volume.
    #[serde(rename = "ContainerNames", default)]
    pub containers: Vec<String>,
}

impl VolumeUsage {
    /// Volume size in bytes, 0 when Docker did not compute it.
    pub fn size(&self) -> u64 {
        u64::try_from(self.usage_data.size).unwrap_or(0)
    }
}

/// A build cache record as accounted by `docker system df`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildCacheEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "InUse", default)]
    pub in_use: bool,
    #[serde(rename = "Shared", default)]
    pub shared: bool,
    #[serde(rename = "Size", default)]
    pub size: i64,
    #[serde(rename = "CreatedAt", default)]
    pub created_at: String,
    #[serde(rename = "LastUsedAt", default)]
    pub last_used_at: Option<String>,
    #[serde(rename = "UsageCount", default)]
    pub usage_count: i64,
}

/// Aggregate answer of the `/system/df` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemDf {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ImageUsage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub containers: Vec<ContainerUsage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub volumes: Vec<VolumeUsage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub build_cache: Vec<BuildCacheEntry>,
    #[serde(default)]
    pub layers_size: i64,
}

/// Docker daemon version information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DockerVersion {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(rename = "MinAPIVersion", default)]
    pub min_api_version: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub kernel_version: String,
}

/// One value of the `system_df` keyspace.
///
/// Each variant lives under its own fixed key, see [`DfEntry::key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DfEntry {
    Images(Vec<ImageUsage>),
    Containers(Vec<ContainerUsage>),
    Volumes(Vec<VolumeUsage>),
    BuildCache(Vec<BuildCacheEntry>),
    RootMount(Mount),
    Version(DockerVersion),
}

impl DfEntry {
    pub const IMAGES_KEY: &'static str = "image";
    pub const CONTAINERS_KEY: &'static str = "container";
    pub const VOLUMES_KEY: &'static str = "volume";
    pub const BUILD_CACHE_KEY: &'static str = "build_cache";
    pub const ROOT_MOUNT_KEY: &'static str = "root_mount";
    pub const VERSION_KEY: &'static str = "version";

    /// Storage key of this entry.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Images(_) => Self::IMAGES_KEY,
            Self::Containers(_) => Self::CONTAINERS_KEY,
            Self::Volumes(_) => Self::VOLUMES_KEY,
            Self::BuildCache(_) => Self::BUILD_CACHE_KEY,
            Self::RootMount(_) => Self::ROOT_MOUNT_KEY,
            Self::Version(_) => Self::VERSION_KEY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_df_from_engine_json() {
        let json = r#"{
            "LayersSize": 1092588,
            "Images": [{
                "Id": "sha256:2b8fd9751c4c0f5dd266fcae00707e67a2545ef34f9a29354585f93dac906749",
                "ParentId": "",
                "RepoTags": null,
                "Created": 1466724217,
                "Size": 1092588,
                "SharedSize": 0,
                "Containers": 1
            }],
            "Containers": [{
                "Id": "e575172ed11dc01bfce087fb27bee502db149e1a0fad7c296ad300bbff178148",
                "Names": ["/top"],
                "Image": "busybox",
                "ImageID": "sha256:2b8fd9751c4c0f5dd266fcae00707e67a2545ef34f9a29354585f93dac906749",
                "Created": 1466724217,
                "SizeRw": 100,
                "SizeRootFs": 1092588,
                "State": "exited"
            }],
            "Volumes": [{
                "Name": "my-volume",
                "Driver": "local",
                "Mountpoint": "/var/lib/docker/volumes/my-volume/_data",
                "Scope": "local",
                "CreatedAt": "2023-01-01T12:00:00Z",
                "UsageData": {"Size": 10920104, "RefCount": 2}
            }],
            "BuildCache": null
        }"#;

        let df: SystemDf = serde_json::from_str(json).unwrap();
        assert_eq!(df.images.len(), 1);
        assert!(df.images[0].repo_tags.is_empty());
        assert_eq!(df.images[0].container_count, 1);
        assert_eq!(df.containers[0].names, vec!["/top"]);
        assert_eq!(df.volumes[0].size(), 10920104);
        assert_eq!(df.volumes[0].usage_data.ref_count, 2);
        assert!(df.build_cache.is_empty());
    }

    #[test]
    fn test_df_entry_keys() {
        let entry = DfEntry::Version(DockerVersion::default());
        assert_eq!(entry.key(), "version");

        let json = serde_json::to_string(&DfEntry::Images(Vec::new())).unwrap();
        assert_eq!(json, r#"{"kind":"images","data":[]}"#);
    }
}
