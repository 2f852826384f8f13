//! Docker Engine API access for doku.
//!
//! The scanners only talk to Docker through the [`DockerApi`] trait, which
//! exposes the four calls they need: full container and image listings,
//! the `system df` summary and the daemon version. [`EngineClient`] is the
//! production implementation speaking HTTP to the daemon socket.

mod api;
mod engine;
mod error;

pub use api::{
    ContainerConfig, ContainerFilter, ContainerInfo, ContainerState, DockerApi, GraphDriver,
    ImageInfo,
};
pub use engine::{Endpoint, EngineClient};
pub use error::DockerError;
