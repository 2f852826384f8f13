//! HTTP client for the Docker Engine API.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Method, Request, header};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio::runtime::Handle;
use tracing::debug;

use doku_core::{DockerVersion, SystemDf};

use crate::{ContainerFilter, ContainerInfo, DockerApi, DockerError, ImageInfo};

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `unix:///var/run/docker.sock`
    Unix(PathBuf),
    /// `tcp://host:port`, plain HTTP.
    Tcp(String),
}

impl FromStr for Endpoint {
    type Err = DockerError;

    fn from_str(host: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| DockerError::InvalidHost {
            host: host.to_string(),
            message: message.to_string(),
        };

        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        let addr = host
            .strip_prefix("tcp://")
            .or_else(|| host.strip_prefix("http://"))
            .ok_or_else(|| invalid("expected unix:// or tcp:// scheme"))?;
        let addr = addr.trim_end_matches('/');
        if addr.is_empty() {
            return Err(invalid("missing address"));
        }
        Ok(Self::Tcp(addr.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

#[derive(Deserialize)]
struct IdOnly {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Docker Engine API client.
///
/// Requests are driven on the given tokio runtime handle; the blocking
/// [`DockerApi`] methods must not be called from inside an async task.
pub struct EngineClient {
    endpoint: Endpoint,
    version_prefix: String,
    timeout: Duration,
    handle: Handle,
}

impl EngineClient {
    /// Create a client for a `DOCKER_HOST` style address.
    pub fn new(host: &str, handle: Handle) -> Result<Self, DockerError> {
        Ok(Self {
            endpoint: host.parse()?,
            version_prefix: String::new(),
            timeout: Duration::from_secs(60),
            handle,
        })
    }

    /// Pin the API version (`1.43`, `v1.43`). `auto` uses the daemon's default.
    pub fn with_api_version(mut self, version: &str) -> Self {
        self.version_prefix = match version.trim() {
            "" | "auto" => String::new(),
            v => format!("/v{}", v.trim_start_matches('v')),
        };
        self
    }

    /// Per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn uri(&self, path: &str) -> String {
        format!("{}{}", self.version_prefix, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DockerError> {
        let uri = self.uri(path);
        let body = self.handle.block_on(async {
            match tokio::time::timeout(self.timeout, self.request(&uri)).await {
                Ok(result) => result,
                Err(_) => Err(DockerError::Timeout(self.timeout)),
            }
        })?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn request(&self, uri: &str) -> Result<Bytes, DockerError> {
        let connect_err = |source: std::io::Error| DockerError::Connect {
            endpoint: self.endpoint.to_string(),
            source,
        };
        match &self.endpoint {
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path).await.map_err(connect_err)?;
                send(stream, uri).await
            }
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await.map_err(connect_err)?;
                send(stream, uri).await
            }
        }
    }

    /// Inspect each listed object, skipping ones removed in the meantime.
    fn inspect_all<T: DeserializeOwned>(
        &self,
        list_path: &str,
        inspect_path: impl Fn(&str) -> String,
    ) -> Result<Vec<T>, DockerError> {
        let ids: Vec<IdOnly> = self.get(list_path)?;
        let mut items = Vec::with_capacity(ids.len());
        for IdOnly { id } in ids {
            match self.get(&inspect_path(&id)) {
                Ok(item) => items.push(item),
                Err(err) if err.is_not_found() => {
                    debug!(id = %id, "object disappeared before it could be inspected");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(items)
    }
}

async fn send<S>(stream: S, uri: &str) -> Result<Bytes, DockerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!(error = %err, "docker connection closed with error");
        }
    });

    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::HOST, "docker")
        .body(Empty::<Bytes>::new())
        .map_err(|e| DockerError::Request(e.to_string()))?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
        return Err(DockerError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(body)
}

fn containers_list_path(filter: &ContainerFilter) -> String {
    let mut query = Vec::new();
    if filter.all {
        query.push("all=true".to_string());
    }
    if let Some(ref label) = filter.label {
        let filters = serde_json::json!({ "label": [label] }).to_string();
        query.push(format!("filters={}", urlencoding::encode(&filters)));
    }

    if query.is_empty() {
        "/containers/json".to_string()
    } else {
        format!("/containers/json?{}", query.join("&"))
    }
}

impl DockerApi for EngineClient {
    fn containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerInfo>, DockerError> {
        self.inspect_all(&containers_list_path(filter), |id| {
            format!("/containers/{id}/json")
        })
    }

    fn images(&self) -> Result<Vec<ImageInfo>, DockerError> {
        self.inspect_all("/images/json?all=true", |id| {
            format!("/images/{}/json", urlencoding::encode(id))
        })
    }

    fn disk_usage(&self) -> Result<SystemDf, DockerError> {
        self.get("/system/df")
    }

    fn version(&self) -> Result<DockerVersion, DockerError> {
        self.get("/version")
    }
}
