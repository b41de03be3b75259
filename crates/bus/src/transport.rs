use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BusError;

/// Directory holding IPC sockets created by [`Transport::ipc`].
const IPC_DIR: &str = "/tmp/uptime";

/// ZeroMQ endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "address")]
pub enum Transport {
    /// Unix domain socket at the given path.
    Ipc(PathBuf),

    Tcp { host: String, port: u16 },
}

impl Transport {
    /// IPC socket named `name` under the shared socket directory.
    pub fn ipc(name: &str) -> Self {
        Self::Ipc(Path::new(IPC_DIR).join(format!("{name}.sock")))
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Parse `ipc:///path/to.sock` or `tcp://host:port`.
    pub fn parse(endpoint: &str) -> Result<Self, BusError> {
        let invalid = || BusError::InvalidEndpoint(endpoint.to_string());

        if let Some(path) = endpoint.strip_prefix("ipc://") {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Ipc(PathBuf::from(path)));
        }
        if let Some(addr) = endpoint.strip_prefix("tcp://") {
            let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
            let port = port.parse().map_err(|_| invalid())?;
            if host.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::tcp(host, port));
        }
        Err(invalid())
    }

    /// ZeroMQ endpoint address string.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Ipc(path) => format!("ipc://{}", path.display()),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }

    /// For IPC transports, create the socket's parent directory.
    ///
    /// ZeroMQ refuses to bind an IPC socket in a missing directory.
    pub fn ensure_ipc_dir(&self) -> std::io::Result<()> {
        if let Self::Ipc(path) = self {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}
