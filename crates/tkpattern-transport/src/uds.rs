use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DeviceStream;

/// Unix domain socket endpoint for emulated devices.
///
/// The simulator binds one of these and serves a single host at a time; the
/// host side reaches it with [`UnixDomainSocket::connect`]. The socket file is
/// removed when the listener is dropped.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixDomainSocket {
    /// Permission mode for created socket paths.
    pub const SOCKET_MODE: u32 = 0o600;

    // `sockaddr_un.sun_path` is 108 bytes on Linux, 104 elsewhere.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on `path`, replacing a stale socket left behind by a
    /// previous run. Regular files at `path` are never removed.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(Self::SOCKET_MODE))
            .map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");
        Ok(Self { listener, path })
    }

    /// Accept the next host connection (blocking).
    pub fn accept(&self) -> Result<DeviceStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted host connection");
        Ok(DeviceStream::from_unix(stream))
    }

    /// Accept a host connection if one is waiting. `Ok(None)` otherwise.
    pub fn try_accept(&self) -> Result<Option<DeviceStream>> {
        self.listener
            .set_nonblocking(true)
            .map_err(TransportError::Accept)?;
        let accepted = self.listener.accept();
        self.listener
            .set_nonblocking(false)
            .map_err(TransportError::Accept)?;

        match accepted {
            Ok((stream, _addr)) => {
                // BSDs hand out accepted sockets with the listener's flags.
                stream.set_nonblocking(false)?;
                debug!(path = ?self.path, "accepted host connection");
                Ok(Some(DeviceStream::from_unix(stream)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Connect to a listening socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<DeviceStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to unix domain socket");
        Ok(DeviceStream::from_unix(stream))
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let still_ours = std::fs::symlink_metadata(&self.path)
            .map(|m| m.file_type().is_socket())
            .unwrap_or(false);
        if still_ours {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
