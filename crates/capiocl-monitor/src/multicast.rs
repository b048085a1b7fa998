// SPDX-License-Identifier: Apache-2.0
//! Commit state synchronized across processes via UDP multicast.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::{CommitBackend, MonitorFailure};

/// Maximum path length accepted on the wire, matching the original's
/// `PATH_MAX`.
pub const PATH_MAX: usize = 4096;
/// Maximum total datagram size: one command byte, one space, the path.
pub const MESSAGE_SIZE: usize = PATH_MAX + 2;

const COMMIT_BYTE: u8 = b'!';
const REQUEST_BYTE: u8 = b'?';
const RECHECK_DELAY: Duration = Duration::from_millis(300);

/// Construction parameters for [`MulticastBackend`].
#[derive(Debug, Clone)]
pub struct MulticastConfig {
    /// Multicast group address.
    pub group: Ipv4Addr,
    /// UDP port shared by every participant.
    pub port: u16,
    /// When `true`, an unrecognized command byte is a fatal listener error;
    /// when `false`, it is logged and skipped.
    pub strict: bool,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            group: Ipv4Addr::new(224, 224, 224, 1),
            port: 12345,
            strict: false,
        }
    }
}

/// Commit state backed by a UDP multicast group. Every process holds a
/// local cache of known-committed paths, kept warm by commit announcements
/// and refreshed on demand by request/re-announce round trips.
#[derive(Debug)]
pub struct MulticastBackend {
    send_socket: UdpSocket,
    group_addr: SocketAddr,
    committed: Arc<Mutex<HashSet<String>>>,
    shutdown: Arc<Notify>,
    listener_failure: Arc<Mutex<Option<String>>>,
    listener: JoinHandle<()>,
}

impl MulticastBackend {
    /// Binds the listener socket, joins the multicast group, and spawns the
    /// background listener task.
    pub async fn new(config: MulticastConfig) -> Result<Self, MonitorFailure> {
        let listen_socket = build_listen_socket(config.group, config.port)?;
        listen_socket
            .set_nonblocking(true)
            .map_err(MonitorFailure::Socket)?;
        let listen_socket =
            UdpSocket::from_std(listen_socket.into()).map_err(MonitorFailure::Socket)?;

        let send_socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(MonitorFailure::Socket)?;
        send_socket
            .set_multicast_loop_v4(true)
            .map_err(MonitorFailure::Socket)?;

        let committed = Arc::new(Mutex::new(HashSet::new()));
        let shutdown = Arc::new(Notify::new());
        let listener_failure = Arc::new(Mutex::new(None));
        let group_addr = SocketAddr::V4(SocketAddrV4::new(config.group, config.port));

        let listener = tokio::spawn(listen_loop(
            listen_socket,
            Arc::clone(&committed),
            Arc::clone(&shutdown),
            Arc::clone(&listener_failure),
            group_addr,
            config.strict,
        ));

        Ok(Self {
            send_socket,
            group_addr,
            committed,
            shutdown,
            listener_failure,
            listener,
        })
    }

    /// Signals the listener task to exit and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener task panicked.
    pub async fn shutdown(self) -> Result<(), MonitorFailure> {
        self.shutdown.notify_one();
        self.listener
            .await
            .map_err(|e| MonitorFailure::ListenerTerminated(e.to_string()))
    }

    async fn send(&self, command: u8, path: &str) -> Result<(), MonitorFailure> {
        if path.len() > PATH_MAX {
            return Err(MonitorFailure::MalformedDatagram(format!(
                "path exceeds PATH_MAX ({} > {PATH_MAX})",
                path.len()
            )));
        }
        let mut datagram = Vec::with_capacity(path.len() + 2);
        datagram.push(command);
        datagram.push(b' ');
        datagram.extend_from_slice(path.as_bytes());
        self.send_socket
            .send_to(&datagram, self.group_addr)
            .await
            .map_err(MonitorFailure::Socket)?;
        Ok(())
    }
}

impl Drop for MulticastBackend {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

#[async_trait::async_trait]
impl CommitBackend for MulticastBackend {
    async fn is_committed(&self, path: &str) -> Result<bool, MonitorFailure> {
        if let Some(failure) = self.listener_failure.lock().await.clone() {
            return Err(MonitorFailure::ListenerTerminated(failure));
        }
        if self.committed.lock().await.contains(path) {
            return Ok(true);
        }
        self.send(REQUEST_BYTE, path).await?;
        tokio::time::sleep(RECHECK_DELAY).await;
        Ok(self.committed.lock().await.contains(path))
    }

    async fn set_committed(&self, path: &str) -> Result<(), MonitorFailure> {
        self.send(COMMIT_BYTE, path).await?;
        self.committed.lock().await.insert(path.to_string());
        tracing::trace!(path, "announced commit over multicast");
        Ok(())
    }
}

fn build_listen_socket(group: Ipv4Addr, port: u16) -> Result<Socket, MonitorFailure> {
    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, None).map_err(MonitorFailure::Socket)?;
    socket.set_reuse_address(true).map_err(MonitorFailure::Socket)?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(MonitorFailure::Socket)?;
    let bind_addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into();
    socket
        .bind(&bind_addr.into())
        .map_err(MonitorFailure::Socket)?;
    socket
        .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        .map_err(MonitorFailure::Socket)?;
    Ok(socket)
}

async fn listen_loop(
    socket: UdpSocket,
    committed: Arc<Mutex<HashSet<String>>>,
    shutdown: Arc<Notify>,
    listener_failure: Arc<Mutex<Option<String>>>,
    group_addr: SocketAddr,
    strict: bool,
) {
    let mut buf = [0u8; MESSAGE_SIZE];
    loop {
        tokio::select! {
            () = shutdown.notified() => {
                tracing::debug!("multicast listener shutting down");
                return;
            }
            recv = socket.recv_from(&mut buf) => {
                let (len, _from) = match recv {
                    Ok(v) => v,
                    Err(e) => {
                        *listener_failure.lock().await = Some(e.to_string());
                        tracing::warn!(error = %e, "multicast recv failed, listener exiting");
                        return;
                    }
                };
                if len < 2 || buf[1] != b' ' {
                    tracing::warn!(len, "malformed multicast datagram, skipping");
                    continue;
                }
                let command = buf[0];
                let path = String::from_utf8_lossy(&buf[2..len]).into_owned();
                match command {
                    COMMIT_BYTE => {
                        committed.lock().await.insert(path);
                    }
                    REQUEST_BYTE => {
                        let known = committed.lock().await.contains(&path);
                        if known {
                            let mut datagram = Vec::with_capacity(path.len() + 2);
                            datagram.push(COMMIT_BYTE);
                            datagram.push(b' ');
                            datagram.extend_from_slice(path.as_bytes());
                            if let Err(e) = socket.send_to(&datagram, group_addr).await {
                                tracing::warn!(error = %e, "failed to re-announce commit");
                            }
                        }
                    }
                    other => {
                        if strict {
                            let msg = format!("unknown command byte 0x{other:02x}");
                            *listener_failure.lock().await = Some(msg.clone());
                            tracing::warn!(command = other, "fatal: {msg}");
                            return;
                        }
                        tracing::warn!(command = other, "ignoring unknown command byte");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn test_config(port: u16) -> MulticastConfig {
        MulticastConfig {
            group: Ipv4Addr::new(224, 224, 224, 1),
            port,
            strict: false,
        }
    }

    #[tokio::test]
    async fn commit_is_visible_locally() {
        let backend = MulticastBackend::new(test_config(23_450)).await.unwrap();
        assert!(!backend.is_committed("/a/b").await.unwrap());
        backend.set_committed("/a/b").await.unwrap();
        assert!(backend.committed.lock().await.contains("/a/b"));
        backend.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn two_backends_converge_on_commit() {
        let a = MulticastBackend::new(test_config(23_451)).await.unwrap();
        let b = MulticastBackend::new(test_config(23_451)).await.unwrap();

        a.set_committed("/shared/out").await.unwrap();
        assert!(a.is_committed("/shared/out").await.unwrap());

        // b should learn of the commit either via the initial announcement
        // (racy on a loopback multicast join) or via its own request/re-announce.
        let seen = b.is_committed("/shared/out").await.unwrap();
        assert!(seen);

        a.shutdown().await.unwrap();
        b.shutdown().await.unwrap();
    }
}
