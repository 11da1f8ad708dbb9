//! Byte transports between a simulated unit and the tracking server.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream, UdpSocket};

use crate::error::SessionError;

/// Largest acknowledgement read in one go.
pub const ACK_BUFFER_SIZE: usize = 1024;

/// Transport selected for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Tcp,
    Udp,
}

/// Outcome of waiting for an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Raw bytes the server sent back.
    Received(Bytes),
    /// Nothing arrived within the read window.
    TimedOut,
}

/// A connected transport, exclusively owned by one session.
#[derive(Debug)]
pub enum Transport {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Transport {
    /// Connect to `addr` within `connect_timeout`.
    ///
    /// For UDP this resolves the address and binds a connected socket.
    pub async fn connect(
        mode: TransportMode,
        addr: &str,
        connect_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let fail = |reason: String| SessionError::Connection {
            addr: addr.to_string(),
            reason,
        };
        let timed_out = || fail(format!("timed out after {:?}", connect_timeout));

        match mode {
            TransportMode::Tcp => {
                let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
                    Ok(Ok(s)) => s,
                    Ok(Err(e)) => return Err(fail(e.to_string())),
                    Err(_) => return Err(timed_out()),
                };
                stream.set_nodelay(true).map_err(|e| fail(e.to_string()))?;
                Ok(Transport::Tcp(stream))
            }
            TransportMode::Udp => {
                let remote = match tokio::time::timeout(connect_timeout, lookup_host(addr)).await {
                    Ok(Ok(mut addrs)) => addrs
                        .next()
                        .ok_or_else(|| fail("address did not resolve".to_string()))?,
                    Ok(Err(e)) => return Err(fail(e.to_string())),
                    Err(_) => return Err(timed_out()),
                };
                let local = if remote.is_ipv4() {
                    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
                } else {
                    SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
                };
                let socket = UdpSocket::bind(local).await.map_err(|e| fail(e.to_string()))?;
                socket.connect(remote).await.map_err(|e| fail(e.to_string()))?;
                Ok(Transport::Udp(socket))
            }
        }
    }

    pub fn mode(&self) -> TransportMode {
        match self {
            Transport::Tcp(_) => TransportMode::Tcp,
            Transport::Udp(_) => TransportMode::Udp,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match self {
            Transport::Tcp(stream) => stream.peer_addr().ok(),
            Transport::Udp(socket) => socket.peer_addr().ok(),
        }
    }

    /// Write one complete message.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), SessionError> {
        match self {
            Transport::Tcp(stream) => stream.write_all(data).await.map_err(SessionError::Transmit),
            Transport::Udp(socket) => {
                let sent = socket.send(data).await.map_err(SessionError::Transmit)?;
                if sent != data.len() {
                    return Err(SessionError::Transmit(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("datagram truncated: {} of {} bytes", sent, data.len()),
                    )));
                }
                Ok(())
            }
        }
    }

    /// Wait up to `wait` for acknowledgement bytes.
    ///
    /// A timeout is reported as [`Ack::TimedOut`]. On TCP, end of stream and
    /// read errors are fatal. On UDP, receive errors (typically an ICMP
    /// port-unreachable surfacing) count as no acknowledgement.
    pub async fn read_ack(&mut self, wait: Duration) -> Result<Ack, SessionError> {
        let mut buf = vec![0u8; ACK_BUFFER_SIZE];
        match self {
            Transport::Tcp(stream) => match tokio::time::timeout(wait, stream.read(&mut buf)).await {
                Err(_) => Ok(Ack::TimedOut),
                Ok(Ok(0)) => Err(SessionError::ConnectionClosed),
                Ok(Ok(n)) => Ok(Ack::Received(Bytes::copy_from_slice(&buf[..n]))),
                Ok(Err(e)) => Err(SessionError::Receive(e)),
            },
            Transport::Udp(socket) => match tokio::time::timeout(wait, socket.recv(&mut buf)).await {
                Err(_) => Ok(Ack::TimedOut),
                Ok(Ok(n)) => Ok(Ack::Received(Bytes::copy_from_slice(&buf[..n]))),
                Ok(Err(e)) => {
                    debug!("UDP receive failed, treating as no ack: {}", e);
                    Ok(Ack::TimedOut)
                }
            },
        }
    }

    /// Close the write side; errors are irrelevant at this point.
    pub async fn shutdown(&mut self) {
        if let Transport::Tcp(stream) = self {
            let _ = stream.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpSocket};

    #[tokio::test]
    async fn test_tcp_send_and_ack() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(b"ack").await.unwrap();
            buf
        });

        let mut transport = Transport::connect(TransportMode::Tcp, &addr, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(transport.mode(), TransportMode::Tcp);
        transport.send(b"ping").await.unwrap();

        let ack = transport.read_ack(Duration::from_secs(2)).await.unwrap();
        assert_eq!(ack, Ack::Received(Bytes::from_static(b"ack")));
        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_tcp_ack_timeout_is_not_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            drop(socket);
        });

        let mut transport = Transport::connect(TransportMode::Tcp, &addr, Duration::from_secs(2))
            .await
            .unwrap();
        let ack = transport.read_ack(Duration::from_millis(50)).await.unwrap();
        assert_eq!(ack, Ack::TimedOut);

        server.await.unwrap();
        let closed = transport.read_ack(Duration::from_secs(2)).await;
        assert!(matches!(closed, Err(SessionError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_tcp_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = Transport::connect(TransportMode::Tcp, &addr, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(SessionError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_tcp_connect_timeout() {
        // Once the backlog of a listener that never accepts is full, handshakes stall.
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut held = Vec::new();
        for _ in 0..8 {
            match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => held.push(stream),
                _ => break,
            }
        }

        let result =
            Transport::connect(TransportMode::Tcp, &addr.to_string(), Duration::from_millis(200)).await;
        match result {
            Err(SessionError::Connection { reason, .. }) => {
                assert!(reason.contains("timed out"), "unexpected reason: {}", reason)
            }
            other => panic!("expected a connect timeout, got {:?}", other),
        }
        drop(held);
        drop(listener);
    }

    #[tokio::test]
    async fn test_tcp_send_after_peer_close_is_transmit_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut transport = Transport::connect(TransportMode::Tcp, &addr, Duration::from_secs(2))
            .await
            .unwrap();
        server.await.unwrap();

        let mut result = Ok(());
        for _ in 0..50 {
            result = transport.send(b"ping").await;
            if result.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(
            matches!(result, Err(SessionError::Transmit(_))),
            "unexpected result: {:?}",
            result
        );
    }

    #[tokio::test]
    async fn test_udp_roundtrip() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let mut transport = Transport::connect(TransportMode::Udp, &addr, Duration::from_secs(2))
            .await
            .unwrap();
        transport.send(b"SA200ALV;1\r").await.unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"SA200ALV;1\r");
        server.send_to(b"ACK", from).await.unwrap();

        let ack = transport.read_ack(Duration::from_secs(2)).await.unwrap();
        assert_eq!(ack, Ack::Received(Bytes::from_static(b"ACK")));
    }
}
