//! UDP listener for device push events.
//!
//! The device sends its events to the port advertised in `X-AppPort`. The
//! listener only moves datagrams onto the queue; decoding happens in the
//! dispatcher.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::queue::EventQueue;
use crate::protocol_constants::MAX_DATAGRAM_SIZE;

/// Pause after a receive error so a persistent failure cannot spin the loop.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Binds the event socket on `0.0.0.0:port`.
///
/// No address or port reuse is requested: each device owns its port
/// exclusively, and a port already taken by another socket is an error.
///
/// Must be called inside a Tokio runtime.
pub fn bind_event_socket(port: u16) -> io::Result<UdpSocket> {
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_nonblocking(true)?;
    socket.bind(&bind_addr.into())?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Receives datagrams into `queue` until cancelled, then drops the socket.
pub async fn run_listener(socket: UdpSocket, queue: Arc<EventQueue>, cancel: CancellationToken) {
    let local = socket
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "?".to_string());
    log::info!("[Listener] Listening for events on {}", local);

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            r = socket.recv_from(&mut buf) => r,
        };

        match received {
            Ok((len, peer)) => {
                log::trace!("[Listener] {} bytes from {}", len, peer);
                queue.push(Bytes::copy_from_slice(&buf[..len]));
            }
            Err(e) => {
                log::warn!("[Listener] Receive error on {}: {}", local, e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECV_ERROR_BACKOFF) => {}
                }
            }
        }
    }

    log::info!("[Listener] Closed {}", local);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::queue::IngestStats;

    #[tokio::test]
    async fn datagrams_land_on_queue_until_cancelled() {
        let socket = bind_event_socket(0).unwrap();
        let port = socket.local_addr().unwrap().port();
        let queue = Arc::new(EventQueue::new(8, Arc::new(IngestStats::new())));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_listener(socket, Arc::clone(&queue), cancel.clone()));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(br#"{"device_id":"X"}"#, ("127.0.0.1", port))
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(2), queue.pop())
            .await
            .unwrap();
        assert_eq!(&message[..], br#"{"device_id":"X"}"#);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn second_bind_on_same_port_fails() {
        let first = bind_event_socket(0).unwrap();
        let port = first.local_addr().unwrap().port();

        let err = bind_event_socket(port).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);

        drop(first);
        assert!(bind_event_socket(port).is_ok());
    }
}
