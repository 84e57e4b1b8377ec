//! Raw UDP liveness probe for newly-registered game servers (spec §4.5).
//!
//! Wire format (resolved here since the source left it unspecified): an
//! 8-byte magic `ARPING01` followed by an 8-byte random nonce; a reachable
//! server echoes the same 16 bytes back from the same address within the
//! configured timeout.

use crate::security::ProbeNonce;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;

pub const PROBE_MAGIC: &[u8; 8] = b"ARPING01";
const PACKET_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no echo received within {0:?}")]
    Timeout(Duration),
    #[error("echo arrived from {actual}, expected {expected}")]
    AddressMismatch {
        expected: SocketAddr,
        actual: SocketAddr,
    },
    #[error("echo payload did not match the probe sent")]
    UnexpectedEcho,
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
}

/// Send a probe to `target` and wait for its echo.
///
/// `bind_addr` is the local UDP socket address to probe from (spec
/// `config.matching.udp_probe_bind_addr`).
pub async fn validate_endpoint(
    bind_addr: &str,
    target: SocketAddr,
    timeout: Duration,
) -> Result<(), ProbeError> {
    let nonce = ProbeNonce::generate().map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::Other, "OS CSPRNG unavailable")
    })?;

    let mut payload = Vec::with_capacity(PACKET_LEN);
    payload.extend_from_slice(PROBE_MAGIC);
    payload.extend_from_slice(nonce.as_bytes());

    let socket = UdpSocket::bind(bind_addr).await?;
    socket.send_to(&payload, target).await?;

    let mut buf = [0u8; PACKET_LEN];
    let outcome = tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await;

    match outcome {
        Err(_) => Err(ProbeError::Timeout(timeout)),
        Ok(Err(io_err)) => Err(ProbeError::Io(io_err)),
        Ok(Ok((len, from))) => {
            if from != target {
                return Err(ProbeError::AddressMismatch {
                    expected: target,
                    actual: from,
                });
            }
            if len != PACKET_LEN || buf[..len] != payload[..] {
                return Err(ProbeError::UnexpectedEcho);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket as TokioUdpSocket;

    #[tokio::test]
    async fn echo_server_satisfies_probe() {
        let echo = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        let echo_addr = echo.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; PACKET_LEN];
            if let Ok((len, from)) = echo.recv_from(&mut buf).await {
                let _ = echo.send_to(&buf[..len], from).await;
            }
        });

        let result = validate_endpoint("127.0.0.1:0", echo_addr, Duration::from_millis(500)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn silent_target_times_out() {
        let dead = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let result =
            validate_endpoint("127.0.0.1:0", dead_addr, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ProbeError::Timeout(_))));
    }
}
