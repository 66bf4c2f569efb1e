use std::io;

use socket2::SockRef;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration, Instant};
use tracing::debug;

use crate::report::{FailureKind, ProbeResult};
use crate::target::Target;

/// One connect attempt against `target`. Resolution and connection share the
/// `limit` deadline; the stream is aborted as soon as it is established.
pub async fn probe_tcp(target: &Target, limit: Duration) -> ProbeResult {
    let start = Instant::now();
    match timeout(limit, connect(target)).await {
        Ok(Ok(conn)) => {
            let elapsed = start.elapsed();
            close_now(conn);
            debug!("tcp connect {} success: {:?}", target, elapsed);
            ProbeResult::connected(target.clone(), elapsed)
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => {
            debug!("tcp connect {} timed out in the OS: {}", target, e);
            ProbeResult::timed_out(target.clone())
        }
        Ok(Err(e)) => {
            debug!("tcp connect {} failed: {}", target, e);
            ProbeResult::failed(target.clone(), FailureKind::Dial, e.to_string())
        }
        Err(_elapsed) => {
            debug!("tcp connect {} timed out after {:?}", target, limit);
            ProbeResult::timed_out(target.clone())
        }
    }
}

async fn connect(target: &Target) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in target.resolve().await? {
        match TcpStream::connect(addr).await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                debug!("tcp connect {} via {} failed: {}", target, addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {}", target))
    }))
}

// Zero linger turns the close into an abort, so no data or FIN exchange follows.
fn close_now(conn: TcpStream) {
    if let Err(e) = SockRef::from(&conn).set_linger(Some(Duration::ZERO)) {
        debug!("set_linger failed: {}", e);
    }
    drop(conn);
}

#[cfg(test)]
mod tests {
    use super::*;
    use socket2::{Domain, Protocol, Socket, Type};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = probe_tcp(&Target::new("127.0.0.1", port), Duration::from_secs(1)).await;

        assert!(result.reachable, "{:?}", result);
        assert!(result.failure.is_none());
        assert!(result.latency_ms.is_some());
    }

    #[tokio::test]
    async fn closed_port_is_a_dial_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = probe_tcp(&Target::new("127.0.0.1", port), Duration::from_secs(1)).await;

        assert!(!result.reachable);
        assert_eq!(result.failure, Some(FailureKind::Dial));
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn unresolvable_host_is_unreachable() {
        let result = probe_tcp(
            &Target::new("no-such-host.invalid", 80),
            Duration::from_secs(2),
        )
        .await;

        assert!(!result.reachable);
        assert!(result.error.is_some());
    }

    /// Listener that never accepts, with its accept queue already full, so
    /// further SYNs are dropped and connects hang.
    async fn saturated_listener() -> (Socket, Vec<TcpStream>, SocketAddr) {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
        socket.bind(&SocketAddr::from(([127, 0, 0, 1], 0)).into()).unwrap();
        socket.listen(0).unwrap();
        let addr = socket.local_addr().unwrap().as_socket().unwrap();

        let mut held = Vec::new();
        for _ in 0..16 {
            match timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
                Ok(Ok(conn)) => held.push(conn),
                _ => break,
            }
        }
        (socket, held, addr)
    }

    #[tokio::test]
    async fn full_backlog_times_out_near_limit() {
        let (_socket, held, addr) = saturated_listener().await;
        assert!(!held.is_empty());

        let limit = Duration::from_millis(500);
        let start = Instant::now();
        let result = probe_tcp(&Target::new("127.0.0.1", addr.port()), limit).await;
        let elapsed = start.elapsed();

        assert!(!result.reachable);
        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert!(elapsed >= limit.mul_f64(0.8) && elapsed <= limit.mul_f64(1.2), "{:?}", elapsed);
    }

    #[tokio::test]
    #[ignore]
    async fn blackhole_address_times_out_near_limit() {
        let limit = Duration::from_millis(500);
        let start = Instant::now();

        let result = probe_tcp(&Target::new("10.255.255.1", 80), limit).await;
        let elapsed = start.elapsed();

        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert!(elapsed >= limit.mul_f64(0.8) && elapsed <= limit.mul_f64(1.2), "{:?}", elapsed);
    }
}
