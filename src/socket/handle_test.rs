use std::io;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;

use super::handle::*;
use super::socket_mock::*;
use super::*;

const REQUEST: &[u8] = &[0x02];

fn target(ip: &str) -> SocketAddr {
    SocketAddr::new(ip.parse().unwrap(), 1434)
}

#[tokio::test(start_paused = true)]
async fn test_handle_delivers_reply() -> Result<()> {
    let net = MockNetwork::new().reply("10.0.0.1", 5, b"reply");
    let stats = Arc::clone(&net.stats);

    let (tx, rx) = oneshot::channel();
    let handle = SocketHandle::open(&net, target("10.0.0.1"), Bytes::from_static(REQUEST), move |r| {
        let _ = tx.send(r);
    });
    assert_eq!(handle.family(), AddressFamily::V4);
    assert_eq!(handle.target(), target("10.0.0.1"));

    let reply = rx.await.unwrap()?;
    assert_eq!(&reply[..], b"reply");
    assert_eq!(stats.payloads(), vec![REQUEST.to_vec()]);
    assert!(handle.is_open(), "delivery leaves closing to the owner");

    assert!(handle.close());
    assert_eq!(stats.closed(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_handle_close_is_idempotent() -> Result<()> {
    let net = MockNetwork::new().silent("2002:20::1:3");
    let stats = Arc::clone(&net.stats);

    let (tx, rx) = oneshot::channel::<Result<Bytes>>();
    let handle = SocketHandle::open(&net, target("2002:20::1:3"), Bytes::from_static(REQUEST), move |r| {
        let _ = tx.send(r);
    });
    assert_eq!(handle.family(), AddressFamily::V6);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(handle.close());
    assert!(!handle.close());
    assert_eq!(handle.state(), HandleState::Closed);
    assert_eq!(stats.closed(), 1);

    // the aborted exchange drops its event handler without calling it
    assert!(rx.await.is_err());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_handle_reports_create_failure() -> Result<()> {
    let net = MockNetwork::new().fail_create(AddressFamily::V6);

    let (tx, rx) = oneshot::channel();
    let handle = SocketHandle::open(&net, target("::1"), Bytes::from_static(REQUEST), move |r| {
        let _ = tx.send(r);
    });

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err, Error::from(io::Error::from(io::ErrorKind::Unsupported)));
    assert!(handle.close());
    assert_eq!(net.stats.closed(), 0, "no socket was ever created");

    Ok(())
}

#[tokio::test]
async fn test_udp_socket_factory_families() -> Result<()> {
    let factory = UdpSocketFactory;
    let socket = factory.create(AddressFamily::V4)?;
    socket.close()?;
    socket.close()?;

    let mut buf = [0u8; 4];
    assert_eq!(socket.recv(&mut buf).await, Err(Error::ErrSocketClosed));

    Ok(())
}

#[test]
fn test_family_from_literal() {
    assert_eq!(AddressFamily::from_literal("1.2.3.4"), AddressFamily::V4);
    assert_eq!(AddressFamily::from_literal("2002:20:0:0:0:0:1:3"), AddressFamily::V6);
    assert_eq!(AddressFamily::V4.to_string(), "udp4");
    assert_eq!(AddressFamily::V6.to_string(), "udp6");
}
