use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::*;

/// What a mock socket does once a request reaches a given address.
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Reply(Duration, Bytes),
    Fail(Duration, io::ErrorKind),
    Silent,
}

/// Counters shared by every socket a [`MockNetwork`] creates.
#[derive(Debug, Default)]
pub(crate) struct MockStats {
    pub(crate) created: Mutex<Vec<AddressFamily>>,
    pub(crate) sent: Mutex<Vec<SocketAddr>>,
    pub(crate) payloads: Mutex<Vec<Vec<u8>>>,
    pub(crate) closed: AtomicUsize,
}

impl MockStats {
    pub(crate) fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub(crate) fn families(&self) -> Vec<AddressFamily> {
        self.created.lock().clone()
    }

    pub(crate) fn sent(&self) -> Vec<SocketAddr> {
        self.sent.lock().clone()
    }

    pub(crate) fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().clone()
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// MockNetwork is a scripted [`SocketFactory`]: replies and failures are
/// keyed by target address, with an optional delay before each one.
/// Addresses without a script never answer.
#[derive(Default)]
pub(crate) struct MockNetwork {
    behaviors: HashMap<IpAddr, Behavior>,
    fail_create: Option<AddressFamily>,
    pub(crate) stats: Arc<MockStats>,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        MockNetwork::default()
    }

    pub(crate) fn reply(mut self, ip: &str, delay_ms: u64, payload: &'static [u8]) -> Self {
        self.behaviors.insert(
            parse(ip),
            Behavior::Reply(Duration::from_millis(delay_ms), Bytes::from_static(payload)),
        );
        self
    }

    pub(crate) fn fail(mut self, ip: &str, delay_ms: u64, kind: io::ErrorKind) -> Self {
        self.behaviors
            .insert(parse(ip), Behavior::Fail(Duration::from_millis(delay_ms), kind));
        self
    }

    pub(crate) fn silent(mut self, ip: &str) -> Self {
        self.behaviors.insert(parse(ip), Behavior::Silent);
        self
    }

    pub(crate) fn fail_create(mut self, family: AddressFamily) -> Self {
        self.fail_create = Some(family);
        self
    }
}

fn parse(ip: &str) -> IpAddr {
    ip.parse().unwrap()
}

impl SocketFactory for MockNetwork {
    fn create(&self, family: AddressFamily) -> Result<Arc<dyn DatagramSocket + Send + Sync>> {
        if self.fail_create == Some(family) {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "family unavailable").into());
        }

        self.stats.created.lock().push(family);
        Ok(Arc::new(MockSocket {
            family,
            behaviors: self.behaviors.clone(),
            target: Mutex::new(None),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct MockSocket {
    family: AddressFamily,
    behaviors: HashMap<IpAddr, Behavior>,
    target: Mutex<Option<SocketAddr>>,
    stats: Arc<MockStats>,
}

#[async_trait]
impl DatagramSocket for MockSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        assert_eq!(
            AddressFamily::of(&target.ip()),
            self.family,
            "socket family must match its target"
        );
        self.stats.sent.lock().push(target);
        self.stats.payloads.lock().push(buf.to_vec());
        *self.target.lock() = Some(target);
        Ok(buf.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let target = (*self.target.lock()).ok_or(Error::ErrSocketClosed)?;
        let behavior = self
            .behaviors
            .get(&target.ip())
            .cloned()
            .unwrap_or(Behavior::Silent);

        match behavior {
            Behavior::Reply(delay, payload) => {
                tokio::time::sleep(delay).await;
                buf[..payload.len()].copy_from_slice(&payload);
                Ok(payload.len())
            }
            Behavior::Fail(delay, kind) => {
                tokio::time::sleep(delay).await;
                Err(io::Error::new(kind, format!("mock failure from {target}")).into())
            }
            Behavior::Silent => std::future::pending().await,
        }
    }

    fn close(&self) -> Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
