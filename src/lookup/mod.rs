
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::config::LookupConfig;
use crate::error::*;
use crate::message::{parse_browser_response, response_text, BrowserRequest, RESPONSE_HEADER_LEN};
use crate::resolver::{DnsResolver, Resolver};
use crate::sender::Sender;
use crate::socket::{SocketFactory, UdpSocketFactory};

/// InstanceLookup asks the SQL Server Browser on `config.server` for the TCP
/// port of `config.instance_name`.
///
/// Every attempt uses a fresh [`Sender`] and is cancelled once
/// `config.timeout` elapses; up to `config.retries` further attempts follow.
/// A reply, or an error reported by the sender, ends the lookup without
/// another attempt. Dropping the future cancels the attempt in flight.
pub struct InstanceLookup {
    config: LookupConfig,
    resolver: Arc<dyn Resolver + Send + Sync>,
    factory: Arc<dyn SocketFactory + Send + Sync>,
}

impl InstanceLookup {
    pub fn new(config: LookupConfig) -> Self {
        InstanceLookup {
            config,
            resolver: Arc::new(DnsResolver),
            factory: Arc::new(UdpSocketFactory),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver + Send + Sync>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_socket_factory(mut self, factory: Arc<dyn SocketFactory + Send + Sync>) -> Self {
        self.factory = factory;
        self
    }

    pub async fn lookup(&self) -> Result<u16> {
        let config = &self.config;
        if config.server.is_empty() {
            return Err(Error::ErrInvalidArgument(
                "\"server\" must not be empty".to_owned(),
            ));
        }
        if config.instance_name.is_empty() {
            return Err(Error::ErrInvalidArgument(
                "\"instance_name\" must not be empty".to_owned(),
            ));
        }

        let request = BrowserRequest::UnicastEx.marshal()?;
        let attempts = config.retries.saturating_add(1);

        for attempt in 1..=attempts {
            let sender = Attempt(
                Sender::new(
                    &config.server,
                    config.port,
                    request.clone(),
                    config.multi_subnet_failover,
                )
                .with_resolver(Arc::clone(&self.resolver))
                .with_socket_factory(Arc::clone(&self.factory)),
            );

            let (result_tx, result_rx) = oneshot::channel();
            sender.0.execute(move |result| {
                let _ = result_tx.send(result);
            });

            match tokio::time::timeout(config.timeout, result_rx).await {
                Ok(Ok(Ok(reply))) => return self.port_from_reply(reply),
                Ok(Ok(Err(err))) => {
                    return Err(Error::ErrLookupFailed {
                        server: config.server.clone(),
                        source: Box::new(err),
                    })
                }
                Ok(Err(_)) => {
                    return Err(Error::Other(format!(
                        "browser request to {} ended without a result",
                        config.server
                    )))
                }
                Err(_) => {
                    sender.0.cancel();
                    log::debug!(
                        "no reply from SQL Server Browser on {} (attempt {}/{})",
                        config.server,
                        attempt,
                        attempts
                    );
                }
            }
        }

        Err(Error::ErrNoResponse(config.server.clone()))
    }

    fn port_from_reply(&self, reply: Bytes) -> Result<u16> {
        if reply.len() < RESPONSE_HEADER_LEN {
            return Err(Error::ErrEmptyResponse);
        }

        let text = response_text(&reply);
        log::trace!("browser reply from {}: {}", self.config.server, text);

        match parse_browser_response(&text, &self.config.instance_name) {
            Some(port) if port != 0 => Ok(port),
            _ => Err(Error::ErrInstanceNotFound {
                instance: self.config.instance_name.clone(),
                server: self.config.server.clone(),
            }),
        }
    }
}

/// Attempt cancels its sender when dropped, so an abandoned lookup future
/// releases its sockets.
struct Attempt(Sender);

impl Drop for Attempt {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Looks up the TCP port of a named instance with the system resolver and
/// OS sockets.
pub async fn instance_lookup(config: LookupConfig) -> Result<u16> {
    InstanceLookup::new(config).lookup().await
}
