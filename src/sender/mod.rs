
pub mod parallel;
pub mod sequential;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

pub use parallel::ParallelSendStrategy;
pub use sequential::SequentialSendStrategy;

pub use crate::completion::Callback;
use crate::completion::Completion;
use crate::error::*;
use crate::resolver::{DnsResolver, Resolver};
use crate::socket::handle::SocketHandle;
use crate::socket::{SocketFactory, UdpSocketFactory};

/// StrategyKind decides how the addresses of a hostname are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Every address at once, first reply wins.
    Parallel,
    /// One address after another, in resolver order.
    Sequential,
}

impl StrategyKind {
    pub fn from_multi_subnet_failover(multi_subnet_failover: bool) -> Self {
        if multi_subnet_failover {
            StrategyKind::Parallel
        } else {
            StrategyKind::Sequential
        }
    }
}

/// StrategyState is the lifecycle of a send strategy. `Succeeded`,
/// `Exhausted` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Idle,
    Sending,
    Succeeded,
    Exhausted,
    Cancelled,
}

impl StrategyState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StrategyState::Succeeded | StrategyState::Exhausted | StrategyState::Cancelled
        )
    }
}

/// SendStrategy is one of the two ways of sending a request to several
/// candidate addresses. Whichever is used, the callback given to `send`
/// fires at most once and never after `cancel`.
pub enum SendStrategy {
    Parallel(ParallelSendStrategy),
    Sequential(SequentialSendStrategy),
}

impl SendStrategy {
    pub fn new(
        kind: StrategyKind,
        addresses: Vec<IpAddr>,
        port: u16,
        request: Bytes,
        factory: Arc<dyn SocketFactory + Send + Sync>,
    ) -> Self {
        match kind {
            StrategyKind::Parallel => {
                SendStrategy::Parallel(ParallelSendStrategy::new(addresses, port, request, factory))
            }
            StrategyKind::Sequential => SendStrategy::Sequential(SequentialSendStrategy::new(
                addresses, port, request, factory,
            )),
        }
    }

    pub fn send(&self, callback: Callback) {
        match self {
            SendStrategy::Parallel(s) => s.send(callback),
            SendStrategy::Sequential(s) => s.send(callback),
        }
    }

    pub fn cancel(&self) {
        match self {
            SendStrategy::Parallel(s) => s.cancel(),
            SendStrategy::Sequential(s) => s.cancel(),
        }
    }

    pub fn state(&self) -> StrategyState {
        match self {
            SendStrategy::Parallel(s) => s.state(),
            SendStrategy::Sequential(s) => s.state(),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            SendStrategy::Parallel(_) => StrategyKind::Parallel,
            SendStrategy::Sequential(_) => StrategyKind::Sequential,
        }
    }
}

enum Active {
    None,
    Resolving(JoinHandle<()>),
    Socket(Arc<SocketHandle>),
    Strategy(SendStrategy),
}

struct SenderInternal {
    active: Mutex<Active>,
    completion: Completion,
}

/// Sender delivers one browser request to `host` and reports the first
/// usable reply.
///
/// An IP literal host is sent to directly. Any other host is resolved first
/// and its addresses are handed to the strategy picked by
/// `multi_subnet_failover`. A Sender is good for one `execute`; the lookup
/// loop creates a new one for every attempt.
pub struct Sender {
    host: String,
    port: u16,
    request: Bytes,
    kind: StrategyKind,
    resolver: Arc<dyn Resolver + Send + Sync>,
    factory: Arc<dyn SocketFactory + Send + Sync>,
    internal: Arc<SenderInternal>,
}

impl Sender {
    pub fn new(host: &str, port: u16, request: Bytes, multi_subnet_failover: bool) -> Self {
        Sender {
            host: host.to_owned(),
            port,
            request,
            kind: StrategyKind::from_multi_subnet_failover(multi_subnet_failover),
            resolver: Arc::new(DnsResolver),
            factory: Arc::new(UdpSocketFactory),
            internal: Arc::new(SenderInternal {
                active: Mutex::new(Active::None),
                completion: Completion::default(),
            }),
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

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Starts the request. `callback` fires exactly once with the reply or
    /// with the resolution or exhaustion error, unless `cancel` is called
    /// first. Must be called from within a tokio runtime.
    pub fn execute<F>(&self, callback: F)
    where
        F: FnOnce(Result<Bytes>) + Send + 'static,
    {
        if let Err(callback) = self.internal.completion.arm(Box::new(callback)) {
            log::warn!("sender for {} executed more than once", self.host);
            callback(Err(Error::ErrAlreadyExecuted));
            return;
        }

        match self.host.parse::<IpAddr>() {
            Ok(ip) => self.execute_for_ip(ip),
            Err(_) => self.execute_for_hostname(),
        }
    }

    fn execute_for_ip(&self, ip: IpAddr) {
        let target = SocketAddr::new(ip, self.port);
        let internal = Arc::clone(&self.internal);

        let mut active = self.internal.active.lock();
        let handle = SocketHandle::open(
            self.factory.as_ref(),
            target,
            self.request.clone(),
            move |result| internal.on_socket_event(result),
        );
        *active = Active::Socket(handle);
    }

    fn execute_for_hostname(&self) {
        let internal = Arc::clone(&self.internal);
        let resolver = Arc::clone(&self.resolver);
        let factory = Arc::clone(&self.factory);
        let host = self.host.clone();
        let (port, request, kind) = (self.port, self.request.clone(), self.kind);

        let mut active = self.internal.active.lock();
        let task = tokio::spawn(async move {
            let result = resolver.resolve(&host).await;
            internal.on_resolved(&host, result, kind, port, request, factory);
        });
        *active = Active::Resolving(task);
    }

    /// Stops the request. Open sockets are closed, a pending resolution is
    /// abandoned and the callback never fires. Calling it again, or before
    /// `execute`, does nothing.
    pub fn cancel(&self) {
        self.internal.completion.disarm();

        let active = std::mem::replace(&mut *self.internal.active.lock(), Active::None);
        match active {
            Active::None => {}
            Active::Resolving(task) => {
                log::trace!("cancelling resolution of {}", self.host);
                task.abort();
            }
            Active::Socket(handle) => {
                handle.close();
            }
            Active::Strategy(strategy) => strategy.cancel(),
        }
    }
}

impl SenderInternal {
    fn on_socket_event(&self, result: Result<Bytes>) {
        let handle = {
            let mut active = self.active.lock();
            match std::mem::replace(&mut *active, Active::None) {
                Active::Socket(handle) => handle,
                other => {
                    *active = other;
                    return;
                }
            }
        };

        handle.close();
        self.completion.fire(result);
    }

    fn on_resolved(
        self: &Arc<Self>,
        host: &str,
        result: Result<Vec<IpAddr>>,
        kind: StrategyKind,
        port: u16,
        request: Bytes,
        factory: Arc<dyn SocketFactory + Send + Sync>,
    ) {
        let mut active = self.active.lock();
        if !matches!(*active, Active::Resolving(_)) {
            return;
        }

        let result = result.and_then(|addresses| {
            if addresses.is_empty() {
                Err(Error::ErrNoAddresses)
            } else {
                Ok(addresses)
            }
        });
        let addresses = match result {
            Ok(addresses) => addresses,
            Err(err) => {
                log::debug!("failed to resolve {}: {}", host, err);
                *active = Active::None;
                drop(active);
                self.completion.fire(Err(err));
                return;
            }
        };

        log::debug!("{} resolved to {} addresses, sending {:?}", host, addresses.len(), kind);
        let strategy = SendStrategy::new(kind, addresses, port, request, factory);
        let owner = Arc::clone(self);
        strategy.send(Box::new(move |result| owner.on_strategy_done(result)));
        *active = Active::Strategy(strategy);
    }

    fn on_strategy_done(&self, result: Result<Bytes>) {
        let finished = std::mem::replace(&mut *self.active.lock(), Active::None);
        drop(finished);
        self.completion.fire(result);
    }
}
