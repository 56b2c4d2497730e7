use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::*;
use crate::completion::Completion;
use crate::socket::handle::SocketHandle;
use crate::socket::SocketFactory;

/// ParallelSendStrategy sends the request to every candidate address at once.
///
/// The first reply wins and closes every other socket. Failures only count
/// towards exhaustion: the callback sees an error once all addresses have
/// failed, and that error is the one reported last.
pub struct ParallelSendStrategy {
    internal: Arc<ParallelInternal>,
}

struct ParallelInternal {
    addresses: Vec<IpAddr>,
    port: u16,
    request: Bytes,
    factory: Arc<dyn SocketFactory + Send + Sync>,
    state: Mutex<ParallelState>,
    completion: Completion,
}

struct ParallelState {
    status: StrategyState,
    sockets: HashMap<usize, Arc<SocketHandle>>,
    error_count: usize,
}

impl ParallelSendStrategy {
    pub fn new(
        addresses: Vec<IpAddr>,
        port: u16,
        request: Bytes,
        factory: Arc<dyn SocketFactory + Send + Sync>,
    ) -> Self {
        ParallelSendStrategy {
            internal: Arc::new(ParallelInternal {
                addresses,
                port,
                request,
                factory,
                state: Mutex::new(ParallelState {
                    status: StrategyState::Idle,
                    sockets: HashMap::new(),
                    error_count: 0,
                }),
                completion: Completion::default(),
            }),
        }
    }

    pub fn send(&self, callback: Callback) {
        let internal = &self.internal;
        let mut state = internal.state.lock();
        if state.status != StrategyState::Idle {
            log::warn!("parallel send ignored in state {:?}", state.status);
            return;
        }
        if internal.completion.arm(callback).is_err() {
            return;
        }

        if internal.addresses.is_empty() {
            state.status = StrategyState::Exhausted;
            let internal = Arc::clone(internal);
            tokio::spawn(async move {
                internal.completion.fire(Err(Error::ErrNoAddresses));
            });
            return;
        }

        state.status = StrategyState::Sending;
        for (id, ip) in internal.addresses.iter().enumerate() {
            let target = SocketAddr::new(*ip, internal.port);
            let owner = Arc::clone(internal);
            let handle = SocketHandle::open(
                internal.factory.as_ref(),
                target,
                internal.request.clone(),
                move |result| owner.on_event(id, result),
            );
            state.sockets.insert(id, handle);
        }
        log::trace!("racing {} addresses", internal.addresses.len());
    }

    pub fn cancel(&self) {
        self.internal.completion.disarm();

        let sockets: Vec<Arc<SocketHandle>> = {
            let mut state = self.internal.state.lock();
            if !state.status.is_terminal() {
                state.status = StrategyState::Cancelled;
            }
            state.sockets.drain().map(|(_, handle)| handle).collect()
        };

        for handle in sockets {
            handle.close();
        }
    }

    pub fn state(&self) -> StrategyState {
        self.internal.state.lock().status
    }
}

impl ParallelInternal {
    fn on_event(&self, id: usize, result: Result<Bytes>) {
        let outcome = {
            let mut state = self.state.lock();
            if state.status != StrategyState::Sending {
                log::trace!("dropping event from socket {} in state {:?}", id, state.status);
                return;
            }
            let handle = match state.sockets.remove(&id) {
                Some(handle) => handle,
                None => return,
            };
            handle.close();

            match result {
                Ok(payload) => {
                    for (_, other) in state.sockets.drain() {
                        other.close();
                    }
                    state.status = StrategyState::Succeeded;
                    Ok(payload)
                }
                Err(err) => {
                    state.error_count += 1;
                    log::debug!(
                        "{} request to {} failed ({}/{}): {}",
                        handle.family(),
                        handle.target(),
                        state.error_count,
                        self.addresses.len(),
                        err
                    );
                    if state.error_count < self.addresses.len() {
                        return;
                    }
                    state.status = StrategyState::Exhausted;
                    Err(err)
                }
            }
        };

        self.completion.fire(outcome);
    }
}
