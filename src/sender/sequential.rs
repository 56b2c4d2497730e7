use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::*;
use crate::completion::Completion;
use crate::socket::handle::SocketHandle;
use crate::socket::SocketFactory;

/// SequentialSendStrategy tries the candidate addresses in resolver order,
/// one socket at a time, moving on only when the current address fails.
pub struct SequentialSendStrategy {
    internal: Arc<SequentialInternal>,
}

struct SequentialInternal {
    addresses: Vec<IpAddr>,
    port: u16,
    request: Bytes,
    factory: Arc<dyn SocketFactory + Send + Sync>,
    state: Mutex<SequentialState>,
    completion: Completion,
}

struct SequentialState {
    status: StrategyState,
    next: usize,
    current: Option<(usize, Arc<SocketHandle>)>,
}

impl SequentialSendStrategy {
    pub fn new(
        addresses: Vec<IpAddr>,
        port: u16,
        request: Bytes,
        factory: Arc<dyn SocketFactory + Send + Sync>,
    ) -> Self {
        SequentialSendStrategy {
            internal: Arc::new(SequentialInternal {
                addresses,
                port,
                request,
                factory,
                state: Mutex::new(SequentialState {
                    status: StrategyState::Idle,
                    next: 0,
                    current: None,
                }),
                completion: Completion::default(),
            }),
        }
    }

    pub fn send(&self, callback: Callback) {
        let internal = &self.internal;
        let mut state = internal.state.lock();
        if state.status != StrategyState::Idle {
            log::warn!("sequential send ignored in state {:?}", state.status);
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
        internal.send_next(&mut state);
    }

    pub fn cancel(&self) {
        self.internal.completion.disarm();

        let current = {
            let mut state = self.internal.state.lock();
            if !state.status.is_terminal() {
                state.status = StrategyState::Cancelled;
            }
            state.current.take()
        };

        if let Some((_, handle)) = current {
            handle.close();
        }
    }

    pub fn state(&self) -> StrategyState {
        self.internal.state.lock().status
    }
}

impl SequentialInternal {
    fn send_next(self: &Arc<Self>, state: &mut SequentialState) {
        let id = state.next;
        let target = SocketAddr::new(self.addresses[id], self.port);
        state.next += 1;

        log::trace!("trying address {}/{}: {}", state.next, self.addresses.len(), target);
        let owner = Arc::clone(self);
        let handle = SocketHandle::open(
            self.factory.as_ref(),
            target,
            self.request.clone(),
            move |result| owner.on_event(id, result),
        );
        state.current = Some((id, handle));
    }

    fn on_event(self: &Arc<Self>, id: usize, result: Result<Bytes>) {
        let outcome = {
            let mut state = self.state.lock();
            if state.status != StrategyState::Sending {
                log::trace!("dropping event from socket {} in state {:?}", id, state.status);
                return;
            }
            let handle = match state.current.take() {
                Some((current, handle)) if current == id => handle,
                other => {
                    state.current = other;
                    return;
                }
            };
            handle.close();

            match result {
                Ok(payload) => {
                    state.status = StrategyState::Succeeded;
                    Ok(payload)
                }
                Err(err) => {
                    log::debug!("request to {} failed: {}", handle.target(), err);
                    if state.next < self.addresses.len() {
                        self.send_next(&mut state);
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
