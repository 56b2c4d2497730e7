use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandleState {
    Open,
    Closed,
}

/// SocketHandle owns one socket and the single exchange running on it.
///
/// The exchange sends the request, waits for one datagram and reports the
/// outcome to `on_event` exactly once, unless the handle is closed first.
/// A handle goes from open to closed exactly once; later closes are no-ops.
pub(crate) struct SocketHandle {
    family: AddressFamily,
    target: SocketAddr,
    socket: Option<Arc<dyn DatagramSocket + Send + Sync>>,
    state: Mutex<HandleState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketHandle {
    /// Creates a socket matching the family of `target` and starts the
    /// exchange in the background. A socket that cannot be created is
    /// reported through `on_event` like any other transport failure.
    pub(crate) fn open<F>(
        factory: &(dyn SocketFactory + Send + Sync),
        target: SocketAddr,
        request: Bytes,
        on_event: F,
    ) -> Arc<SocketHandle>
    where
        F: FnOnce(Result<Bytes>) + Send + 'static,
    {
        let family = AddressFamily::of(&target.ip());
        let created = factory.create(family);

        let handle = Arc::new(SocketHandle {
            family,
            target,
            socket: created.as_ref().ok().map(Arc::clone),
            state: Mutex::new(HandleState::Open),
            task: Mutex::new(None),
        });

        let weak = Arc::downgrade(&handle);
        let task = tokio::spawn(async move {
            let result = match created {
                Ok(socket) => exchange(socket, &request, target).await,
                Err(err) => Err(err),
            };

            // detach before delivering so that closing from inside on_event
            // never aborts the task that is running it
            SocketHandle::detach(&weak);
            on_event(result);
        });

        let mut slot = handle.task.lock();
        if !task.is_finished() {
            *slot = Some(task);
        }
        drop(slot);

        handle
    }

    fn detach(weak: &Weak<SocketHandle>) {
        if let Some(handle) = weak.upgrade() {
            handle.task.lock().take();
        }
    }

    /// Closes the socket and stops a pending exchange. Returns true only for
    /// the call that actually closed the handle.
    pub(crate) fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == HandleState::Closed {
                return false;
            }
            *state = HandleState::Closed;
        }

        if let Some(task) = self.task.lock().take() {
            task.abort();
        }

        if let Some(socket) = &self.socket {
            if let Err(err) = socket.close() {
                log::warn!("failed to close {} socket for {}: {}", self.family, self.target, err);
            }
        }

        true
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> HandleState {
        *self.state.lock()
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.state() == HandleState::Open
    }

    pub(crate) fn family(&self) -> AddressFamily {
        self.family
    }

    pub(crate) fn target(&self) -> SocketAddr {
        self.target
    }
}

async fn exchange(
    socket: Arc<dyn DatagramSocket + Send + Sync>,
    request: &[u8],
    target: SocketAddr,
) -> Result<Bytes> {
    log::trace!("sending {} bytes to {}", request.len(), target);
    socket.send_to(request, target).await?;

    let mut buf = vec![0u8; INBOUND_BUFFER_SIZE];
    let n = socket.recv(&mut buf).await?;
    buf.truncate(n);
    log::trace!("received {} bytes from {}", n, target);

    Ok(Bytes::from(buf))
}
