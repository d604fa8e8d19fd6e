use std::{
    collections::{HashMap, VecDeque},
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};

use futures_util::Stream;
use log::debug;
use parking_lot::Mutex;
use parlor_collab::{CollabEvent, SignalChannel};
use parlor_core::ConnectionId;

use crate::protocol::ServerFrame;

/// Manages the outgoing side of gateway connections.
///
/// Every connection has its own queue, so frames reach a client in the order they were sent.
pub struct Gateway {
    me: Weak<Self>,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

#[derive(Default)]
struct Outbox {
    pending: VecDeque<ServerFrame>,
    waker: Option<Waker>,
    closed: bool,
}

struct Connection {
    outbox: Arc<Mutex<Outbox>>,
}

/// The receiving end of a connection's queue
pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s outbox
    outbox: Arc<Mutex<Outbox>>,
    /// Required to remove connection when dropped
    manager: Weak<Gateway>,
}

impl Gateway {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    /// Registers a new connection
    pub fn connect(&self) -> ConnectionHandle {
        let id = ConnectionId::new();
        let outbox: Arc<Mutex<Outbox>> = Default::default();

        self.connections.lock().insert(
            id,
            Connection {
                outbox: outbox.clone(),
            },
        );

        ConnectionHandle {
            id,
            outbox,
            manager: self.me.clone(),
        }
    }

    /// Removes a connection, ending its handle once the queue is drained
    pub fn disconnect(&self, id: ConnectionId) {
        if let Some(connection) = self.connections.lock().remove(&id) {
            connection.close();
        }
    }

    /// Queues a frame for a connection. Frames for unknown connections are dropped.
    pub fn send(&self, id: ConnectionId, frame: ServerFrame) {
        match self.connections.lock().get(&id) {
            Some(connection) => connection.send(frame),
            None => debug!("Dropped frame for closed connection {}", id),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

impl SignalChannel for Gateway {
    fn deliver(&self, connection_id: ConnectionId, event: CollabEvent) {
        self.send(connection_id, event.into())
    }
}

impl Connection {
    fn send(&self, frame: ServerFrame) {
        let waker = {
            let mut outbox = self.outbox.lock();
            outbox.pending.push_back(frame);
            outbox.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake()
        }
    }

    fn close(&self) {
        let waker = {
            let mut outbox = self.outbox.lock();
            outbox.closed = true;
            outbox.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake()
        }
    }
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Takes every queued frame without waiting
    #[cfg(test)]
    pub fn drain(&self) -> Vec<ServerFrame> {
        self.outbox.lock().pending.drain(..).collect()
    }
}

impl Stream for ConnectionHandle {
    type Item = ServerFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut outbox = self.outbox.lock();

        if let Some(frame) = outbox.pending.pop_front() {
            return Poll::Ready(Some(frame));
        }

        if outbox.closed {
            return Poll::Ready(None);
        }

        outbox.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}
