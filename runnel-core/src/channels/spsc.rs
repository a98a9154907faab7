//! Single-producer single-consumer channels on top of flume, with the ability to look at the
//! next message without taking it out of the channel.
use std::cell::RefCell;

/// SPSC Sender, does not implement clone
#[derive(Debug)]
pub(crate) struct Sender<T>(flume::Sender<T>);

/// SPSC Receiver, does not implement clone
#[derive(Debug)]
pub(crate) struct Receiver<T> {
    rx: flume::Receiver<T>,
    // a message we already took out of the channel to look at it
    peeked: RefCell<Option<T>>,
}

pub(crate) fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = flume::unbounded();
    (
        Sender(tx),
        Receiver {
            rx,
            peeked: RefCell::new(None),
        },
    )
}

impl<T> Sender<T> {
    /// Send a value into the channel. If the receiving end is gone the value is discarded.
    pub(crate) fn send(&self, msg: T) {
        let _ = self.0.send(msg);
    }
}

impl<T> Receiver<T> {
    /// Try to receive a value. If no value is available,
    /// return None
    pub(crate) fn recv(&self) -> Option<T> {
        self.peeked
            .borrow_mut()
            .take()
            .or_else(|| self.rx.try_recv().ok())
    }

    /// Apply a function to the next message without removing it from the channel.
    /// Returns None if the channel is empty.
    pub(crate) fn peek_apply<R>(&self, func: impl FnOnce(&T) -> R) -> Option<R> {
        let mut peeked = self.peeked.borrow_mut();
        if peeked.is_none() {
            *peeked = self.rx.try_recv().ok();
        }
        peeked.as_ref().map(func)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.peeked.borrow().is_none() && self.rx.is_empty()
    }
}
