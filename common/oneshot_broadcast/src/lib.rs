//! Provides a single-sender, multiple-receiver one-shot channel where any message sent will be
//! received by all senders.
//!
//! This implementation may not be blazingly fast but it should be simple enough to be safe.

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    SenderDropped,
}

enum Future<T: Clone> {
    /// The future is ready and the item may be consumed.
    Ready(T),
    /// Future is not ready. The contained `Weak` is a reference to the `Sender` that may be used to
    /// detect when the channel is disconnected.
    NotReady(Weak<()>),
}

struct MutexCondvar<T: Clone> {
    mutex: Mutex<Future<T>>,
    condvar: Condvar,
}

/// The sending pair of the `oneshot` channel.
pub struct Sender<T: Clone>(Arc<MutexCondvar<T>>, Option<Arc<()>>);

impl<T: Clone> Sender<T> {
    /// Send a message, consuming `self` and delivering the message to *all* receivers.
    pub fn send(self, item: T) {
        *self.0.mutex.lock() = Future::Ready(item);
        // The condvar will be notified when `self` is dropped.
    }
}

impl<T: Clone> Drop for Sender<T> {
    fn drop(&mut self) {
        // Drop the `Arc` so that any `Weak` upgrades fail and receivers know the
        // sender is gone.
        self.1 = None;
        self.0.condvar.notify_all();
    }
}

/// The receiving pair of the `oneshot` channel. All clones of this receiver will receive the
/// message sent by the `Sender`.
#[derive(Clone)]
pub struct Receiver<T: Clone>(Arc<MutexCondvar<T>>);

impl<T: Clone> Receiver<T> {
    /// Check to see if there is a message to be received *without* blocking the current thread.
    ///
    /// Returns `Ok(Some)` if a message has been sent, `Ok(None)` if no message has been sent yet
    /// and `Err` if the sender has been dropped without sending a message.
    pub fn try_recv(&self) -> Result<Option<T>, Error> {
        match &*self.0.mutex.lock() {
            Future::Ready(item) => Ok(Some(item.clone())),
            Future::NotReady(weak) if weak.upgrade().is_some() => Ok(None),
            Future::NotReady(_) => Err(Error::SenderDropped),
        }
    }

    /// Block the current thread until a message is received or the sender is dropped.
    pub fn recv(&self) -> Result<T, Error> {
        let mut lock = self.0.mutex.lock();
        loop {
            match &*lock {
                Future::Ready(item) => return Ok(item.clone()),
                Future::NotReady(weak) if weak.upgrade().is_some() => {
                    self.0.condvar.wait(&mut lock)
                }
                Future::NotReady(_) => return Err(Error::SenderDropped),
            }
        }
    }
}

/// Create a oneshot channel where all receivers will receive the message sent by the `Sender`.
pub fn oneshot<T: Clone>() -> (Sender<T>, Receiver<T>) {
    let sender_ref = Arc::new(());
    let mutex_condvar = Arc::new(MutexCondvar {
        mutex: Mutex::new(Future::NotReady(Arc::downgrade(&sender_ref))),
        condvar: Condvar::new(),
    });
    let receiver = Receiver(mutex_condvar.clone());
    let sender = Sender(mutex_condvar, Some(sender_ref));
    (sender, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn single_receiver() {
        let (sender, receiver) = oneshot();
        assert_eq!(receiver.try_recv(), Ok(None));
        sender.send(42);
        assert_eq!(receiver.try_recv(), Ok(Some(42)));
        assert_eq!(receiver.recv(), Ok(42));
    }

    #[test]
    fn multiple_receivers() {
        let (sender, receiver_a) = oneshot();
        let receiver_b = receiver_a.clone();
        sender.send(42);
        assert_eq!(receiver_a.recv(), Ok(42));
        assert_eq!(receiver_b.recv(), Ok(42));
    }

    #[test]
    fn sender_dropped() {
        let (sender, receiver) = oneshot::<u64>();
        drop(sender);
        assert_eq!(receiver.try_recv(), Err(Error::SenderDropped));
        assert_eq!(receiver.recv(), Err(Error::SenderDropped));
    }

    #[test]
    fn blocking_recv_from_thread() {
        let (sender, receiver) = oneshot();
        let handle = thread::spawn(move || receiver.recv());
        thread::sleep(Duration::from_millis(10));
        sender.send(1u64);
        assert_eq!(handle.join().unwrap(), Ok(1));
    }
}
