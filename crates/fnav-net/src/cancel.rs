//! Cancellation tokens
//!
//! A token is a closed-on-cancel channel: waiters block on `recv` until
//! the sender side is closed. Clones share the same state.

use smol::channel::{self, Receiver, Sender};

/// Cancellation handle passed into a fetch
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = channel::bounded(1);
        Self { sender, receiver }
    }

    /// Cancel every holder of this token. Idempotent.
    pub fn cancel(&self) {
        self.sender.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolve once the token is cancelled
    pub async fn cancelled(&self) {
        // Nothing is ever sent, so `recv` only returns once the channel closes
        while self.receiver.recv().await.is_ok() {}
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
