use crossbeam::channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle for interrupting a waiting map call from another thread
///
/// Interrupting is sticky until [`Interrupter::reset`]: a call started on an
/// already interrupted handle fails straight away. The handle wakes every
/// waiter at once by disconnecting a channel that nobody ever sends on.
#[derive(Clone, Debug, Default)]
pub struct Interrupter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    flag: AtomicBool,
    signal: Mutex<Signal>,
}

#[derive(Debug)]
struct Signal {
    tx: Option<Sender<()>>,
    rx: Receiver<()>,
}

impl Signal {
    fn armed() -> Self {
        let (tx, rx) = bounded(0);
        Self { tx: Some(tx), rx }
    }
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            flag: AtomicBool::new(false),
            signal: Mutex::new(Signal::armed()),
        }
    }
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every waiter; in-flight bands stop at their next row
    pub fn interrupt(&self) {
        self.inner.flag.store(true, Ordering::Release);
        let mut signal = self.inner.signal.lock().unwrap_or_else(PoisonError::into_inner);
        if signal.tx.take().is_some() {
            tracing::debug!("interrupt requested");
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Clear the interrupt so the handle can be reused
    pub fn reset(&self) {
        let mut signal = self.inner.signal.lock().unwrap_or_else(PoisonError::into_inner);
        if signal.tx.is_none() {
            *signal = Signal::armed();
        }
        self.inner.flag.store(false, Ordering::Release);
    }

    /// Receiver that becomes ready (disconnected) once interrupted
    pub(crate) fn receiver(&self) -> Receiver<()> {
        self.inner
            .signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rx
            .clone()
    }
}
