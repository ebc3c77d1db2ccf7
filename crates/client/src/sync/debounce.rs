//! Trailing-edge debounce timer.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Boxed future returned by a flush callback.
pub type FlushFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type FlushFn = Arc<dyn Fn() -> FlushFuture + Send + Sync>;

/// Runs a flush callback once the caller stops scheduling for `delay`.
///
/// Every [`Debouncer::schedule`] restarts the timer. When the timer fires,
/// the flush runs on its own task, so cancelling or dropping the debouncer
/// stops pending timers but never a flush that is already in flight.
pub struct Debouncer {
    delay: Duration,
    flush: FlushFn,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

impl Debouncer {
    pub fn new<F>(delay: Duration, flush: F) -> Self
    where
        F: Fn() -> FlushFuture + Send + Sync + 'static,
    {
        Self {
            delay,
            flush: Arc::new(flush),
            pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Start or restart the timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self) {
        let delay = self.delay;
        let flush = Arc::clone(&self.flush);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(flush());
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(timer);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the timer without flushing. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(timer) if !timer.is_finished() => {
                timer.abort();
                true
            }
            _ => false,
        }
    }

    /// Whether a timer is armed and has not fired yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(timer) = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(delay: Duration) -> (Debouncer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&count);
        let debouncer = Debouncer::new(delay, move || -> FlushFuture {
            let hits = Arc::clone(&hits);
            Box::pin(async move {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        });
        (debouncer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_flushes_once() {
        let (debouncer, count) = counting(Duration::from_millis(1000));

        for _ in 0..5 {
            debouncer.schedule();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_flush() {
        let (debouncer, count) = counting(Duration::from_millis(500));

        debouncer.schedule();
        assert!(debouncer.is_pending());
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_timer() {
        let (debouncer, count) = counting(Duration::from_millis(500));

        debouncer.schedule();
        drop(debouncer);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
