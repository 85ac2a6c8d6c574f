//! Bounded cross-domain channel.
//!
//! A [`BoundedChannel`] is shared between the blocking worker thread and the
//! async gateway tasks. Producers never wait: a full channel rejects the item.
//! Consumers can poll, block a thread with a timeout, or await with a timeout.
//!
//! The buffer is a `VecDeque` behind a `std::sync::Mutex` (held only for the
//! push/pop itself). Blocking consumers park on a `Condvar`; async consumers
//! park on a `tokio::sync::Notify`. Every put wakes both kinds.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::ChannelError;

/// A fixed-capacity FIFO queue usable from both threads and tasks.
pub struct BoundedChannel<T> {
    capacity: usize,
    buffer: Mutex<VecDeque<T>>,
    available: Condvar,
    notify: Notify,
}

impl<T> BoundedChannel<T> {
    /// Create a channel holding at most `capacity` items.
    ///
    /// A zero capacity is bumped to one so that the channel can carry anything.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue without blocking. Fails with `Full` at capacity; the item is dropped.
    pub fn put(&self, item: T) -> Result<(), ChannelError> {
        {
            let mut buffer = self.lock();
            if buffer.len() >= self.capacity {
                return Err(ChannelError::Full);
            }
            buffer.push_back(item);
        }
        self.available.notify_one();
        self.notify.notify_waiters();
        Ok(())
    }

    /// Dequeue without blocking. Fails with `Empty` when nothing is queued.
    pub fn get_nowait(&self) -> Result<T, ChannelError> {
        self.lock().pop_front().ok_or(ChannelError::Empty)
    }

    /// Block the calling thread for at most `timeout` waiting for one item.
    ///
    /// Must not be called from inside an async task; use [`Self::recv`] there.
    /// A timeout too large to represent as a deadline waits indefinitely.
    pub fn get(&self, timeout: Duration) -> Result<T, ChannelError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut buffer = self.lock();
        loop {
            if let Some(item) = buffer.pop_front() {
                return Ok(item);
            }
            let Some(deadline) = deadline else {
                buffer = self.available.wait(buffer).unwrap_or_else(|e| e.into_inner());
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return Err(ChannelError::Timeout);
            }
            buffer = match self.available.wait_timeout(buffer, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Await at most `timeout` for one item.
    pub async fn recv(&self, timeout: Duration) -> Result<T, ChannelError> {
        let wait = async {
            loop {
                // Register interest before checking, so a put between the
                // check and the await still wakes us.
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Ok(item) = self.get_nowait() {
                    return item;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ChannelError::Timeout)
    }

    /// Remove and return everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedChannel")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn overflow_keeps_first_items_in_order() {
        let channel = BoundedChannel::new(3);
        let results: Vec<_> = (0..7).map(|i| channel.put(i)).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
        assert_eq!(
            results
                .iter()
                .filter(|r| **r == Err(ChannelError::Full))
                .count(),
            4
        );
        assert_eq!(channel.drain(), vec![0, 1, 2]);
    }

    #[test]
    fn get_nowait_on_empty_channel() {
        let channel: BoundedChannel<u8> = BoundedChannel::new(1);
        assert_eq!(channel.get_nowait(), Err(ChannelError::Empty));
    }

    #[test]
    fn space_frees_up_after_get() {
        let channel = BoundedChannel::new(1);
        channel.put("a").unwrap();
        assert_eq!(channel.put("b"), Err(ChannelError::Full));
        assert_eq!(channel.get_nowait(), Ok("a"));
        channel.put("c").unwrap();
        assert_eq!(channel.get_nowait(), Ok("c"));
    }

    #[test]
    fn blocking_get_times_out() {
        let channel: BoundedChannel<u8> = BoundedChannel::new(1);
        let start = Instant::now();
        assert_eq!(
            channel.get(Duration::from_millis(50)),
            Err(ChannelError::Timeout)
        );
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn blocking_get_wakes_on_put_from_other_thread() {
        let channel = Arc::new(BoundedChannel::new(4));
        let producer = channel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.put(42).unwrap();
        });
        assert_eq!(channel.get(Duration::from_secs(5)), Ok(42));
        handle.join().unwrap();
    }

    #[test]
    fn blocking_get_with_unbounded_timeout() {
        let channel = Arc::new(BoundedChannel::new(4));
        let producer = channel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.put(7).unwrap();
        });
        assert_eq!(channel.get(Duration::from_secs(u64::MAX)), Ok(7));
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn async_recv_times_out() {
        let channel: BoundedChannel<u8> = BoundedChannel::new(1);
        assert_eq!(
            channel.recv(Duration::from_millis(20)).await,
            Err(ChannelError::Timeout)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_recv_wakes_on_put_from_thread() {
        let channel = Arc::new(BoundedChannel::new(4));
        let producer = channel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.put("hello").unwrap();
        });
        assert_eq!(channel.recv(Duration::from_secs(5)).await, Ok("hello"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn competing_consumers_never_duplicate() {
        let channel = Arc::new(BoundedChannel::new(100));
        let mut consumers = Vec::new();
        for _ in 0..4 {
            let c = channel.clone();
            consumers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Ok(item) = c.recv(Duration::from_millis(200)).await {
                    got.push(item);
                }
                got
            }));
        }
        for i in 0..100 {
            channel.put(i).unwrap();
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let channel = BoundedChannel::new(0);
        assert_eq!(channel.capacity(), 1);
        channel.put(()).unwrap();
        assert_eq!(channel.put(()), Err(ChannelError::Full));
    }
}
