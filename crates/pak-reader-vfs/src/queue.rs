//! The bounded-concurrency async load queue: priority-ordered
//! scheduling with in-flight request deduplication.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Semaphore};

use crate::error::Error;
use crate::priority::LoadPriority;

/// A request waiting for a permit, ordered by priority then by
/// arrival: among equal priorities the earliest-queued request wins,
/// so the queue is FIFO within a priority band.
struct QueueKey {
    priority: LoadPriority,
    seq: u64,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

type LoadResult = Result<Arc<Vec<u8>>, Error>;

/// Coordinates concurrent `get_async` callers: caps how many
/// extractions run at once, serves duplicate in-flight requests for
/// the same key from a single extraction, and lets higher-priority
/// requests cut ahead of queued lower-priority ones for the next free
/// permit.
pub struct LoadQueue {
    semaphore: Arc<Semaphore>,
    heap: Arc<Mutex<BinaryHeap<QueueKey>>>,
    next_seq: AtomicU64,
    in_flight: Arc<Mutex<HashMap<String, Vec<oneshot::Sender<LoadResult>>>>>,
}

impl LoadQueue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            heap: Arc::new(Mutex::new(BinaryHeap::new())),
            next_seq: AtomicU64::new(0),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register interest in `key` at `priority`. If a load for `key`
    /// is already in flight, returns `None`: the caller just joins the
    /// existing waiters. Otherwise returns a `oneshot::Receiver` the
    /// caller awaits for the result, plus a [`LoadTicket`] the caller
    /// (elected leader for this key) uses to actually run the load.
    pub fn register(
        &self,
        key: &str,
        priority: LoadPriority,
    ) -> (oneshot::Receiver<LoadResult>, Option<LoadTicket>) {
        let (tx, rx) = oneshot::channel();
        let mut in_flight = self.in_flight.lock();
        if let Some(waiters) = in_flight.get_mut(key) {
            waiters.push(tx);
            return (rx, None);
        }
        in_flight.insert(key.to_string(), vec![tx]);
        drop(in_flight);

        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().push(QueueKey { priority, seq });

        (
            rx,
            Some(LoadTicket {
                key: key.to_string(),
                seq,
                semaphore: self.semaphore.clone(),
                heap: self.heap.clone(),
                in_flight: self.in_flight.clone(),
            }),
        )
    }
}

/// Held by whichever caller registered first for a key; running it
/// acquires a scheduling-ordered permit, then broadcasts the result to
/// every waiter (itself included) that registered before completion.
///
/// Dropping a ticket without running it (the leader's future was
/// cancelled before it got a permit) removes the in-flight entry so a
/// later caller for the same key starts a fresh load rather than
/// waiting forever on a leader that will never run.
pub struct LoadTicket {
    key: String,
    seq: u64,
    semaphore: Arc<Semaphore>,
    heap: Arc<Mutex<BinaryHeap<QueueKey>>>,
    in_flight: Arc<Mutex<HashMap<String, Vec<oneshot::Sender<LoadResult>>>>>,
}

impl LoadTicket {
    /// Wait for a permit, honoring the queue's priority order: a
    /// permit that frees up is only taken by this ticket once its
    /// `seq` is at (or past) the front of the heap for its priority
    /// band. Then run `load` and fan its result out to every waiter.
    pub async fn run<F>(self, load: F)
    where
        F: std::future::Future<Output = LoadResult>,
    {
        let _permit = loop {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            if self.is_next() {
                break permit;
            }
            drop(permit);
            tokio::task::yield_now().await;
        };

        self.heap.lock().retain(|k| k.seq != self.seq);
        let result = load.await;

        if let Some(waiters) = self.in_flight.lock().remove(&self.key) {
            for tx in waiters {
                let _ = tx.send(clone_result(&result));
            }
        }
    }

    fn is_next(&self) -> bool {
        let heap = self.heap.lock();
        match heap.peek() {
            Some(top) => top.seq == self.seq,
            None => true,
        }
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        self.heap.lock().retain(|k| k.seq != self.seq);
        // If `run` already took the in-flight entry, this is a no-op;
        // otherwise the leader was cancelled before loading and every
        // waiter (registered or not yet registered) must not be left
        // waiting on a load that will never happen.
        if let Some(waiters) = self.in_flight.lock().remove(&self.key) {
            for tx in waiters {
                let _ = tx.send(Err(Error::Cancelled));
            }
        }
    }
}

fn clone_result(result: &LoadResult) -> LoadResult {
    match result {
        Ok(data) => Ok(data.clone()),
        Err(e) => Err(e.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_caller_gets_a_ticket_and_result() {
        let queue = LoadQueue::new(2);
        let (rx, ticket) = queue.register("a.txt", LoadPriority::Normal);
        let ticket = ticket.expect("first caller should be the leader");
        tokio::spawn(ticket.run(async { Ok(Arc::new(vec![1, 2, 3])) }));
        let result = rx.await.unwrap().unwrap();
        assert_eq!(*result, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn duplicate_registration_joins_without_a_ticket() {
        let queue = LoadQueue::new(2);
        let (rx1, ticket1) = queue.register("a.txt", LoadPriority::Normal);
        let (rx2, ticket2) = queue.register("a.txt", LoadPriority::Normal);
        assert!(ticket1.is_some());
        assert!(ticket2.is_none());

        tokio::spawn(ticket1.unwrap().run(async { Ok(Arc::new(vec![9])) }));
        assert_eq!(*rx1.await.unwrap().unwrap(), vec![9]);
        assert_eq!(*rx2.await.unwrap().unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn dropped_leader_ticket_cancels_waiters_and_frees_the_key() {
        let queue = LoadQueue::new(2);
        let (rx1, ticket1) = queue.register("a.txt", LoadPriority::Normal);
        let (rx2, ticket2) = queue.register("a.txt", LoadPriority::Normal);
        assert!(ticket2.is_none());

        drop(ticket1);
        assert!(matches!(rx1.await.unwrap(), Err(Error::Cancelled)));
        assert!(matches!(rx2.await.unwrap(), Err(Error::Cancelled)));

        // The key is free again: a new registration becomes leader.
        let (_rx3, ticket3) = queue.register("a.txt", LoadPriority::Normal);
        assert!(ticket3.is_some());
    }
}
