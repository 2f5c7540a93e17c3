//! Bounded work queue between the embedding workers and the single writer.
//!
//! [`work_queue`] returns a cloneable [`QueueProducer`] and a non-cloneable
//! [`QueueConsumer`]; owning the consumer is what makes a thread the writer.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

/// Default number of embedded rows that may wait for the writer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// An embedded sentence on its way to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub sentence_id: i64,
    pub embedding: Vec<u8>,
}

/// The consumer side was dropped, so nothing will ever drain the queue.
#[derive(Debug, Error)]
#[error("work queue closed: the writer has stopped")]
pub struct QueueClosed;

/// Create a FIFO queue holding at most `capacity` items (minimum 1).
pub fn work_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = bounded(capacity.max(1));
    (QueueProducer { tx }, QueueConsumer { rx })
}

#[derive(Clone)]
pub struct QueueProducer {
    tx: Sender<WorkItem>,
}

impl QueueProducer {
    /// Enqueue an item, blocking while the queue is full.
    pub fn put(&self, item: WorkItem) -> Result<(), QueueClosed> {
        self.tx.send(item).map_err(|_| QueueClosed)
    }
}

pub struct QueueConsumer {
    rx: Receiver<WorkItem>,
}

impl QueueConsumer {
    /// Wait up to `timeout` for the next item. `None` means nothing arrived in
    /// time. Once every producer is gone and the queue is drained, this still
    /// waits out `timeout` so a polling caller does not spin.
    pub fn get(&self, timeout: Duration) -> Option<WorkItem> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn item(id: i64) -> WorkItem {
        WorkItem {
            sentence_id: id,
            embedding: vec![id as u8; 4],
        }
    }

    #[test]
    fn fifo_order() {
        let (producer, consumer) = work_queue(4);
        for id in 1..=3 {
            producer.put(item(id)).unwrap();
        }
        assert_eq!(consumer.len(), 3);
        let ids: Vec<i64> = (0..3)
            .map(|_| consumer.get(Duration::from_millis(10)).unwrap().sentence_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(consumer.is_empty());
    }

    #[test]
    fn get_times_out_on_empty_queue() {
        let (_producer, consumer) = work_queue(1);
        let started = Instant::now();
        assert!(consumer.get(Duration::from_millis(50)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn put_blocks_until_consumer_drains() {
        let (producer, consumer) = work_queue(1);
        producer.put(item(1)).unwrap();

        let worker = thread::spawn(move || producer.put(item(2)));
        thread::sleep(Duration::from_millis(200));
        assert!(!worker.is_finished(), "second put should block while the queue is full");

        assert_eq!(consumer.get(Duration::from_secs(1)).unwrap().sentence_id, 1);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(worker.is_finished(), "put should complete once the writer drains");
        worker.join().unwrap().unwrap();
        assert_eq!(consumer.get(Duration::from_secs(1)).unwrap().sentence_id, 2);
    }

    #[test]
    fn put_fails_once_consumer_is_gone() {
        let (producer, consumer) = work_queue(1);
        drop(consumer);
        assert!(producer.put(item(1)).is_err());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let (producer, consumer) = work_queue(0);
        producer.put(item(7)).unwrap();
        assert_eq!(consumer.get(Duration::from_millis(10)).unwrap().sentence_id, 7);
    }
}
