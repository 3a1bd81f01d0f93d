//! Mailbox/Receive Engine
//!
//! A single FIFO per process. Selective receive scans it front to back and
//! removes only the first entry whose tag matches, so entries that are
//! skipped keep their relative order and one scan is linear in queue depth.
//!
//! Every entry carries a sequence number assigned at arrival. Reading the
//! next sequence number before a send gives a watermark; receiving "since"
//! that watermark only considers later arrivals, which is how
//! send-then-receive ignores replies that were already queued.

use crate::error::{Result, RuntimeError};
use crate::message::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use types::Tag;

#[derive(Debug)]
struct Envelope {
    seq: u64,
    message: Message,
}

#[derive(Debug, Default)]
struct Queue {
    entries: VecDeque<Envelope>,
    next_seq: u64,
}

/// Inbound queue owned by one process
#[derive(Debug, Default)]
pub struct Mailbox {
    queue: Mutex<Queue>,
    arrivals: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: Message) {
        {
            let mut queue = self.queue.lock();
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.entries.push_back(Envelope { seq, message });
        }
        self.arrivals.notify_one();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number the next arrival will get
    pub fn watermark(&self) -> u64 {
        self.queue.lock().next_seq
    }

    /// Remove the first queued message matching `filter`, without waiting
    pub fn try_receive(&self, filter: &[Tag]) -> Option<Message> {
        self.take_matching(filter, 0)
    }

    /// Wait for the first message matching `filter`.
    ///
    /// `None` waits forever; a zero timeout checks the queue exactly once.
    pub async fn receive(&self, filter: &[Tag], timeout: Option<Duration>) -> Result<Message> {
        self.receive_since(0, filter, timeout).await
    }

    /// Like [`Mailbox::receive`], ignoring entries that arrived before `watermark`
    pub async fn receive_since(
        &self,
        watermark: u64,
        filter: &[Tag],
        timeout: Option<Duration>,
    ) -> Result<Message> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(message) = self.take_matching(filter, watermark) {
                return Ok(message);
            }

            let arrival = self.arrivals.notified();
            match deadline {
                None => arrival.await,
                Some(deadline) => {
                    if Instant::now() >= deadline
                        || tokio::time::timeout_at(deadline, arrival).await.is_err()
                    {
                        // A message may have landed right at the deadline
                        return self.take_matching(filter, watermark).ok_or_else(|| {
                            RuntimeError::timeout("receive", timeout_ms(timeout))
                        });
                    }
                }
            }
        }
    }

    fn take_matching(&self, filter: &[Tag], watermark: u64) -> Option<Message> {
        let mut queue = self.queue.lock();
        let position = queue
            .entries
            .iter()
            .position(|entry| entry.seq >= watermark && entry.message.matches(filter))?;
        queue.entries.remove(position).map(|entry| entry.message)
    }

    /// Drop everything still queued; returns how many entries were discarded
    pub fn clear(&self) -> usize {
        let mut queue = self.queue.lock();
        let dropped = queue.entries.len();
        queue.entries.clear();
        dropped
    }
}

fn timeout_ms(timeout: Option<Duration>) -> u64 {
    timeout
        .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::DataMessage;
    use std::sync::Arc;

    fn data(tag: i64, payload: &[u8]) -> Message {
        Message::Data(DataMessage::from_bytes(Tag::new(tag), payload))
    }

    fn payload(message: Message) -> Vec<u8> {
        match message {
            Message::Data(data) => data.payload().to_vec(),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_selective_receive_keeps_order() {
        let mailbox = Mailbox::new();
        mailbox.push(data(1, b"a"));
        mailbox.push(data(5, b"b"));
        mailbox.push(data(2, b"c"));
        mailbox.push(data(5, b"d"));

        let five = [Tag::new(5)];
        assert_eq!(payload(mailbox.receive(&five, None).await.unwrap()), b"b");
        assert_eq!(payload(mailbox.receive(&five, None).await.unwrap()), b"d");
        assert_eq!(payload(mailbox.receive(&[], None).await.unwrap()), b"a");
        assert_eq!(payload(mailbox.receive(&[], None).await.unwrap()), b"c");
        assert!(mailbox.is_empty());
    }

    #[tokio::test]
    async fn test_zero_timeout_does_not_wait() {
        let mailbox = Mailbox::new();
        let err = mailbox
            .receive(&[], Some(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout { .. }));

        mailbox.push(data(1, b"x"));
        assert!(mailbox.receive(&[], Some(Duration::ZERO)).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_matching_entries_time_out() {
        let mailbox = Mailbox::new();
        mailbox.push(data(1, b"x"));
        let err = mailbox
            .receive(&[Tag::new(2)], Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout { timeout_ms: 20, .. }));
        assert_eq!(mailbox.len(), 1);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_arrival() {
        let mailbox = Arc::new(Mailbox::new());
        let sender = Arc::clone(&mailbox);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sender.push(data(7, b"late"));
        });
        let message = mailbox
            .receive(&[Tag::new(7)], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(payload(message), b"late");
    }

    #[tokio::test]
    async fn test_receive_since_skips_older_entries() {
        let mailbox = Mailbox::new();
        mailbox.push(data(3, b"stale"));
        let watermark = mailbox.watermark();
        mailbox.push(data(3, b"fresh"));

        let message = mailbox
            .receive_since(watermark, &[Tag::new(3)], Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(payload(message), b"fresh");
        assert_eq!(payload(mailbox.try_receive(&[]).unwrap()), b"stale");
    }
}
