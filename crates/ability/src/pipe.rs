//! Ordered point-to-point message channels between abilities.
//!
//! A pipe is created by [`pipe`] and shared by exactly two abilities: the
//! producer keeps the [`PipeWriter`], the consumer the [`PipeReader`].
//! Channels are unbounded and order-preserving; closing either end makes
//! the other observe end-of-stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::future::select_all;

use crate::AbilityError;

/// The opaque payload carried by pipes.
pub type Message = Bytes;

static NEXT_PIPE_ID: AtomicU64 = AtomicU64::new(1);

/// Creates a new pipe, returning its write and read ends.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let id = NEXT_PIPE_ID.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = async_channel::unbounded();
    (
        PipeWriter { id, tx },
        PipeReader {
            id,
            rx,
            peeked: None,
        },
    )
}

/// The sending end of a pipe.
#[derive(Debug, Clone)]
pub struct PipeWriter {
    id: u64,
    tx: async_channel::Sender<Message>,
}

impl PipeWriter {
    /// Queues a message; fails when the reading end is gone.
    pub fn send(&self, msg: Message) -> Result<(), Message> {
        self.tx.try_send(msg).map_err(|e| e.into_inner())
    }

    /// Closes the pipe; the reader drains queued messages then sees
    /// end-of-stream.
    pub fn close(&self) {
        self.tx.close();
    }

    /// True when the pipe has been closed from either side.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PartialEq for PipeWriter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// The receiving end of a pipe.
#[derive(Debug)]
pub struct PipeReader {
    id: u64,
    rx: async_channel::Receiver<Message>,
    // Filled by a poll that raced a message out of the channel.
    peeked: Option<Message>,
}

impl PipeReader {
    /// True when a message can be taken without blocking.
    fn ready(&self) -> bool {
        self.peeked.is_some() || !self.rx.is_empty()
    }

    /// True when the pipe is closed and nothing is left to read.
    fn drained(&self) -> bool {
        self.peeked.is_none() && self.rx.is_closed() && self.rx.is_empty()
    }

    pub(crate) fn try_take(&mut self) -> Option<Message> {
        self.peeked.take().or_else(|| self.rx.try_recv().ok())
    }

    /// Takes the next queued message without blocking, if any.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.try_take()
    }

    /// Closes the pipe from the reading side.
    pub fn close(&self) {
        self.rx.close();
    }
}

impl PartialEq for PipeReader {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// The inbound pipes of a running ability, multiplexed in readiness order.
#[derive(Debug)]
pub struct PipeSet {
    owner: String,
    readers: Vec<PipeReader>,
    cursor: usize,
}

impl PipeSet {
    /// Builds the set for the named owning ability.
    pub fn new(owner: &str, readers: Vec<PipeReader>) -> Self {
        Self {
            owner: owner.to_string(),
            readers,
            cursor: 0,
        }
    }

    /// Appends a reader, ignoring duplicates.
    pub fn push(&mut self, reader: PipeReader) {
        if !self.readers.contains(&reader) {
            self.readers.push(reader);
        }
    }

    /// True when no inbound pipe is attached.
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Number of attached pipes.
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Detaches every reader, leaving the set empty.
    pub fn take_all(&mut self) -> Vec<PipeReader> {
        self.cursor = 0;
        std::mem::take(&mut self.readers)
    }

    /// Closes every attached reader.
    pub fn close_all(&self) {
        for reader in &self.readers {
            reader.close();
        }
    }

    fn no_input(&self) -> AbilityError {
        AbilityError::NoInputPipe(self.owner.clone())
    }

    /// Waits up to `timeout` for any pipe to become readable. A closed pipe
    /// counts as readable (its end-of-stream is an observable event).
    pub async fn poll(&mut self, timeout: Duration) -> Result<bool, AbilityError> {
        if self.readers.is_empty() {
            return Err(self.no_input());
        }
        if self.readers.iter().any(|r| r.ready() || r.drained()) {
            return Ok(true);
        }
        let wakeup = {
            let recvs: Vec<_> = self
                .readers
                .iter()
                .map(|r| Box::pin(r.rx.recv()))
                .collect();
            match tokio::time::timeout(timeout, select_all(recvs)).await {
                Err(_elapsed) => None,
                Ok((outcome, idx, rest)) => {
                    drop(rest);
                    Some((outcome.ok(), idx))
                }
            }
        };
        match wakeup {
            None => Ok(false),
            Some((Some(msg), idx)) => {
                self.readers[idx].peeked = Some(msg);
                Ok(true)
            }
            // A pipe closed while we were waiting; its end-of-stream is
            // ready to be observed by the next recv.
            Some((None, _)) => Ok(true),
        }
    }

    /// Returns the next message across all inbound pipes, in the order the
    /// pipes become ready, round-robin over simultaneously ready ones.
    /// Closed pipes are silently dropped from the set; once none remain the
    /// call fails with `NoInputPipe`.
    pub async fn recv(&mut self) -> Result<Message, AbilityError> {
        loop {
            self.readers.retain(|r| !r.drained());
            let n = self.readers.len();
            if n == 0 {
                return Err(self.no_input());
            }
            for offset in 0..n {
                let idx = (self.cursor + offset) % n;
                if let Some(msg) = self.readers[idx].try_take() {
                    self.cursor = (idx + 1) % n;
                    return Ok(msg);
                }
            }
            let (received, idx) = {
                let recvs: Vec<_> = self
                    .readers
                    .iter()
                    .map(|r| Box::pin(r.rx.recv()))
                    .collect();
                let (outcome, idx, rest) = select_all(recvs).await;
                drop(rest);
                (outcome.ok(), idx)
            };
            match received {
                Some(msg) => self.readers[idx].peeked = Some(msg),
                None => {
                    self.readers.remove(idx);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipe_preserves_order() {
        let (w, mut r) = pipe();
        w.send(Message::from_static(b"1")).unwrap();
        w.send(Message::from_static(b"2")).unwrap();
        assert_eq!(r.try_take().unwrap(), Message::from_static(b"1"));
        assert_eq!(r.try_take().unwrap(), Message::from_static(b"2"));
    }

    #[tokio::test]
    async fn poll_times_out_on_idle_pipe() {
        let (_w, r) = pipe();
        let mut set = PipeSet::new("t", vec![r]);
        assert!(!set.poll(Duration::from_millis(10)).await.unwrap());
    }

    #[tokio::test]
    async fn poll_sees_queued_and_incoming_messages() {
        let (w, r) = pipe();
        let mut set = PipeSet::new("t", vec![r]);
        w.send(Message::from_static(b"x")).unwrap();
        assert!(set.poll(Duration::from_millis(10)).await.unwrap());
        assert_eq!(set.recv().await.unwrap(), Message::from_static(b"x"));

        let writer = w.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            writer.send(Message::from_static(b"y")).unwrap();
        });
        assert!(set.poll(Duration::from_secs(1)).await.unwrap());
        assert_eq!(set.recv().await.unwrap(), Message::from_static(b"y"));
    }

    #[tokio::test]
    async fn closed_pipes_are_dropped_then_error() {
        let (w1, r1) = pipe();
        let (w2, r2) = pipe();
        let mut set = PipeSet::new("t", vec![r1, r2]);
        w1.send(Message::from_static(b"a")).unwrap();
        w1.close();
        w2.close();
        assert_eq!(set.recv().await.unwrap(), Message::from_static(b"a"));
        assert_eq!(set.recv().await.unwrap_err(), AbilityError::NoInputPipe("t".into()));
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn poll_without_pipes_is_a_contract_violation() {
        let mut set = PipeSet::new("src", Vec::new());
        assert!(matches!(
            set.poll(Duration::from_millis(1)).await,
            Err(AbilityError::NoInputPipe(_))
        ));
    }

    #[tokio::test]
    async fn round_robin_over_ready_pipes() {
        let (w1, r1) = pipe();
        let (w2, r2) = pipe();
        let mut set = PipeSet::new("t", vec![r1, r2]);
        w1.send(Message::from_static(b"a1")).unwrap();
        w1.send(Message::from_static(b"a2")).unwrap();
        w2.send(Message::from_static(b"b1")).unwrap();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(set.recv().await.unwrap());
        }
        // Both pipes were ready: neither may be starved.
        assert!(seen.contains(&Message::from_static(b"b1")));
        assert_eq!(seen[0], Message::from_static(b"a1"));
    }

    #[tokio::test]
    async fn dedup_on_push() {
        let (_w, r) = pipe();
        let (_w2, r2) = pipe();
        let id = r.id;
        let mut set = PipeSet::new("t", vec![r]);
        set.push(PipeReader {
            id,
            rx: async_channel::unbounded().1,
            peeked: None,
        });
        set.push(r2);
        assert_eq!(set.len(), 2);
    }
}
