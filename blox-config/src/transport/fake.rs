//! In-memory transport for exercising the protocol without a board.
//!
//! A [`FakeLink`] serves a canned reply script and records everything the
//! protocol does to it: each write with its timestamp, each read request,
//! and how many sessions were opened and closed. Clones share the same
//! recorder, so a test keeps one handle and passes another to the code
//! under test.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::time::Instant;

use super::{Link, Transport};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// One call to `write_bytes` as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub bytes: Vec<u8>,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct FakeState {
    reply: VecDeque<u8>,
    writes: Vec<RecordedWrite>,
    reads: Vec<usize>,
    opened: usize,
    closed: usize,
    refuse_open: bool,
    fail_writes: bool,
}

/// Link that opens [`FakeSession`]s on any endpoint.
#[derive(Debug, Clone, Default)]
pub struct FakeLink {
    state: Arc<Mutex<FakeState>>,
}

impl FakeLink {
    /// A link whose board never answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A link whose board answers with `reply`, served in order across
    /// reads: the status byte first, then any payload.
    pub fn replying(reply: impl Into<Vec<u8>>) -> Self {
        let reply: Vec<u8> = reply.into();
        let link = Self::default();
        link.state.lock().reply = reply.into();
        link
    }

    /// A link on which every `open` fails.
    pub fn unreachable() -> Self {
        let link = Self::default();
        link.state.lock().refuse_open = true;
        link
    }

    /// Make every subsequent write time out.
    pub fn failing_writes(self) -> Self {
        self.state.lock().fail_writes = true;
        self
    }

    pub fn description() -> &'static str {
        "Test"
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.lock().writes.clone()
    }

    /// The bytes of every write, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.iter().map(|w| w.bytes.clone()).collect()
    }

    /// Requested length of every read, in order.
    pub fn reads(&self) -> Vec<usize> {
        self.state.lock().reads.clone()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }
}

impl Link for FakeLink {
    type Session = FakeSession;

    fn open(&self, endpoint: &str) -> Result<FakeSession> {
        let mut state = self.state.lock();
        if state.refuse_open {
            return Err(Error::Connection {
                endpoint: endpoint.to_string(),
                reason: "fake link refuses connections".to_string(),
            });
        }
        state.opened += 1;
        trace!("Fake session opened on {endpoint}.");

        Ok(FakeSession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Session on a [`FakeLink`]. Counts as closed once dropped.
#[derive(Debug)]
pub struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Transport for FakeSession {
    async fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "UART write timeout").into());
        }
        state.writes.push(RecordedWrite {
            bytes: buf.to_vec(),
            at: Instant::now(),
        });
        Ok(())
    }

    async fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.reads.push(len);
        let available = len.min(state.reply.len());
        Ok(state.reply.drain(..available).collect())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.lock().closed += 1;
        trace!("Fake session closed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_reply_in_order() {
        let link = FakeLink::replying([1u8, 9, 8]);
        let mut session = link.open("fake").unwrap();

        assert_eq!(session.read_bytes(1).await.unwrap(), vec![1]);
        assert_eq!(session.read_bytes(4).await.unwrap(), vec![9, 8]);
        assert!(session.read_bytes(4).await.unwrap().is_empty());
        assert_eq!(link.reads(), vec![1, 4, 4]);
    }

    #[tokio::test]
    async fn zero_length_read_consumes_nothing() {
        let link = FakeLink::replying([1u8]);
        let mut session = link.open("fake").unwrap();

        assert!(session.read_bytes(0).await.unwrap().is_empty());
        assert_eq!(session.read_bytes(1).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn records_writes() {
        let link = FakeLink::new();
        let mut session = link.open("fake").unwrap();

        session.write_bytes(&[103, 0, 0, 0]).await.unwrap();
        session.write_bytes(&[104, 0, 0, 0]).await.unwrap();

        assert_eq!(link.written(), vec![vec![103, 0, 0, 0], vec![104, 0, 0, 0]]);
    }

    #[tokio::test]
    async fn failing_writes_are_not_recorded() {
        let link = FakeLink::new().failing_writes();
        let mut session = link.open("fake").unwrap();

        let err = session.write_bytes(&[1, 2, 3, 4]).await.unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::TimedOut));
        assert!(link.written().is_empty());
    }

    #[test]
    fn counts_open_and_close() {
        let link = FakeLink::new();
        {
            let _first = link.open("fake").unwrap();
            let _second = link.open("fake").unwrap();
            assert_eq!(link.opened(), 2);
            assert_eq!(link.closed(), 0);
        }
        assert_eq!(link.closed(), 2);
    }

    #[test]
    fn unreachable_refuses_open() {
        let link = FakeLink::unreachable();
        assert!(matches!(link.open("fake"), Err(Error::Connection { .. })));
        assert_eq!(link.opened(), 0);
    }
}
