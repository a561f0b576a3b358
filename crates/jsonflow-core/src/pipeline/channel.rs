//! Thin wrappers around `tokio::sync::mpsc` that give pipeline stages a
//! blocking, synchronous read/write surface. Stages themselves run inside
//! `spawn_blocking` tasks (see `pipeline::pipe`), which is the documented
//! pattern for bridging synchronous code into an async runtime — it keeps
//! the cursor pool, value iterator, and JSONPath engine fully synchronous
//! and recursion-friendly while still satisfying the "each stage runs on
//! its own task" concurrency contract with real tokio channels.

use tokio::sync::mpsc::{Receiver, Sender, channel};

use crate::error::Error;
use crate::token::Token;

/// The write half of a stage-to-stage channel.
pub struct TokenWriter {
    tx: Sender<Token>,
}

impl TokenWriter {
    pub(crate) fn new(tx: Sender<Token>) -> Self {
        Self { tx }
    }

    /// Write one token downstream. A closed receiver surfaces as
    /// `Error::BrokenPipe`, which the pipeline driver treats as a clean
    /// early termination rather than a failure.
    pub fn write(&self, token: Token) -> Result<(), Error> {
        self.tx.blocking_send(token).map_err(|_| Error::BrokenPipe)
    }

    pub fn write_all(&self, tokens: impl IntoIterator<Item = Token>) -> Result<(), Error> {
        for token in tokens {
            self.write(token)?;
        }
        Ok(())
    }
}

/// The read half of a stage-to-stage channel.
pub struct TokenReader {
    rx: Receiver<Token>,
}

impl TokenReader {
    pub(crate) fn new(rx: Receiver<Token>) -> Self {
        Self { rx }
    }

    /// Read the next token, or `None` once upstream has closed and
    /// drained.
    pub fn read(&mut self) -> Option<Token> {
        self.rx.blocking_recv()
    }
}

/// Allocate a bounded token channel split into its writer/reader halves.
pub fn token_channel(capacity: usize) -> (TokenWriter, TokenReader) {
    let (tx, rx) = channel(capacity.max(1));
    (TokenWriter::new(tx), TokenReader::new(rx))
}

/// Turns a `TokenReader` into a pull closure suitable as a cursor pool
/// `Upstream`, so a JSONPath transform can sit a cursor pool directly on
/// top of an incoming pipeline channel.
pub fn reader_as_upstream(mut reader: TokenReader) -> crate::cursor::Upstream {
    Box::new(move || reader.read())
}
