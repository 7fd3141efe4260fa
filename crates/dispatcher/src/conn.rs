//! PipelinedConn - keeps sends and reply reads in lockstep

use contracts::{Command, CommandBuffer, ContractError, StoreConnection};
use tracing::{debug, trace, warn};

/// Single-writer command buffer over one store connection
///
/// Invariant: `pending` equals the number of sends the transport accepted
/// since the last completed `flush`. A flush reads exactly that many replies,
/// even after an error, so the connection is never released with unread
/// replies.
#[derive(Debug)]
pub struct PipelinedConn<C> {
    conn: C,
    pending: usize,
}

impl<C: StoreConnection> PipelinedConn<C> {
    /// Wrap a raw connection
    pub fn new(conn: C) -> Self {
        Self { conn, pending: 0 }
    }

    /// Buffer one command on the transport
    ///
    /// A rejected command is not counted; it will produce no reply.
    pub fn send(&mut self, command: Command) -> Result<(), ContractError> {
        self.conn.send(&command)?;
        self.pending += 1;
        trace!(command = %command, pending = self.pending, "command buffered");
        Ok(())
    }

    /// Drop every command buffered after `mark` (an earlier `pending()` value)
    pub fn discard_since(&mut self, mark: usize) {
        if mark >= self.pending {
            return;
        }
        let count = self.pending - mark;
        self.conn.discard(count);
        self.pending = mark;
        debug!(discarded = count, pending = self.pending, "rolled back unflushed commands");
    }

    /// Flush the transport and drain one reply per buffered command
    ///
    /// Returns the number of replies read. On failure the first error is
    /// returned after every expected reply has been read.
    pub async fn flush(&mut self) -> Result<usize, ContractError> {
        let expected = self.pending;
        let mut first_err = self.conn.flush().await.err();

        for _ in 0..expected {
            if let Err(e) = self.conn.receive().await {
                if first_err.is_none() {
                    first_err = Some(e);
                } else {
                    warn!(error = %e, "additional reply error while draining");
                }
            }
        }

        self.pending = 0;

        match first_err {
            Some(e) => Err(e),
            None => Ok(expected),
        }
    }

    /// Commands sent since the last flush
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Underlying connection
    pub fn get_ref(&self) -> &C {
        &self.conn
    }

    /// Unwrap the underlying connection
    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<C: StoreConnection> CommandBuffer for PipelinedConn<C> {
    fn send(&mut self, command: Command) -> Result<(), ContractError> {
        PipelinedConn::send(self, command)
    }
}
