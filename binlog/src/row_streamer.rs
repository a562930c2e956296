//! The public entry point: dials a primary, issues `COM_BINLOG_DUMP`, and
//! drives the assembler to completion. The reader runs as a
//! `std::thread::spawn` producer feeding a `std::sync::mpsc::sync_channel`
//! bounded queue, since the transport (`connection::PacketChannel`) is
//! synchronous and a background thread plus a bounded handoff queue keeps
//! a blocked socket read from stalling the consuming side.

use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::error::{Error, ProtocolError, Result};
use connection::Connection;

use crate::assembler::Assembler;
use crate::cancel::CancellationToken;
use crate::event::frame::{parse_dump_packet, DumpPacket};
use crate::position::BinlogPosition;
use crate::row::Transaction;
use crate::schema::TableInfoMapper;

/// Bound on the reader-thread-to-assembler queue. Small on purpose: the
/// sink runs synchronously on the assembler thread, so a deep queue would
/// just let the reader race arbitrarily far ahead of processing.
const QUEUE_CAPACITY: usize = 64;

/// Read-deadline used by the assembler's wait on the reader queue so it can
/// notice cancellation promptly even with no packets in flight. Unrelated to
/// the transport's own per-packet socket read timeout (`ConnectionOptions`).
const POLL_INTERVAL: Duration = Duration::from_millis(200);

enum ReaderMessage {
    Packet(Vec<u8>),
    Failed(Error),
}

/// Connects as a replica, decodes the row-based binlog stream starting from
/// a given position, and calls `sink` once per committed transaction.
pub struct RowStreamer<M: TableInfoMapper> {
    dsn: String,
    server_id: u32,
    mapper: Arc<M>,
    start_position: BinlogPosition,
}

impl<M: TableInfoMapper> RowStreamer<M> {
    /// Validates `dsn` eagerly so misconfiguration fails at construction
    /// rather than on the first `stream` call.
    pub fn new(dsn: &str, server_id: u32, mapper: M) -> Result<Self> {
        connection::Dsn::parse(dsn)?;
        Ok(Self {
            dsn: dsn.to_string(),
            server_id,
            mapper: Arc::new(mapper),
            start_position: BinlogPosition::default(),
        })
    }

    pub fn set_start_position(&mut self, position: BinlogPosition) {
        self.start_position = position;
    }

    pub fn start_position(&self) -> &BinlogPosition {
        &self.start_position
    }

    /// Streams until cancelled, the connection drops, or `sink` returns an
    /// error — at which point this always returns `Err` (stream EOF,
    /// cancellation, or the sink's own error). `start_position()` reflects
    /// the last committed position afterward, so a caller can resume a new
    /// `stream` call from there.
    pub fn stream<F>(&mut self, cancel: &CancellationToken, mut sink: F) -> Result<()>
    where
        F: FnMut(&Transaction) -> Result<()>,
    {
        let mut conn = Connection::from_dsn(&self.dsn)?;
        conn.try_connect()?;
        // Matches the master's own checksum setting before the dump starts.
        conn.exec("SET @master_binlog_checksum=@@global.binlog_checksum")?;
        conn.dump_binlog(
            self.server_id,
            self.start_position.filename.clone(),
            self.start_position.offset,
        )?;
        let shutdown_handle = conn.shutdown_handle()?;

        let (tx, rx) = sync_channel::<ReaderMessage>(QUEUE_CAPACITY);
        let reader_cancel = cancel.clone();
        let reader = thread::spawn(move || {
            loop {
                if reader_cancel.is_cancelled() {
                    return;
                }
                match conn.read_packet() {
                    Ok(packet) => {
                        if tx.send(ReaderMessage::Packet(packet)).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(ReaderMessage::Failed(err));
                        return;
                    }
                }
            }
        });

        let mut assembler = Assembler::new(Arc::clone(&self.mapper), self.start_position.clone());
        let outcome = drain(cancel, &rx, &mut assembler, &mut sink);

        shutdown_handle.shutdown();
        cancel.cancel();
        let _ = reader.join();

        self.start_position = assembler.position().clone();
        outcome
    }

    /// A thin async facade over [`Self::stream`] for callers already running
    /// on a `tokio` executor: the synchronous transport runs on a
    /// blocking-pool thread rather than being rewritten atop `tokio`'s own
    /// socket types. Takes `self` by value since `spawn_blocking` requires a `'static`
    /// closure; the streamer (with its updated position) comes back out
    /// alongside the result so the caller can retry or resume.
    pub async fn stream_async<F>(
        mut self,
        cancel: CancellationToken,
        mut sink: F,
    ) -> (Self, Result<()>)
    where
        M: 'static,
        F: FnMut(&Transaction) -> Result<()> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let result = self.stream(&cancel, &mut sink);
            (self, result)
        })
        .await
        .expect("stream_async blocking worker panicked")
    }
}

/// Pulls packets off the reader queue, folds them through the assembler,
/// and invokes `sink` per committed transaction, until cancellation, EOF,
/// a reader failure, or a sink error ends the stream.
fn drain<M, F>(
    cancel: &CancellationToken,
    rx: &std::sync::mpsc::Receiver<ReaderMessage>,
    assembler: &mut Assembler<Arc<M>>,
    sink: &mut F,
) -> Result<()>
where
    M: TableInfoMapper,
    F: FnMut(&Transaction) -> Result<()>,
{
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(ReaderMessage::Packet(packet)) => match parse_dump_packet(&packet, assembler.format())? {
                DumpPacket::Eof => {
                    tracing::info!("binlog dump stream reached EOF");
                    return Err(Error::StreamEof);
                }
                DumpPacket::Event(event) => {
                    if let Some(transaction) = assembler.handle(event)? {
                        sink(&transaction)?;
                    }
                }
            },
            Ok(ReaderMessage::Failed(err)) => return Err(err),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::Protocol(ProtocolError::BadConn));
            }
        }
    }
}
