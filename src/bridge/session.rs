//! One TCP client session.
//!
//! The wire protocol is a single opcode byte per client chunk: `0x01` starts
//! a 48-byte input frame (the opcode doubles as the report ID), `0xFF`
//! requests shutdown. Server-to-client traffic is the raw 48-byte output
//! report, no framing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::report::{INPUT_FRAME_LEN, OUTPUT_REPORT_LEN};

const OPCODE_INPUT: u8 = 0x01;
const OPCODE_SHUTDOWN: u8 = 0xFF;

/// A decoded client chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOp {
    /// Full input report, opcode byte included.
    Input([u8; INPUT_FRAME_LEN]),
    /// Orderly shutdown of the whole bridge.
    Shutdown,
}

/// Decode one read chunk.
///
/// Empty and over-length chunks are dropped before opcode matching; a
/// shutdown opcode accepts any trailing bytes.
pub fn decode_chunk(chunk: &[u8]) -> Option<ClientOp> {
    if chunk.is_empty() || chunk.len() > INPUT_FRAME_LEN {
        return None;
    }
    match chunk[0] {
        OPCODE_SHUTDOWN => Some(ClientOp::Shutdown),
        OPCODE_INPUT if chunk.len() == INPUT_FRAME_LEN => {
            let mut frame = [0u8; INPUT_FRAME_LEN];
            frame.copy_from_slice(chunk);
            Some(ClientOp::Input(frame))
        }
        _ => None,
    }
}

/// State for one connected client.
pub struct Session {
    stream: TcpStream,
    remote: SocketAddr,
    open: AtomicBool,
    closed: Notify,
}

impl Session {
    pub fn new(stream: TcpStream, remote: SocketAddr) -> Self {
        Self {
            stream,
            remote,
            open: AtomicBool::new(true),
            closed: Notify::new(),
        }
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Mark the session released and wake its read loop. Idempotent; returns
    /// whether this call performed the release.
    pub fn release(&self) -> bool {
        let was_open = self.open.swap(false, Ordering::SeqCst);
        if was_open {
            debug!("session released: {}", self.remote);
            self.closed.notify_waiters();
        }
        was_open
    }

    /// Send one 48-byte output frame, non-blocking.
    ///
    /// Returns `false` once the session is released. A full socket buffer
    /// drops the frame; the next sampler tick carries fresher state anyway.
    pub fn send_output(&self, payload: &[u8]) -> bool {
        if !self.is_open() {
            return false;
        }
        if payload.len() != OUTPUT_REPORT_LEN {
            warn!("refusing output frame of {} bytes", payload.len());
            return true;
        }
        let mut frame = [0u8; OUTPUT_REPORT_LEN];
        frame.copy_from_slice(payload);
        match self.stream.try_write(&frame) {
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                trace!("output frame dropped, socket busy: {}", self.remote);
                true
            }
            Err(e) => {
                warn!("Session error [{}]: {}", self.remote, e);
                self.release();
                false
            }
        }
    }

    /// Read client chunks until the peer closes, an error occurs, or the
    /// session is released. Returns `Some(ClientOp::Shutdown)` when the
    /// client asked for an orderly bridge shutdown.
    pub async fn run<F>(&self, mut on_input: F) -> Option<ClientOp>
    where
        F: FnMut(&[u8; INPUT_FRAME_LEN]),
    {
        let mut buf = [0u8; 256];
        loop {
            if !self.is_open() {
                return None;
            }
            tokio::select! {
                _ = self.closed.notified() => {
                    debug!("session read loop stopped: {}", self.remote);
                    return None;
                }
                ready = self.stream.readable() => {
                    if let Err(e) = ready {
                        warn!("Session error [{}]: {}", self.remote, e);
                        self.release();
                        return None;
                    }
                    match self.stream.try_read(&mut buf) {
                        Ok(0) => {
                            debug!("client closed: {}", self.remote);
                            self.release();
                            return None;
                        }
                        Ok(n) => match decode_chunk(&buf[..n]) {
                            Some(ClientOp::Input(frame)) => on_input(&frame),
                            Some(ClientOp::Shutdown) => {
                                debug!("shutdown opcode from {}", self.remote);
                                self.release();
                                return Some(ClientOp::Shutdown);
                            }
                            None => trace!("dropping {}-byte chunk from {}", n, self.remote),
                        },
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                        Err(e) => {
                            warn!("Session error [{}]: {}", self.remote, e);
                            self.release();
                            return None;
                        }
                    }
                }
            }
        }
    }
}
