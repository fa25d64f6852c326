//! Length-delimited datagram framing.
//!
//! Mirrors `original_source/twittytwister/streaming.py`'s `LengthDelimitedStream`: each datagram
//! is prefixed by a `\r\n`-terminated ASCII decimal length, or an empty line for keep-alive.
//! Unlike the Twisted original (`LineReceiver`, which decodes one connection's bytes inline),
//! this is a free-standing decoder fed explicit chunks, so it can be driven by a `StreamProtocol`
//! without owning the connection itself.

use bytes::{Buf, Bytes, BytesMut};

/// One decoded event out of the wire stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// A complete datagram of the advertised length.
    Datagram(Bytes),
    /// An empty line, sent periodically to keep the connection alive.
    KeepAlive,
}

#[derive(Debug)]
enum Mode {
    /// Scanning for the next `\r\n`-terminated length line.
    Line,
    /// Accumulating `expected` bytes of datagram body.
    Raw { expected: usize },
}

/// Incremental length-delimited frame decoder.
///
/// Bytes are fed in via [`FrameDecoder::feed`]; every complete frame found in the accumulated
/// buffer is returned, in order. Partial data is retained across calls.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    mode: Mode,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        FrameDecoder { buf: BytesMut::new(), mode: Mode::Line }
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` to the internal buffer and decodes as many frames as are now available.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(frame) = self.next_frame() {
            out.push(frame);
        }
        out
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.mode {
            Mode::Line => self.next_line_frame(),
            Mode::Raw { expected } => self.next_raw_frame(expected),
        }
    }

    fn next_line_frame(&mut self) -> Option<Frame> {
        let pos = memchr::memmem::find(&self.buf, b"\r\n")?;
        let line = self.buf.split_to(pos).freeze();
        self.buf.advance(2); // skip the \r\n itself

        if line.is_empty() {
            return Some(Frame::KeepAlive);
        }

        match std::str::from_utf8(&line).ok().and_then(|s| s.parse::<usize>().ok()) {
            Some(expected) => {
                self.mode = Mode::Raw { expected };
                self.next_raw_frame(expected)
            }
            None => {
                tracing::warn!(?line, "frame: non-numeric length line, treating as keep-alive");
                Some(Frame::KeepAlive)
            }
        }
    }

    fn next_raw_frame(&mut self, expected: usize) -> Option<Frame> {
        if self.buf.len() < expected {
            return None;
        }
        let datagram = self.buf.split_to(expected).freeze();
        self.mode = Mode::Line;
        Some(Frame::Datagram(datagram))
    }
}
