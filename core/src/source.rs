//! Packet sources feeding the pipeline.
//!
//! A source is pulled one packet at a time and blocks until the next one is
//! available. `Ok(None)` ends the stream cleanly; a [`SourceError`] is either
//! transient (the pipeline logs it and pulls again) or fatal (the pipeline
//! stops and returns it).

use std::collections::VecDeque;
use std::io;

use badcapt_common::packet::DecodedPacket;
use thiserror::Error;

pub mod interface;

pub use interface::InterfaceSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transient read error: {0}")]
    Transient(#[source] io::Error),
    #[error("capture failed: {0}")]
    Fatal(#[source] io::Error),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<DecodedPacket>, SourceError>;

    /// Label passed on to sinks, e.g. the interface name.
    fn origin(&self) -> &str;
}

/// Serves a fixed sequence of reads, then ends the stream.
pub struct ReplaySource {
    origin: String,
    reads: VecDeque<Result<DecodedPacket, SourceError>>,
}

impl ReplaySource {
    pub fn new<I>(origin: impl Into<String>, reads: I) -> Self
    where
        I: IntoIterator<Item = Result<DecodedPacket, SourceError>>,
    {
        Self {
            origin: origin.into(),
            reads: reads.into_iter().collect(),
        }
    }

    pub fn from_packets<I>(origin: impl Into<String>, packets: I) -> Self
    where
        I: IntoIterator<Item = DecodedPacket>,
    {
        Self::new(origin, packets.into_iter().map(Ok))
    }
}

impl PacketSource for ReplaySource {
    fn next_packet(&mut self) -> Result<Option<DecodedPacket>, SourceError> {
        self.reads.pop_front().transpose()
    }

    fn origin(&self) -> &str {
        &self.origin
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
