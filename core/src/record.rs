//! Record construction from tagged packets.

use badcapt_common::config::RecordPolicy;
use badcapt_common::packet::{DecodedPacket, LayerType};
use badcapt_common::record::{self, Record};
use badcapt_common::tag::Tag;
use thiserror::Error;

/// A packet that matched at least one marker.
#[derive(Debug)]
pub struct TaggedPacket<'a> {
    pub packet: &'a DecodedPacket,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing required layer: {0}")]
    MissingLayer(&'static str),
}

/// Builds the export record for a tagged packet.
///
/// Under [`RecordPolicy::Lenient`] this never fails: absent layers leave
/// addresses empty and ports at zero. [`RecordPolicy::Strict`] refuses
/// packets without IPv4, or without either TCP or UDP.
pub fn build(tagged: TaggedPacket<'_>, policy: RecordPolicy) -> Result<Record, RecordError> {
    let packet: &DecodedPacket = tagged.packet;

    if policy == RecordPolicy::Strict {
        if packet.ipv4().is_none() {
            return Err(RecordError::MissingLayer("IPv4"));
        }
        if packet.tcp().is_none() && packet.udp().is_none() {
            return Err(RecordError::MissingLayer("TCP or UDP"));
        }
    }

    let layers: Vec<String> = packet
        .layers()
        .iter()
        .map(|layer: &LayerType| layer.as_str().to_string())
        .collect();
    let (source_ip, destination_ip) = match packet.network_flow() {
        Some((src, dst)) => (Some(src), Some(dst)),
        None => (None, None),
    };
    let (source_port, destination_port) = packet.transport_flow().unwrap_or((0, 0));
    let payload: Vec<u8> = packet.payload().map(<[u8]>::to_vec).unwrap_or_default();

    Ok(Record {
        source_ip,
        layers,
        source_port,
        destination_ip,
        destination_port,
        destination_service: None,
        timestamp: packet.timestamp(),
        tags: tagged.tags,
        payload_text: record::payload_as_text(&payload),
        payload,
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
