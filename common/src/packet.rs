//! # Decoded Packet Model
//!
//! A read-only view over one captured frame after link, network and transport
//! decoding. Every layer past the first one is optional: a frame may stop at
//! Ethernet (ARP), at the network layer (ICMP, fragments) or carry a full
//! TCP/UDP/SCTP header with an application payload.
//!
//! Detectors and the record builder only ever see this type, never raw bytes,
//! so layer presence is expressed with [`Option`] and enums instead of casts.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};

/// TCP option kind carrying the Maximum Segment Size.
pub const TCP_OPTION_MSS: u8 = 2;

/// Decoded layer kinds, in the naming used by conventional packet decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Ethernet,
    Dot1Q,
    Arp,
    Ipv4,
    Ipv6,
    Fragment,
    Tcp,
    Udp,
    Sctp,
    Icmpv4,
    Icmpv6,
    Payload,
    DecodeFailure,
}

impl LayerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Ethernet => "Ethernet",
            LayerType::Dot1Q => "Dot1Q",
            LayerType::Arp => "ARP",
            LayerType::Ipv4 => "IPv4",
            LayerType::Ipv6 => "IPv6",
            LayerType::Fragment => "Fragment",
            LayerType::Tcp => "TCP",
            LayerType::Udp => "UDP",
            LayerType::Sctp => "SCTP",
            LayerType::Icmpv4 => "ICMPv4",
            LayerType::Icmpv6 => "ICMPv6",
            LayerType::Payload => "Payload",
            LayerType::DecodeFailure => "DecodeFailure",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The IPv4 header fields the markers care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub identification: u16,
    pub ttl: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub hop_limit: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkLayer {
    V4(Ipv4Header),
    V6(Ipv6Header),
}

impl NetworkLayer {
    pub fn source(&self) -> IpAddr {
        match self {
            NetworkLayer::V4(hdr) => IpAddr::V4(hdr.source),
            NetworkLayer::V6(hdr) => IpAddr::V6(hdr.source),
        }
    }

    pub fn destination(&self) -> IpAddr {
        match self {
            NetworkLayer::V4(hdr) => IpAddr::V4(hdr.destination),
            NetworkLayer::V6(hdr) => IpAddr::V6(hdr.destination),
        }
    }
}

/// A single TCP option as it appeared on the wire, without the kind and length octets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpOption {
    pub kind: u8,
    pub data: Vec<u8>,
}

impl TcpOption {
    pub fn new(kind: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }
}

/// TCP control bits, stored exactly as the 9 low bits of the header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags(pub u16);

impl TcpFlags {
    pub const FIN: u16 = 0b0_0000_0001;
    pub const SYN: u16 = 0b0_0000_0010;
    pub const RST: u16 = 0b0_0000_0100;
    pub const PSH: u16 = 0b0_0000_1000;
    pub const ACK: u16 = 0b0_0001_0000;

    pub fn syn(&self) -> bool {
        self.0 & Self::SYN != 0
    }

    pub fn ack(&self) -> bool {
        self.0 & Self::ACK != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgement: u32,
    pub flags: TcpFlags,
    pub window: u16,
    pub options: Vec<TcpOption>,
}

impl TcpHeader {
    pub fn is_syn(&self) -> bool {
        self.flags.syn()
    }

    /// Value of the first Maximum Segment Size option.
    ///
    /// Options whose data is shorter than two octets are treated as absent.
    pub fn mss(&self) -> Option<u16> {
        self.options
            .iter()
            .filter(|opt| opt.kind == TCP_OPTION_MSS)
            .find_map(|opt| match opt.data.as_slice() {
                [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SctpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub verification_tag: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportLayer {
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Sctp(SctpHeader),
}

impl TransportLayer {
    pub fn source_port(&self) -> u16 {
        match self {
            TransportLayer::Tcp(hdr) => hdr.source_port,
            TransportLayer::Udp(hdr) => hdr.source_port,
            TransportLayer::Sctp(hdr) => hdr.source_port,
        }
    }

    pub fn destination_port(&self) -> u16 {
        match self {
            TransportLayer::Tcp(hdr) => hdr.destination_port,
            TransportLayer::Udp(hdr) => hdr.destination_port,
            TransportLayer::Sctp(hdr) => hdr.destination_port,
        }
    }
}

/// One decoded frame.
///
/// Built once by a decoder and never mutated afterwards; the builder-style
/// `with_*` methods exist for decoders and tests assembling a packet layer by layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    layers: Vec<LayerType>,
    network: Option<NetworkLayer>,
    transport: Option<TransportLayer>,
    payload: Option<Vec<u8>>,
    timestamp: DateTime<Utc>,
}

impl DecodedPacket {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            layers: Vec::new(),
            network: None,
            transport: None,
            payload: None,
            timestamp,
        }
    }

    pub fn push_layer(&mut self, layer: LayerType) {
        self.layers.push(layer);
    }

    pub fn with_layer(mut self, layer: LayerType) -> Self {
        self.push_layer(layer);
        self
    }

    pub fn with_network(mut self, network: NetworkLayer) -> Self {
        self.layers.push(match network {
            NetworkLayer::V4(_) => LayerType::Ipv4,
            NetworkLayer::V6(_) => LayerType::Ipv6,
        });
        self.network = Some(network);
        self
    }

    pub fn with_transport(mut self, transport: TransportLayer) -> Self {
        self.layers.push(match transport {
            TransportLayer::Tcp(_) => LayerType::Tcp,
            TransportLayer::Udp(_) => LayerType::Udp,
            TransportLayer::Sctp(_) => LayerType::Sctp,
        });
        self.transport = Some(transport);
        self
    }

    /// Attaches an application payload. Empty payloads are not a layer.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        let payload: Vec<u8> = payload.into();
        if !payload.is_empty() {
            self.layers.push(LayerType::Payload);
            self.payload = Some(payload);
        }
        self
    }

    pub fn layers(&self) -> &[LayerType] {
        &self.layers
    }

    pub fn has_layer(&self, layer: LayerType) -> bool {
        self.layers.contains(&layer)
    }

    pub fn network(&self) -> Option<&NetworkLayer> {
        self.network.as_ref()
    }

    pub fn transport(&self) -> Option<&TransportLayer> {
        self.transport.as_ref()
    }

    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        match &self.network {
            Some(NetworkLayer::V4(hdr)) => Some(hdr),
            _ => None,
        }
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        match &self.transport {
            Some(TransportLayer::Tcp(hdr)) => Some(hdr),
            _ => None,
        }
    }

    pub fn udp(&self) -> Option<&UdpHeader> {
        match &self.transport {
            Some(TransportLayer::Udp(hdr)) => Some(hdr),
            _ => None,
        }
    }

    /// Source and destination address of the network layer.
    pub fn network_flow(&self) -> Option<(IpAddr, IpAddr)> {
        self.network
            .as_ref()
            .map(|net| (net.source(), net.destination()))
    }

    /// Source and destination port of the transport layer.
    pub fn transport_flow(&self) -> Option<(u16, u16)> {
        self.transport
            .as_ref()
            .map(|tr| (tr.source_port(), tr.destination_port()))
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
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
