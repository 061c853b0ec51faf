//! Frame decoding on top of `pnet`.
//!
//! Decoding never fails as a whole. Each layer is peeled off in turn; the
//! first header that cannot be parsed appends [`LayerType::DecodeFailure`]
//! and stops the walk, leaving every outer layer available to the markers.

use chrono::{DateTime, Utc};
use pnet::packet::Packet;
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;

use badcapt_common::packet::{
    DecodedPacket, Ipv4Header, Ipv6Header, LayerType, NetworkLayer, SctpHeader, TcpFlags,
    TcpHeader, TcpOption, TransportLayer, UdpHeader,
};

const SCTP_HDR_LEN: usize = 12;
const TCP_OPT_EOL: u8 = 0;
const TCP_OPT_NOP: u8 = 1;

/// Decodes an Ethernet II frame.
pub fn decode_ethernet(frame: &[u8], timestamp: DateTime<Utc>) -> DecodedPacket {
    let mut decoded: DecodedPacket = DecodedPacket::new(timestamp);
    let Some(eth) = EthernetPacket::new(frame) else {
        decoded.push_layer(LayerType::DecodeFailure);
        return decoded;
    };
    decoded.push_layer(LayerType::Ethernet);
    decode_ethertype(decoded, eth.get_ethertype(), eth.payload())
}

/// Decodes a bare IP packet, as delivered by tun devices and raw sockets.
pub fn decode_ip(packet: &[u8], timestamp: DateTime<Utc>) -> DecodedPacket {
    let decoded: DecodedPacket = DecodedPacket::new(timestamp);
    match packet.first().map(|b| b >> 4) {
        Some(4) => decode_ipv4(decoded, packet),
        Some(6) => decode_ipv6(decoded, packet),
        _ => decoded.with_layer(LayerType::DecodeFailure),
    }
}

fn decode_ethertype(decoded: DecodedPacket, ethertype: EtherType, payload: &[u8]) -> DecodedPacket {
    match ethertype {
        EtherTypes::Ipv4 => decode_ipv4(decoded, payload),
        EtherTypes::Ipv6 => decode_ipv6(decoded, payload),
        EtherTypes::Arp => decoded.with_layer(LayerType::Arp),
        EtherTypes::Vlan => match VlanPacket::new(payload) {
            Some(vlan) => decode_ethertype(
                decoded.with_layer(LayerType::Dot1Q),
                vlan.get_ethertype(),
                vlan.payload(),
            ),
            None => decoded.with_layer(LayerType::DecodeFailure),
        },
        _ => decoded,
    }
}

fn decode_ipv4(decoded: DecodedPacket, bytes: &[u8]) -> DecodedPacket {
    let Some(ip) = Ipv4Packet::new(bytes) else {
        return decoded.with_layer(LayerType::DecodeFailure);
    };
    if ip.get_header_length() < 5 {
        return decoded.with_layer(LayerType::DecodeFailure);
    }

    let header = Ipv4Header {
        source: ip.get_source(),
        destination: ip.get_destination(),
        identification: ip.get_identification(),
        ttl: ip.get_ttl(),
    };
    let decoded: DecodedPacket = decoded.with_network(NetworkLayer::V4(header));
    if usize::from(ip.get_header_length()) * 4 > bytes.len() {
        return decoded.with_layer(LayerType::DecodeFailure);
    }

    // Only the first fragment carries the transport header.
    if ip.get_fragment_offset() != 0 {
        return decoded.with_layer(LayerType::Fragment);
    }

    decode_transport(decoded, ip.get_next_level_protocol(), ip.payload(), false)
}

fn decode_ipv6(decoded: DecodedPacket, bytes: &[u8]) -> DecodedPacket {
    let Some(ip) = Ipv6Packet::new(bytes) else {
        return decoded.with_layer(LayerType::DecodeFailure);
    };
    let header = Ipv6Header {
        source: ip.get_source(),
        destination: ip.get_destination(),
        hop_limit: ip.get_hop_limit(),
    };
    let decoded: DecodedPacket = decoded.with_network(NetworkLayer::V6(header));
    decode_transport(decoded, ip.get_next_header(), ip.payload(), true)
}

fn decode_transport(
    decoded: DecodedPacket,
    protocol: IpNextHeaderProtocol,
    bytes: &[u8],
    is_v6: bool,
) -> DecodedPacket {
    match protocol {
        IpNextHeaderProtocols::Tcp => decode_tcp(decoded, bytes),
        IpNextHeaderProtocols::Udp => decode_udp(decoded, bytes),
        IpNextHeaderProtocols::Sctp => decode_sctp(decoded, bytes),
        IpNextHeaderProtocols::Icmp if !is_v6 => decoded.with_layer(LayerType::Icmpv4),
        IpNextHeaderProtocols::Icmpv6 if is_v6 => decoded.with_layer(LayerType::Icmpv6),
        _ => decoded,
    }
}

fn decode_tcp(decoded: DecodedPacket, bytes: &[u8]) -> DecodedPacket {
    let Some(tcp) = TcpPacket::new(bytes) else {
        return decoded.with_layer(LayerType::DecodeFailure);
    };
    let header_len: usize = tcp.get_data_offset() as usize * 4;
    if header_len < TcpPacket::minimum_packet_size() || header_len > bytes.len() {
        return decoded.with_layer(LayerType::DecodeFailure);
    }

    let header = TcpHeader {
        source_port: tcp.get_source(),
        destination_port: tcp.get_destination(),
        sequence: tcp.get_sequence(),
        acknowledgement: tcp.get_acknowledgement(),
        flags: TcpFlags(u16::from(tcp.get_flags())),
        window: tcp.get_window(),
        options: parse_tcp_options(&bytes[TcpPacket::minimum_packet_size()..header_len]),
    };
    decoded
        .with_transport(TransportLayer::Tcp(header))
        .with_payload(&bytes[header_len..])
}

fn decode_udp(decoded: DecodedPacket, bytes: &[u8]) -> DecodedPacket {
    let Some(udp) = UdpPacket::new(bytes) else {
        return decoded.with_layer(LayerType::DecodeFailure);
    };
    let header = UdpHeader {
        source_port: udp.get_source(),
        destination_port: udp.get_destination(),
    };
    decoded
        .with_transport(TransportLayer::Udp(header))
        .with_payload(udp.payload())
}

fn decode_sctp(decoded: DecodedPacket, bytes: &[u8]) -> DecodedPacket {
    if bytes.len() < SCTP_HDR_LEN {
        return decoded.with_layer(LayerType::DecodeFailure);
    }
    let header = SctpHeader {
        source_port: u16::from_be_bytes([bytes[0], bytes[1]]),
        destination_port: u16::from_be_bytes([bytes[2], bytes[3]]),
        verification_tag: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
    };
    decoded.with_transport(TransportLayer::Sctp(header))
}

/// Walks the raw TCP option block.
///
/// Stops at End-of-Option-List or at the first option whose length octet is
/// invalid or runs past the block; everything before it is kept.
pub fn parse_tcp_options(raw: &[u8]) -> Vec<TcpOption> {
    let mut options: Vec<TcpOption> = Vec::new();
    let mut cursor: usize = 0;

    while cursor < raw.len() {
        let kind: u8 = raw[cursor];
        match kind {
            TCP_OPT_EOL => break,
            TCP_OPT_NOP => {
                options.push(TcpOption::new(kind, Vec::new()));
                cursor += 1;
            }
            _ => {
                let Some(&len) = raw.get(cursor + 1) else {
                    break;
                };
                let len: usize = len as usize;
                if len < 2 || cursor + len > raw.len() {
                    break;
                }
                options.push(TcpOption::new(kind, &raw[cursor + 2..cursor + len]));
                cursor += len;
            }
        }
    }

    options
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
