#![cfg(test)]
//! Decoded packets built from crafted wire frames.

use std::net::Ipv4Addr;

use badcapt_common::packet::DecodedPacket;
use badcapt_core::markers::zmap::ZMAP_IP_ID;
use badcapt_protocols::craft::{self, ETH_HDR_LEN, TcpProbe, UdpProbe};
use badcapt_protocols::decode_ethernet;
use chrono::Utc;

/// Offset of the protocol octet inside the IPv4 header.
const IPV4_PROTOCOL_OFFSET: usize = 9;
const IP_PROTO_ICMP: u8 = 1;
const IP_PROTO_SCTP: u8 = 132;
/// Smallest payload that lets a relabelled UDP datagram hold an SCTP common header.
const SCTP_PADDING: usize = 4;

pub const TARGET: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 20);

pub fn tcp(probe: TcpProbe) -> DecodedPacket {
    decode_ethernet(&craft::create_tcp_frame(&probe).unwrap(), Utc::now())
}

pub fn probe(destination_port: u16) -> TcpProbe {
    TcpProbe {
        destination: TARGET,
        destination_port,
        ..TcpProbe::default()
    }
}

pub fn benign(destination_port: u16) -> DecodedPacket {
    tcp(TcpProbe {
        mss: Some(1460),
        ..probe(destination_port)
    })
}

/// Matches both the Mirai and the Zmap fingerprint.
pub fn mirai_zmap(destination_port: u16) -> DecodedPacket {
    tcp(TcpProbe {
        sequence: u32::from(TARGET),
        identification: ZMAP_IP_ID,
        syn: false,
        ack: true,
        ..probe(destination_port)
    })
}

pub fn zmap_udp(payload: &[u8]) -> DecodedPacket {
    let frame: Vec<u8> = craft::create_udp_frame(&UdpProbe {
        destination: TARGET,
        identification: ZMAP_IP_ID,
        payload: payload.to_vec(),
        ..UdpProbe::default()
    })
    .unwrap();
    decode_ethernet(&frame, Utc::now())
}

/// A Zmap-tagged IPv4 packet whose transport is ICMP.
pub fn zmap_icmp() -> DecodedPacket {
    let mut frame: Vec<u8> = craft::create_udp_frame(&UdpProbe {
        destination: TARGET,
        identification: ZMAP_IP_ID,
        ..UdpProbe::default()
    })
    .unwrap();
    frame[ETH_HDR_LEN + IPV4_PROTOCOL_OFFSET] = IP_PROTO_ICMP;
    decode_ethernet(&frame, Utc::now())
}

/// A Zmap-tagged IPv4 packet carrying an SCTP common header.
pub fn zmap_sctp(destination_port: u16) -> DecodedPacket {
    let mut frame: Vec<u8> = craft::create_udp_frame(&UdpProbe {
        destination: TARGET,
        identification: ZMAP_IP_ID,
        destination_port,
        payload: vec![0; SCTP_PADDING],
        ..UdpProbe::default()
    })
    .unwrap();
    frame[ETH_HDR_LEN + IPV4_PROTOCOL_OFFSET] = IP_PROTO_SCTP;
    decode_ethernet(&frame, Utc::now())
}
