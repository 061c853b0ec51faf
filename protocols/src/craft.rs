//! Builders for Ethernet/IPv4 probe frames.
//!
//! These reproduce the header fingerprints the markers look for and feed the
//! self-test mode and the test suites.

use std::net::Ipv4Addr;

use anyhow::Context;
use pnet::packet::MutablePacket;
use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::{self, MutableIpv4Packet};
use pnet::packet::tcp::{self, MutableTcpPacket, TcpFlags};
use pnet::packet::udp::{self, MutableUdpPacket};
use pnet::util::MacAddr;

pub const ETH_HDR_LEN: usize = 14;
pub const IPV4_HDR_LEN: usize = 20;
pub const TCP_HDR_LEN: usize = 20;
pub const UDP_HDR_LEN: usize = 8;
const MSS_OPT_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub source_mac: MacAddr,
    pub destination_mac: MacAddr,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub identification: u16,
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub syn: bool,
    pub ack: bool,
    pub mss: Option<u16>,
    pub payload: Vec<u8>,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            source_mac: MacAddr::new(0x02, 0, 0, 0, 0, 0x01),
            destination_mac: MacAddr::new(0x02, 0, 0, 0, 0, 0x02),
            source: Ipv4Addr::new(198, 51, 100, 10),
            destination: Ipv4Addr::new(192, 0, 2, 20),
            identification: 1,
            source_port: 40000,
            destination_port: 80,
            sequence: 1000,
            syn: true,
            ack: false,
            mss: None,
            payload: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UdpProbe {
    pub source_mac: MacAddr,
    pub destination_mac: MacAddr,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub identification: u16,
    pub source_port: u16,
    pub destination_port: u16,
    pub payload: Vec<u8>,
}

impl Default for UdpProbe {
    fn default() -> Self {
        Self {
            source_mac: MacAddr::new(0x02, 0, 0, 0, 0, 0x01),
            destination_mac: MacAddr::new(0x02, 0, 0, 0, 0, 0x02),
            source: Ipv4Addr::new(198, 51, 100, 10),
            destination: Ipv4Addr::new(192, 0, 2, 20),
            identification: 1,
            source_port: 40000,
            destination_port: 53,
            payload: Vec::new(),
        }
    }
}

pub fn create_tcp_frame(probe: &TcpProbe) -> anyhow::Result<Vec<u8>> {
    let options_len: usize = if probe.mss.is_some() { MSS_OPT_LEN } else { 0 };
    let tcp_len: usize = TCP_HDR_LEN + options_len + probe.payload.len();
    let mut buffer: Vec<u8> = vec![0u8; ETH_HDR_LEN + IPV4_HDR_LEN + tcp_len];

    write_ethernet(&mut buffer, probe.source_mac, probe.destination_mac)?;
    write_ipv4(
        &mut buffer,
        tcp_len,
        IpNextHeaderProtocols::Tcp,
        probe.identification,
        probe.source,
        probe.destination,
    )?;

    {
        let segment: &mut [u8] = &mut buffer[ETH_HDR_LEN + IPV4_HDR_LEN..];
        let mut tcp: MutableTcpPacket =
            MutableTcpPacket::new(segment).context("creating tcp packet")?;
        tcp.set_source(probe.source_port);
        tcp.set_destination(probe.destination_port);
        tcp.set_sequence(probe.sequence);
        tcp.set_acknowledgement(0);
        tcp.set_data_offset(((TCP_HDR_LEN + options_len) / 4) as u8);

        let mut flags = 0;
        if probe.syn {
            flags |= TcpFlags::SYN;
        }
        if probe.ack {
            flags |= TcpFlags::ACK;
        }
        tcp.set_flags(flags);
        tcp.set_window(1024);

        let raw: &mut [u8] = tcp.packet_mut();
        if let Some(mss) = probe.mss {
            let [hi, lo] = mss.to_be_bytes();
            raw[TCP_HDR_LEN..TCP_HDR_LEN + MSS_OPT_LEN].copy_from_slice(&[2, 4, hi, lo]);
        }
        raw[TCP_HDR_LEN + options_len..].copy_from_slice(&probe.payload);

        let checksum: u16 =
            tcp::ipv4_checksum(&tcp.to_immutable(), &probe.source, &probe.destination);
        tcp.set_checksum(checksum);
    }

    Ok(buffer)
}

pub fn create_udp_frame(probe: &UdpProbe) -> anyhow::Result<Vec<u8>> {
    let udp_len: usize = UDP_HDR_LEN + probe.payload.len();
    let mut buffer: Vec<u8> = vec![0u8; ETH_HDR_LEN + IPV4_HDR_LEN + udp_len];

    write_ethernet(&mut buffer, probe.source_mac, probe.destination_mac)?;
    write_ipv4(
        &mut buffer,
        udp_len,
        IpNextHeaderProtocols::Udp,
        probe.identification,
        probe.source,
        probe.destination,
    )?;

    {
        let datagram: &mut [u8] = &mut buffer[ETH_HDR_LEN + IPV4_HDR_LEN..];
        let mut udp: MutableUdpPacket =
            MutableUdpPacket::new(datagram).context("creating udp packet")?;
        udp.set_source(probe.source_port);
        udp.set_destination(probe.destination_port);
        udp.set_length(udp_len as u16);
        udp.set_payload(&probe.payload);
        let checksum: u16 =
            udp::ipv4_checksum(&udp.to_immutable(), &probe.source, &probe.destination);
        udp.set_checksum(checksum);
    }

    Ok(buffer)
}

fn write_ethernet(buf: &mut [u8], source: MacAddr, destination: MacAddr) -> anyhow::Result<()> {
    let mut eth: MutableEthernetPacket =
        MutableEthernetPacket::new(&mut buf[..ETH_HDR_LEN]).context("creating ethernet header")?;
    eth.set_source(source);
    eth.set_destination(destination);
    eth.set_ethertype(EtherTypes::Ipv4);
    Ok(())
}

fn write_ipv4(
    buf: &mut [u8],
    payload_len: usize,
    next: IpNextHeaderProtocol,
    identification: u16,
    source: Ipv4Addr,
    destination: Ipv4Addr,
) -> anyhow::Result<()> {
    let mut ip: MutableIpv4Packet = MutableIpv4Packet::new(
        &mut buf[ETH_HDR_LEN..ETH_HDR_LEN + IPV4_HDR_LEN],
    )
    .context("creating ipv4 header")?;
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length((IPV4_HDR_LEN + payload_len) as u16);
    ip.set_identification(identification);
    ip.set_flags(2); // don't fragment
    ip.set_fragment_offset(0);
    ip.set_ttl(64);
    ip.set_next_level_protocol(next);
    ip.set_source(source);
    ip.set_destination(destination);
    let checksum: u16 = ipv4::checksum(&ip.to_immutable());
    ip.set_checksum(checksum);
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
