use badcapt_common::packet::DecodedPacket;
use badcapt_common::tag::Tag;

pub const TAG: Tag = Tag::new("zmap");

/// Identification value hard-coded into zmap's probe packets.
pub const ZMAP_IP_ID: u16 = 54321;

pub fn identify(packet: &DecodedPacket) -> Vec<Tag> {
    match packet.ipv4() {
        Some(ip) if ip.identification == ZMAP_IP_ID => vec![TAG],
        _ => Vec::new(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::testing::{ipv4_only, no_network};
    use std::net::Ipv4Addr;

    #[test]
    fn identify_should_tag_zmap_id() {
        let packet = ipv4_only(Ipv4Addr::new(192, 0, 2, 1), ZMAP_IP_ID);
        assert_eq!(identify(&packet), vec![TAG]);
    }

    #[test]
    fn identify_should_ignore_other_ids() {
        for id in [0, 54320, 54322, u16::MAX] {
            let packet = ipv4_only(Ipv4Addr::new(192, 0, 2, 1), id);
            assert!(identify(&packet).is_empty(), "id {id} was tagged");
        }
    }

    #[test]
    fn identify_should_ignore_packet_without_network_layer() {
        assert!(identify(&no_network()).is_empty());
    }
}
