use badcapt_common::packet::DecodedPacket;
use badcapt_common::tag::Tag;

pub const TAG: Tag = Tag::new("mirai");

/// Mirai bots seed the TCP sequence number with the target address.
pub fn identify(packet: &DecodedPacket) -> Vec<Tag> {
    let (Some(ip), Some(tcp)) = (packet.ipv4(), packet.tcp()) else {
        return Vec::new();
    };

    if u32::from(ip.destination) != tcp.sequence {
        return Vec::new();
    }

    vec![TAG]
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
