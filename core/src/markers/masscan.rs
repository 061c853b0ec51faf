use badcapt_common::packet::DecodedPacket;
use badcapt_common::tag::Tag;

pub const TAG: Tag = Tag::new("masscan");

/// Masscan derives the IP identification of its SYNs from
/// `dst_ip ^ dst_port ^ seq`, truncated to 16 bits.
pub fn identify(packet: &DecodedPacket) -> Vec<Tag> {
    let (Some(ip), Some(tcp)) = (packet.ipv4(), packet.tcp()) else {
        return Vec::new();
    };
    if !tcp.is_syn() {
        return Vec::new();
    }

    let mixed: u32 = tcp.sequence ^ u32::from(ip.destination) ^ u32::from(tcp.destination_port);
    if mixed as u16 != ip.identification {
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
