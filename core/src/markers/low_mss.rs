//! SYNs advertising a tiny Maximum Segment Size are the trigger for SACK Panic
//! (CVE-2019-11477) on unpatched Linux kernels.

use badcapt_common::packet::DecodedPacket;
use badcapt_common::tag::Tag;

pub const TAG: Tag = Tag::new("low-mss");

pub const MSS_THRESHOLD: u16 = 500;

pub fn identify(packet: &DecodedPacket) -> Vec<Tag> {
    let Some(tcp) = packet.tcp() else {
        return Vec::new();
    };
    if !tcp.is_syn() {
        return Vec::new();
    }

    match tcp.mss() {
        Some(mss) if mss < MSS_THRESHOLD => vec![TAG],
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
