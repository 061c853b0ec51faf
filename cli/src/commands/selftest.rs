//! Replays crafted frames carrying each known fingerprint and checks the
//! markers tag them as expected. Needs no privileges and no network.

use anyhow::bail;
use badcapt_common::config::Config;
use badcapt_common::packet::DecodedPacket;
use badcapt_common::tag::Tag;
use badcapt_core::markers::MarkerRegistry;
use badcapt_core::markers::zmap::ZMAP_IP_ID;
use badcapt_core::source::ReplaySource;
use badcapt_core::{Pipeline, PipelineStats};
use badcapt_protocols::craft::{self, TcpProbe, UdpProbe};
use badcapt_protocols::decode_ethernet;
use chrono::Utc;
use tracing::{info, warn};

use super::listen::build_sink;

pub const ORIGIN: &str = "selftest";

struct Probe {
    name: &'static str,
    expected: &'static [&'static str],
    frame: Vec<u8>,
}

fn probes() -> anyhow::Result<Vec<Probe>> {
    let base = TcpProbe::default();
    let masscan_id: u16 =
        (base.sequence ^ u32::from(base.destination) ^ u32::from(base.destination_port)) as u16;

    Ok(vec![
        Probe {
            name: "plain syn",
            expected: &[],
            frame: craft::create_tcp_frame(&TcpProbe {
                mss: Some(1460),
                ..base.clone()
            })?,
        },
        Probe {
            name: "mirai syn",
            expected: &["mirai"],
            frame: craft::create_tcp_frame(&TcpProbe {
                sequence: u32::from(base.destination),
                destination_port: 23,
                ..base.clone()
            })?,
        },
        Probe {
            name: "zmap syn",
            expected: &["zmap"],
            frame: craft::create_tcp_frame(&TcpProbe {
                identification: ZMAP_IP_ID,
                ..base.clone()
            })?,
        },
        Probe {
            name: "zmap udp",
            expected: &["zmap"],
            frame: craft::create_udp_frame(&UdpProbe {
                identification: ZMAP_IP_ID,
                payload: b"\x00\x01".to_vec(),
                ..UdpProbe::default()
            })?,
        },
        Probe {
            name: "masscan syn",
            expected: &["masscan"],
            frame: craft::create_tcp_frame(&TcpProbe {
                identification: masscan_id,
                ..base.clone()
            })?,
        },
        Probe {
            name: "tiny mss syn",
            expected: &["low-mss"],
            frame: craft::create_tcp_frame(&TcpProbe {
                mss: Some(64),
                ..base.clone()
            })?,
        },
        Probe {
            name: "mirai from zmap",
            expected: &["mirai", "zmap"],
            frame: craft::create_tcp_frame(&TcpProbe {
                sequence: u32::from(base.destination),
                identification: ZMAP_IP_ID,
                syn: false,
                ack: true,
                payload: b"hello".to_vec(),
                ..base
            })?,
        },
    ])
}

/// Returns the names of probes whose tags differ from the expected ones.
fn check(registry: &MarkerRegistry, probes: &[Probe], packets: &[DecodedPacket]) -> Vec<&'static str> {
    probes
        .iter()
        .zip(packets)
        .filter_map(|(probe, packet)| {
            let tags: Vec<Tag> = registry.tag(packet);
            let labels: Vec<&str> = tags.iter().map(Tag::as_str).collect();
            if labels == probe.expected {
                info!("{}: {:?}", probe.name, labels);
                None
            } else {
                warn!("{}: expected {:?}, got {:?}", probe.name, probe.expected, labels);
                Some(probe.name)
            }
        })
        .collect()
}

pub fn selftest(cfg: Config) -> anyhow::Result<()> {
    let probes: Vec<Probe> = probes()?;
    let packets: Vec<DecodedPacket> = probes
        .iter()
        .map(|probe| decode_ethernet(&probe.frame, Utc::now()))
        .collect();

    let mut pipeline = Pipeline::from_config(&cfg, MarkerRegistry::default(), build_sink(&cfg.export)?)?;
    let failed: Vec<&'static str> = check(pipeline.registry(), &probes, &packets);

    let mut source = ReplaySource::from_packets(ORIGIN, packets);
    let stats: PipelineStats = pipeline.run(&mut source)?;
    info!("{} of {} probes exported", stats.exported, stats.received);

    if !failed.is_empty() {
        bail!("{} probes tagged unexpectedly: {}", failed.len(), failed.join(", "));
    }
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
