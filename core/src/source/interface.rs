//! Live capture from a network interface.
//!
//! Opens a **pnet datalink** Ethernet channel in promiscuous mode and decodes
//! every received frame. Capturing requires **root privileges** on most
//! systems.
//!
//! The channel is read with a short timeout so the stop flag is noticed even
//! on a silent link; setting it ends the stream cleanly.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use badcapt_common::packet::DecodedPacket;
use badcapt_protocols::decode_ethernet;
use chrono::Utc;
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, NetworkInterface};
use pnet::packet::ethernet::EthernetPacket;
use pnet::util::MacAddr;
use tracing::info;

use super::{PacketSource, SourceError};

const READ_TIMEOUT: Duration = Duration::from_millis(250);
const READ_BUFFER_SIZE: usize = 1600;
const MAX_CONSECUTIVE_ERRORS: u32 = 64;

pub struct InterfaceSource {
    name: String,
    mac: Option<MacAddr>,
    rx: Box<dyn DataLinkReceiver>,
    stop: Arc<AtomicBool>,
    inbound_only: bool,
    consecutive_errors: u32,
}

impl InterfaceSource {
    pub fn open(name: &str, inbound_only: bool, stop: Arc<AtomicBool>) -> anyhow::Result<Self> {
        let intf: NetworkInterface = find_interface(name)?;
        Self::with_opener(intf, &capture_config(), datalink::channel, inbound_only, stop)
    }

    fn with_opener<F>(
        intf: NetworkInterface,
        cfg: &Config,
        channel_opener: F,
        inbound_only: bool,
        stop: Arc<AtomicBool>,
    ) -> anyhow::Result<Self>
    where
        F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
    {
        let rx: Box<dyn DataLinkReceiver> = open_eth_channel(&intf, cfg, channel_opener)?;
        info!("Started capturing on iface {}", intf.name);
        Ok(Self {
            name: intf.name,
            mac: intf.mac,
            rx,
            stop,
            inbound_only,
            consecutive_errors: 0,
        })
    }

    fn classify(&mut self, err: io::Error) -> SourceError {
        self.consecutive_errors += 1;
        let fatal_kind: bool = matches!(
            err.kind(),
            io::ErrorKind::NetworkDown
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
                | io::ErrorKind::PermissionDenied
        );
        if fatal_kind || self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            SourceError::Fatal(err)
        } else {
            SourceError::Transient(err)
        }
    }
}

impl PacketSource for InterfaceSource {
    /// The datalink channel carries no kernel timestamp, so packets are
    /// stamped with the time they were read.
    fn next_packet(&mut self) -> Result<Option<DecodedPacket>, SourceError> {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(None);
            }

            match self.rx.next() {
                Ok(frame) => {
                    self.consecutive_errors = 0;
                    if self.inbound_only && is_outbound(self.mac, frame) {
                        continue;
                    }
                    return Ok(Some(decode_ethernet(frame, Utc::now())));
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    continue;
                }
                Err(e) => return Err(self.classify(e)),
            }
        }
    }

    fn origin(&self) -> &str {
        &self.name
    }
}

fn is_outbound(own_mac: Option<MacAddr>, frame: &[u8]) -> bool {
    match (own_mac, EthernetPacket::new(frame)) {
        (Some(own), Some(eth)) => eth.get_source() == own,
        _ => false,
    }
}

/// Finds an interface by its exact name.
pub fn find_interface(name: &str) -> anyhow::Result<NetworkInterface> {
    match datalink::interfaces().into_iter().find(|intf| intf.name == name) {
        Some(intf) => Ok(intf),
        None => bail!("no such interface: {name}"),
    }
}

fn capture_config() -> Config {
    Config {
        read_timeout: Some(READ_TIMEOUT),
        read_buffer_size: READ_BUFFER_SIZE,
        promiscuous: true,
        ..Default::default()
    }
}

fn open_eth_channel<F>(
    intf: &NetworkInterface,
    cfg: &Config,
    channel_opener: F,
) -> anyhow::Result<Box<dyn DataLinkReceiver>>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let ch: Channel = channel_opener(intf, *cfg).with_context(|| format!("opening on {}", intf.name))?;
    match ch {
        Channel::Ethernet(_tx, rx) => Ok(rx),
        _ => bail!("non-ethernet channel for {}", intf.name),
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
