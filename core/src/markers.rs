//! Packet **markers**: pure fingerprint checks that label a packet with tags.
//!
//! A marker looks at one [`DecodedPacket`] and returns zero or more [`Tag`]s.
//! It never fails: a packet missing the layers a marker needs simply gets no
//! tag. Markers hold no state, so the same registry can be shared by any
//! number of threads.
//!
//! The [`MarkerRegistry`] keeps markers in registration order. Tags are
//! concatenated in that order and never deduplicated.

use std::fmt;

use badcapt_common::packet::DecodedPacket;
use badcapt_common::tag::Tag;

pub mod low_mss;
pub mod masscan;
pub mod mirai;
pub mod zmap;

/// A packet classifier.
///
/// Implemented for every `Fn(&DecodedPacket) -> Vec<Tag>`, so plain functions
/// and closures can be registered directly.
pub trait Marker: Send + Sync {
    fn mark(&self, packet: &DecodedPacket) -> Vec<Tag>;
}

impl<F> Marker for F
where
    F: Fn(&DecodedPacket) -> Vec<Tag> + Send + Sync,
{
    fn mark(&self, packet: &DecodedPacket) -> Vec<Tag> {
        self(packet)
    }
}

pub struct MarkerRegistry {
    markers: Vec<(String, Box<dyn Marker>)>,
}

impl MarkerRegistry {
    /// A registry without any marker. Every packet will be discarded.
    pub fn empty() -> Self {
        Self {
            markers: Vec::new(),
        }
    }

    /// Appends a marker. It runs after every marker registered before it.
    pub fn register<M>(&mut self, name: impl Into<String>, marker: M) -> &mut Self
    where
        M: Marker + 'static,
    {
        self.markers.push((name.into(), Box::new(marker)));
        self
    }

    pub fn with<M>(mut self, name: impl Into<String>, marker: M) -> Self
    where
        M: Marker + 'static,
    {
        self.register(name, marker);
        self
    }

    /// Runs every marker and concatenates their tags.
    pub fn tag(&self, packet: &DecodedPacket) -> Vec<Tag> {
        self.markers
            .iter()
            .flat_map(|(_, marker)| marker.mark(packet))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl Default for MarkerRegistry {
    /// Mirai, Zmap, Masscan and Low-MSS, in that order.
    fn default() -> Self {
        Self::empty()
            .with("mirai", mirai::identify)
            .with("zmap", zmap::identify)
            .with("masscan", masscan::identify)
            .with("low-mss", low_mss::identify)
    }
}

impl fmt::Debug for MarkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
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
