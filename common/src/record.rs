//! # Export Record
//!
//! The normalized unit handed to every sink. A record is assembled once from
//! a tagged packet, optionally enriched with a service name, then only read.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tag::Tag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    #[serde(rename = "src_ip", skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<IpAddr>,
    #[serde(rename = "layers", skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<String>,
    #[serde(rename = "src_port", skip_serializing_if = "is_zero")]
    pub source_port: u16,
    #[serde(rename = "dst_ip", skip_serializing_if = "Option::is_none")]
    pub destination_ip: Option<IpAddr>,
    #[serde(rename = "dst_port", skip_serializing_if = "is_zero")]
    pub destination_port: u16,
    #[serde(rename = "dst_service", skip_serializing_if = "Option::is_none")]
    pub destination_service: Option<String>,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "hex::serde::serialize")]
    pub payload: Vec<u8>,
    #[serde(rename = "payload_str", skip_serializing_if = "String::is_empty")]
    pub payload_text: String,
}

impl Record {
    /// Returns the record with its destination service set.
    pub fn with_destination_service(mut self, service: impl Into<String>) -> Self {
        self.destination_service = Some(service.into());
        self
    }

    /// Name of the first transport protocol among the decoded layers.
    pub fn transport_protocol(&self) -> Option<&str> {
        self.layers
            .iter()
            .map(String::as_str)
            .find(|layer| matches!(*layer, "TCP" | "UDP" | "SCTP"))
    }

    pub fn has_tag(&self, label: &str) -> bool {
        self.tags.iter().any(|tag| tag.as_str() == label)
    }
}

/// Text view of a payload. Bytes are not validated as any particular charset.
pub fn payload_as_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

fn is_zero(port: &u16) -> bool {
    *port == 0
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
    use chrono::TimeZone;
    use std::net::Ipv4Addr;

    fn sample() -> Record {
        Record {
            source_ip: Some(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7))),
            layers: vec!["Ethernet".into(), "IPv4".into(), "TCP".into()],
            source_port: 40000,
            destination_ip: Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
            destination_port: 23,
            destination_service: None,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            tags: vec![Tag::new("mirai")],
            payload: Vec::new(),
            payload_text: String::new(),
        }
    }

    #[test]
    fn serialize_should_omit_zero_fields() {
        let mut record: Record = sample();
        record.source_ip = None;
        record.source_port = 0;

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();

        assert!(!obj.contains_key("src_ip"));
        assert!(!obj.contains_key("src_port"));
        assert!(!obj.contains_key("dst_service"));
        assert!(!obj.contains_key("payload"));
        assert!(!obj.contains_key("payload_str"));
        assert_eq!(obj["dst_ip"], "192.0.2.1");
        assert_eq!(obj["dst_port"], 23);
        assert_eq!(obj["tags"], serde_json::json!(["mirai"]));
        assert_eq!(obj["date"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn serialize_should_keep_empty_tags_and_date() {
        let mut record: Record = sample();
        record.tags.clear();
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tags"], serde_json::json!([]));
        assert!(json.get("date").is_some());
    }

    #[test]
    fn payload_should_serialize_as_hex_with_text_view() {
        let mut record: Record = sample();
        record.payload = vec![0x47, 0x45, 0x54, 0xff];
        record.payload_text = payload_as_text(&record.payload);

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["payload"], "474554ff");
        assert_eq!(json["payload_str"], "GET\u{FFFD}");
    }

    #[test]
    fn payload_hex_should_keep_leading_zeros() {
        let mut record: Record = sample();
        record.payload = vec![0x00, 0x0a, 0xbe, 0xef];

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["payload"], "000abeef");
    }

    #[test]
    fn transport_protocol_should_pick_first_match() {
        let mut record: Record = sample();
        record.layers = vec!["IPv4".into(), "UDP".into(), "TCP".into()];
        assert_eq!(record.transport_protocol(), Some("UDP"));

        record.layers = vec!["IPv4".into(), "tcp".into()];
        assert_eq!(record.transport_protocol(), None);
    }

    #[test]
    fn with_destination_service_should_set_name() {
        let record: Record = sample().with_destination_service("telnet");
        assert_eq!(record.destination_service.as_deref(), Some("telnet"));
        assert!(record.has_tag("mirai"));
    }
}
