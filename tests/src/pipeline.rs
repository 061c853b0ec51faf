#![cfg(test)]
use std::io::{self, Cursor};

use badcapt_common::config::RecordPolicy;
use badcapt_common::packet::DecodedPacket;
use badcapt_common::record::Record;
use badcapt_core::export::{ExportContext, JsonLinesSink, from_fn};
use badcapt_core::markers::MarkerRegistry;
use badcapt_core::services::ServiceTable;
use badcapt_core::source::{ReplaySource, SourceError};
use badcapt_core::{Pipeline, PipelineError, PipelineStats};
use serde_json::{Value, json};

use crate::frames::{benign, mirai_zmap, zmap_icmp, zmap_sctp, zmap_udp};

const SERVICES: &str = "# test table\nhttp\t80/tcp\t0.48\nhttp\t80/udp\t0.03\ndomain\t53/udp\t0.21\nsctp-svc\t2905/sctp\t0.01\n";

fn export_json(packets: Vec<DecodedPacket>, table: Option<ServiceTable>) -> Vec<Value> {
    let mut pipeline = Pipeline::new(MarkerRegistry::default(), JsonLinesSink::new(Vec::new()));
    if let Some(table) = table {
        pipeline = pipeline.with_services(table);
    }
    let mut source = ReplaySource::from_packets("replay", packets);
    pipeline.run(&mut source).unwrap();

    let out: String = String::from_utf8(pipeline.into_sink().into_inner()).unwrap();
    out.lines().map(|line| serde_json::from_str(line).unwrap()).collect()
}

fn services() -> ServiceTable {
    ServiceTable::parse(Cursor::new(SERVICES)).unwrap()
}

/*************************************************************
                      Tagging and export
**************************************************************/

#[test]
fn multi_match_packet_exports_one_record_with_both_tags() {
    let records: Vec<Value> = export_json(vec![mirai_zmap(80)], None);

    assert_eq!(records.len(), 1);
    let record: &Value = &records[0];
    assert_eq!(record["tags"], json!(["mirai", "zmap"]));
    assert_eq!(record["layers"], json!(["Ethernet", "IPv4", "TCP"]));
    assert_eq!(record["src_ip"], "198.51.100.10");
    assert_eq!(record["dst_ip"], "192.0.2.20");
    assert_eq!(record["src_port"], 40000);
    assert_eq!(record["dst_port"], 80);
    assert!(record["date"].is_string());
    assert!(record.get("dst_service").is_none());
    assert!(record.get("payload").is_none());
}

#[test]
fn untagged_packets_are_never_exported() {
    let records: Vec<Value> = export_json(vec![benign(80), benign(443), benign(22)], None);
    assert!(records.is_empty());
}

#[test]
fn payload_is_exported_as_hex_and_text() {
    let records: Vec<Value> = export_json(vec![zmap_udp(b"hi\xff")], None);

    assert_eq!(records[0]["layers"], json!(["Ethernet", "IPv4", "UDP", "Payload"]));
    assert_eq!(records[0]["payload"], "6869ff");
    assert_eq!(records[0]["payload_str"], "hi\u{fffd}");
}

/*************************************************************
                      Service enrichment
**************************************************************/

#[test]
fn known_port_is_named_from_table() {
    let records: Vec<Value> = export_json(vec![mirai_zmap(80), zmap_udp(b"")], Some(services()));

    assert_eq!(records[0]["dst_service"], "http");
    assert_eq!(records[1]["dst_service"], "domain");
}

#[test]
fn sctp_port_is_named_from_table() {
    let records: Vec<Value> = export_json(vec![zmap_sctp(2905)], Some(services()));

    assert_eq!(records[0]["layers"], json!(["Ethernet", "IPv4", "SCTP"]));
    assert_eq!(records[0]["dst_port"], 2905);
    assert_eq!(records[0]["dst_service"], "sctp-svc");
}

#[test]
fn unknown_port_has_no_service() {
    let records: Vec<Value> = export_json(vec![mirai_zmap(81)], Some(services()));
    assert!(records[0].get("dst_service").is_none());
}

#[test]
fn service_table_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nmap-services");
    std::fs::write(&path, SERVICES).unwrap();

    let table: ServiceTable = ServiceTable::load(&path).unwrap();
    assert_eq!(table.lookup(80, "TCP"), Some("http"));
    assert_eq!(table.len(), 4);
}

/*************************************************************
                    Failures and policies
**************************************************************/

#[test]
fn failed_export_does_not_stop_later_ones() {
    let mut delivered: Vec<u64> = Vec::new();
    let stats: PipelineStats = {
        let sink = from_fn(|ctx: &ExportContext, _: &Record| {
            if ctx.sequence == 2 {
                anyhow::bail!("sink unavailable");
            }
            delivered.push(ctx.sequence);
            Ok(())
        });
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), sink);
        let mut source = ReplaySource::from_packets(
            "replay",
            vec![mirai_zmap(80), mirai_zmap(81), benign(80), mirai_zmap(82)],
        );
        pipeline.run(&mut source).unwrap()
    };

    assert_eq!(delivered, vec![1, 4]);
    assert_eq!(stats.received, 4);
    assert_eq!(stats.tagged, 3);
    assert_eq!(stats.exported, 2);
    assert_eq!(stats.export_failures, 1);
}

#[test]
fn transient_errors_are_skipped_and_fatal_ones_returned() {
    let mut pipeline = Pipeline::new(MarkerRegistry::default(), JsonLinesSink::new(Vec::new()));
    let mut source = ReplaySource::new(
        "replay",
        vec![
            Ok(mirai_zmap(80)),
            Err(SourceError::Transient(io::Error::from(io::ErrorKind::Interrupted))),
            Ok(mirai_zmap(81)),
            Err(SourceError::Fatal(io::Error::from(io::ErrorKind::NetworkDown))),
            Ok(mirai_zmap(82)),
        ],
    );

    let err: PipelineError = pipeline.run(&mut source).unwrap_err();
    assert!(matches!(err, PipelineError::Source(SourceError::Fatal(_))));
    assert_eq!(pipeline.stats().transient_errors, 1);

    let out: String = String::from_utf8(pipeline.into_sink().into_inner()).unwrap();
    assert_eq!(out.lines().count(), 2);
}

#[test]
fn lenient_policy_exports_packet_without_transport_ports() {
    let records: Vec<Value> = export_json(vec![zmap_icmp()], None);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["layers"], json!(["Ethernet", "IPv4", "ICMPv4"]));
    assert!(records[0].get("src_port").is_none());
    assert!(records[0].get("dst_port").is_none());
}

#[test]
fn strict_policy_rejects_packet_without_tcp_or_udp() {
    let mut pipeline = Pipeline::new(MarkerRegistry::default(), JsonLinesSink::new(Vec::new()))
        .with_policy(RecordPolicy::Strict);
    let mut source = ReplaySource::from_packets("replay", vec![zmap_icmp(), mirai_zmap(80)]);

    let stats: PipelineStats = pipeline.run(&mut source).unwrap();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.exported, 1);
}

#[test]
fn records_append_to_export_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.jsonl");

    for _ in 0..2 {
        let sink = JsonLinesSink::append_to(&path).unwrap();
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), sink);
        let mut source = ReplaySource::from_packets("replay", vec![mirai_zmap(80)]);
        pipeline.run(&mut source).unwrap();
    }

    let content: String = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
}
