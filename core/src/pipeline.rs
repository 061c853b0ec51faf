//! The classification **pipeline**.
//!
//! Pulls packets from a [`PacketSource`] one at a time and, for each one,
//! runs the markers, builds a record for tagged packets, names the
//! destination service when a table is loaded and hands the record to the
//! sink. Everything happens on the calling thread; the next packet is only
//! read once the previous one has been fully exported or dropped.

use badcapt_common::config::{Config, ConfigError, RecordPolicy};
use badcapt_common::packet::DecodedPacket;
use badcapt_common::record::Record;
use badcapt_common::tag::Tag;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::export::{ExportContext, Sink};
use crate::markers::MarkerRegistry;
use crate::record::{self, TaggedPacket};
use crate::services::{ServiceTable, ServiceTableError};
use crate::source::{PacketSource, SourceError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("loading service table: {0}")]
    Services(#[from] ServiceTableError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// What happened to a single packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No marker matched.
    Discarded,
    /// Tagged but refused by the strict record policy.
    Rejected,
    Exported,
    ExportFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub tagged: u64,
    pub rejected: u64,
    pub exported: u64,
    pub export_failures: u64,
    pub transient_errors: u64,
}

pub struct Pipeline<S: Sink> {
    registry: MarkerRegistry,
    services: Option<ServiceTable>,
    policy: RecordPolicy,
    sink: S,
    stats: PipelineStats,
}

impl<S: Sink> Pipeline<S> {
    pub fn new(registry: MarkerRegistry, sink: S) -> Self {
        Self {
            registry,
            services: None,
            policy: RecordPolicy::default(),
            sink,
            stats: PipelineStats::default(),
        }
    }

    /// Builds a pipeline from a validated configuration.
    ///
    /// The service table, when enabled, is loaded here so a missing or
    /// unreadable file is reported before any packet is read.
    pub fn from_config(cfg: &Config, registry: MarkerRegistry, sink: S) -> Result<Self, PipelineError> {
        cfg.validate()?;
        let mut pipeline: Pipeline<S> = Self::new(registry, sink).with_policy(cfg.record_policy);
        if let Some(path) = cfg.services.path() {
            pipeline = pipeline.with_services(ServiceTable::load(&path)?);
        }
        Ok(pipeline)
    }

    pub fn with_services(mut self, table: ServiceTable) -> Self {
        self.services = Some(table);
        self
    }

    pub fn with_policy(mut self, policy: RecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Classifies one packet and exports it when tagged.
    pub fn process(&mut self, ctx: &ExportContext, packet: &DecodedPacket) -> Outcome {
        self.stats.received += 1;

        let tags: Vec<Tag> = self.registry.tag(packet);
        if tags.is_empty() {
            debug!("Packet #{} matched no marker", ctx.sequence);
            return Outcome::Discarded;
        }
        self.stats.tagged += 1;

        let record: Record = match record::build(TaggedPacket { packet, tags }, self.policy) {
            Ok(record) => record,
            Err(e) => {
                warn!("Dropping tagged packet #{}: {e}", ctx.sequence);
                self.stats.rejected += 1;
                return Outcome::Rejected;
            }
        };

        let record: Record = match &self.services {
            Some(table) => table.enrich(record),
            None => record,
        };

        match self.sink.export(ctx, &record) {
            Ok(()) => {
                self.stats.exported += 1;
                Outcome::Exported
            }
            Err(e) => {
                warn!("Export of packet #{} failed: {e:#}", ctx.sequence);
                self.stats.export_failures += 1;
                Outcome::ExportFailed
            }
        }
    }

    /// Drains `source` until it ends or fails.
    ///
    /// Transient read errors are logged and skipped. A fatal one stops the
    /// run and is returned after the sink has been flushed.
    pub fn run<P: PacketSource + ?Sized>(&mut self, source: &mut P) -> Result<PipelineStats, PipelineError> {
        info!(
            "Inspecting packets from {} with {} markers",
            source.origin(),
            self.registry.len()
        );
        let mut sequence: u64 = 0;

        let result: Result<(), PipelineError> = loop {
            match source.next_packet() {
                Ok(Some(packet)) => {
                    sequence += 1;
                    let ctx = ExportContext {
                        origin: source.origin().to_string(),
                        sequence,
                    };
                    self.process(&ctx, &packet);
                }
                Ok(None) => break Ok(()),
                Err(e) if e.is_transient() => {
                    warn!("{e}");
                    self.stats.transient_errors += 1;
                }
                Err(e) => {
                    error!("{e}");
                    break Err(e.into());
                }
            }
        };

        if let Err(e) = self.sink.flush() {
            warn!("Flushing sink failed: {e:#}");
        }
        info!(
            "Stopped after {} packets, {} tagged, {} exported",
            self.stats.received, self.stats.tagged, self.stats.exported
        );

        result.map(|()| self.stats)
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
    use crate::export::{FnSink, from_fn};
    use crate::markers::testing::{ipv4_only, no_network, tcp_packet};
    use crate::markers::{mirai, zmap};
    use crate::source::ReplaySource;
    use badcapt_common::config::{ExportTarget, ServicesSource};
    use std::cell::RefCell;
    use std::io;
    use std::net::Ipv4Addr;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    type Shared = Rc<RefCell<Vec<Record>>>;
    type Collect = FnSink<Box<dyn FnMut(&ExportContext, &Record) -> anyhow::Result<()>>>;

    fn collecting(out: Shared) -> Collect {
        let push: Box<dyn FnMut(&ExportContext, &Record) -> anyhow::Result<()>> =
            Box::new(move |_: &ExportContext, rec: &Record| {
                out.borrow_mut().push(rec.clone());
                Ok(())
            });
        from_fn(push)
    }

    fn ctx() -> ExportContext {
        ExportContext {
            origin: "test".into(),
            sequence: 1,
        }
    }

    fn mirai_and_zmap() -> DecodedPacket {
        let dst = Ipv4Addr::new(1, 2, 3, 4);
        tcp_packet(dst, u32::from(dst), zmap::ZMAP_IP_ID, 80, false, None)
    }

    #[test]
    fn process_should_discard_untagged_packet() {
        let out: Shared = Default::default();
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), collecting(out.clone()));

        assert_eq!(pipeline.process(&ctx(), &no_network()), Outcome::Discarded);
        assert!(out.borrow().is_empty());
        assert_eq!(pipeline.stats().received, 1);
        assert_eq!(pipeline.stats().tagged, 0);
    }

    #[test]
    fn process_should_export_tags_in_registration_order() {
        let out: Shared = Default::default();
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), collecting(out.clone()));

        assert_eq!(pipeline.process(&ctx(), &mirai_and_zmap()), Outcome::Exported);
        let records = out.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tags, vec![mirai::TAG, zmap::TAG]);
    }

    #[test]
    fn process_should_enrich_when_table_loaded() {
        let out: Shared = Default::default();
        let table: ServiceTable = [("80/tcp", "http")].into_iter().collect();
        let mut pipeline =
            Pipeline::new(MarkerRegistry::default(), collecting(out.clone())).with_services(table);

        pipeline.process(&ctx(), &mirai_and_zmap());
        assert_eq!(out.borrow()[0].destination_service.as_deref(), Some("http"));
    }

    #[test]
    fn process_should_not_enrich_without_table() {
        let out: Shared = Default::default();
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), collecting(out.clone()));

        pipeline.process(&ctx(), &mirai_and_zmap());
        assert!(out.borrow()[0].destination_service.is_none());
    }

    #[test]
    fn process_should_reject_under_strict_policy() {
        let out: Shared = Default::default();
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), collecting(out.clone()))
            .with_policy(RecordPolicy::Strict);

        let zmap_icmp = ipv4_only(Ipv4Addr::new(192, 0, 2, 1), zmap::ZMAP_IP_ID);
        assert_eq!(pipeline.process(&ctx(), &zmap_icmp), Outcome::Rejected);
        assert!(out.borrow().is_empty());
        assert_eq!(pipeline.stats().rejected, 1);
    }

    #[test]
    fn run_should_continue_after_export_failure() {
        let mut calls: u32 = 0;
        let sink = from_fn(move |_: &ExportContext, _: &Record| {
            calls += 1;
            if calls == 1 {
                anyhow::bail!("index unavailable");
            }
            Ok(())
        });
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), sink);
        let mut source = ReplaySource::from_packets("test", vec![mirai_and_zmap(), mirai_and_zmap()]);

        let stats: PipelineStats = pipeline.run(&mut source).unwrap();
        assert_eq!(stats.tagged, 2);
        assert_eq!(stats.export_failures, 1);
        assert_eq!(stats.exported, 1);
    }

    #[test]
    fn run_should_skip_transient_and_stop_on_fatal() {
        let out: Shared = Default::default();
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), collecting(out.clone()));
        let mut source = ReplaySource::new(
            "test",
            vec![
                Err(SourceError::Transient(io::Error::from(io::ErrorKind::Interrupted))),
                Ok(mirai_and_zmap()),
                Err(SourceError::Fatal(io::Error::from(io::ErrorKind::NetworkDown))),
                Ok(mirai_and_zmap()),
            ],
        );

        let err: PipelineError = pipeline.run(&mut source).unwrap_err();
        assert!(matches!(err, PipelineError::Source(SourceError::Fatal(_))));
        assert_eq!(out.borrow().len(), 1);
        assert_eq!(pipeline.stats().transient_errors, 1);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn run_should_warn_on_transient_errors() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();

        let sink = from_fn(|_: &ExportContext, _: &Record| Ok(()));
        let mut pipeline = Pipeline::new(MarkerRegistry::default(), sink);
        let mut source = ReplaySource::new(
            "test",
            vec![Err(SourceError::Transient(io::Error::other("ring buffer overrun")))],
        );
        tracing::subscriber::with_default(subscriber, || pipeline.run(&mut source)).unwrap();

        let output: String = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("ring buffer overrun"));
    }

    #[test]
    fn run_should_pass_sequence_and_origin_to_sink() {
        let mut seen: Vec<(String, u64)> = Vec::new();
        {
            let sink = from_fn(|ctx: &ExportContext, _: &Record| {
                seen.push((ctx.origin.clone(), ctx.sequence));
                Ok(())
            });
            let mut pipeline = Pipeline::new(MarkerRegistry::default(), sink);
            let mut source =
                ReplaySource::from_packets("eth9", vec![no_network(), mirai_and_zmap()]);
            pipeline.run(&mut source).unwrap();
        }
        assert_eq!(seen, vec![("eth9".to_string(), 2)]);
    }

    #[test]
    fn from_config_should_fail_on_missing_services_file() {
        let cfg = Config {
            interface: "eth0".into(),
            export: ExportTarget::Screen {
                format: Default::default(),
            },
            services: ServicesSource::Path("/nonexistent/badcapt/services".into()),
            ..Config::default()
        };
        let sink = from_fn(|_: &ExportContext, _: &Record| Ok(()));
        let result = Pipeline::from_config(&cfg, MarkerRegistry::default(), sink);
        assert!(matches!(result, Err(PipelineError::Services(_))));
    }

    #[test]
    fn from_config_should_fail_on_invalid_config() {
        let sink = from_fn(|_: &ExportContext, _: &Record| Ok(()));
        let result = Pipeline::from_config(&Config::default(), MarkerRegistry::default(), sink);
        assert!(matches!(result, Err(PipelineError::Config(ConfigError::MissingInterface))));
    }
}
