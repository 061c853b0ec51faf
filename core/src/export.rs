//! Export dispatch.
//!
//! A [`Sink`] receives every finished record exactly once. The pipeline
//! does not retry: a failed export is logged and the next packet is read.
//! Backends that need a network client (search index, message bus, chat)
//! live outside this crate and plug in through the same trait, usually as a
//! closure wrapped with [`from_fn`].

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

use anyhow::Context;
use badcapt_common::record::Record;

/// Per-record delivery context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportContext {
    /// Where the packet was captured, usually an interface name.
    pub origin: String,
    /// Position of the packet in the capture stream, starting at 1.
    pub sequence: u64,
}

pub trait Sink {
    fn export(&mut self, ctx: &ExportContext, record: &Record) -> anyhow::Result<()>;

    /// Pushes out buffered records. Called once when the pipeline stops.
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Sink backed by a closure, see [`from_fn`].
pub struct FnSink<F>(F);

/// Turns `FnMut(&ExportContext, &Record) -> anyhow::Result<()>` into a [`Sink`].
pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(&ExportContext, &Record) -> anyhow::Result<()>,
{
    FnSink(f)
}

impl<F> Sink for FnSink<F>
where
    F: FnMut(&ExportContext, &Record) -> anyhow::Result<()>,
{
    fn export(&mut self, ctx: &ExportContext, record: &Record) -> anyhow::Result<()> {
        (self.0)(ctx, record)
    }
}

impl Sink for Box<dyn Sink + Send> {
    fn export(&mut self, ctx: &ExportContext, record: &Record) -> anyhow::Result<()> {
        (**self).export(ctx, record)
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        (**self).flush()
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Appends to `path`, creating the file when needed.
    pub fn append_to(path: &Path) -> anyhow::Result<Self> {
        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening export file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn export(&mut self, _ctx: &ExportContext, record: &Record) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, record).context("serializing record")?;
        self.writer.write_all(b"\n").context("writing record")?;
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush().context("flushing records")
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
