//! Human readable record output for `--format pretty`.

use std::io::{self, Stdout, Write};
use std::net::IpAddr;

use anyhow::Context;
use badcapt_common::record::Record;
use badcapt_core::export::{ExportContext, Sink};
use colored::*;

pub const TOTAL_WIDTH: usize = 64;

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let dash_count: usize = TOTAL_WIDTH.saturating_sub(formatted.chars().count());
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    eprintln!(
        "{}{}{}",
        "─".repeat(left).bright_black(),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right).bright_black()
    );
}

/// Prints one coloured block per record.
pub struct PrettySink<W: Write> {
    writer: W,
}

impl<W: Write> PrettySink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl PrettySink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Sink for PrettySink<W> {
    fn export(&mut self, ctx: &ExportContext, record: &Record) -> anyhow::Result<()> {
        let tags: Vec<&str> = record.tags.iter().map(|tag| tag.as_str()).collect();
        let service: String = record
            .destination_service
            .as_deref()
            .map(|name| format!(" ({name})"))
            .unwrap_or_default();

        writeln!(
            self.writer,
            "{} {} {} {} {}{} {}",
            format!("[{} #{}]", ctx.origin, ctx.sequence).bright_black(),
            record.timestamp.format("%H:%M:%S%.3f").to_string().dimmed(),
            endpoint(record.source_ip, record.source_port).cyan(),
            "→".bright_black(),
            endpoint(record.destination_ip, record.destination_port).cyan(),
            service.green(),
            tags.join(", ").red().bold(),
        )
        .context("writing record")?;

        writeln!(self.writer, " {} {}", "└─".bright_black(), record.layers.join(" / ").dimmed())
            .context("writing record")?;

        if !record.payload_text.is_empty() {
            writeln!(
                self.writer,
                " {} {:?}",
                "└─".bright_black(),
                record.payload_text
            )
            .context("writing record")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush().context("flushing output")
    }
}

fn endpoint(ip: Option<IpAddr>, port: u16) -> String {
    match (ip, port) {
        (None, _) => "?".to_string(),
        (Some(ip), 0) => ip.to_string(),
        (Some(IpAddr::V6(ip)), port) => format!("[{ip}]:{port}"),
        (Some(ip), port) => format!("{ip}:{port}"),
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
