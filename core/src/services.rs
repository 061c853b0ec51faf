//! # Service Name Enrichment
//!
//! Maps a record's destination port to a well-known service name using an
//! `nmap-services` style table. The table is read once at startup and never
//! changes afterwards.
//!
//! File format: tab-separated, `#` starts a comment line, the first column is
//! the service name and the second one the `port/protocol` key. Anything past
//! the second column (open frequency, trailing comments) is ignored.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use badcapt_common::record::Record;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServiceTableError {
    #[error("opening services file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("reading services file: {0}")]
    Read(#[from] io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTable {
    entries: HashMap<String, String>,
}

impl ServiceTable {
    pub fn load(path: &Path) -> Result<Self, ServiceTableError> {
        let file: File = File::open(path).map_err(|source| ServiceTableError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table: ServiceTable = Self::parse(BufReader::new(file))?;
        info!("Parsed descriptions for {} ports", table.len());
        Ok(table)
    }

    /// Later lines win when the same key appears twice. Bytes that are not
    /// valid UTF-8 are replaced rather than rejected.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, ServiceTableError> {
        let mut entries: HashMap<String, String> = HashMap::new();

        for raw in reader.split(b'\n') {
            let raw: Vec<u8> = raw?;
            let line: Cow<'_, str> = String::from_utf8_lossy(&raw);
            let line: &str = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let (Some(name), Some(key)) = (fields.next(), fields.next()) else {
                continue;
            };
            entries.insert(key.to_string(), name.to_string());
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Looks up `<port>/<protocol>`; `protocol` is lowercased first.
    pub fn lookup(&self, port: u16, protocol: &str) -> Option<&str> {
        self.get(&format!("{}/{}", port, protocol.to_ascii_lowercase()))
    }

    /// Names the record's destination port after its first transport layer.
    ///
    /// Records without a TCP, UDP or SCTP layer, or whose port is unknown,
    /// come back untouched.
    pub fn enrich(&self, record: Record) -> Record {
        let service: Option<String> = record
            .transport_protocol()
            .and_then(|proto| self.lookup(record.destination_port, proto))
            .map(str::to_string);

        match service {
            Some(name) => record.with_destination_service(name),
            None => record,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ServiceTable
where
    K: Into<String>,
    V: Into<String>,
{
    /// Builds a table from `(port/protocol, name)` pairs.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, name)| (key.into(), name.into()))
                .collect(),
        }
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
