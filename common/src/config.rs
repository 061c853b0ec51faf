use std::path::PathBuf;

use thiserror::Error;

/// Location of the nmap services table on most Linux distributions.
pub const DEFAULT_SERVICES_PATH: &str = "/usr/share/nmap/nmap-services";

pub struct Config {
    /// Name of the interface to capture from.
    pub interface: String,

    /// Where tagged records are delivered.
    pub export: ExportTarget,

    /// How records are built from packets missing a network or transport layer.
    pub record_policy: RecordPolicy,

    /// Service table used to name destination ports.
    ///
    /// [`ServicesSource::Disabled`] skips enrichment entirely.
    pub services: ServicesSource,

    /// Drops frames sent by the capturing interface itself.
    pub inbound_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// Write every record to standard output.
    Screen { format: ScreenFormat },
    /// Append JSON lines to a file.
    File { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordPolicy {
    /// Missing layers leave the matching record fields empty.
    #[default]
    Lenient,
    /// Packets without IPv4, or without TCP and UDP, are rejected.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServicesSource {
    #[default]
    Disabled,
    /// [`DEFAULT_SERVICES_PATH`].
    Default,
    Path(PathBuf),
}

impl ServicesSource {
    pub fn path(&self) -> Option<PathBuf> {
        match self {
            ServicesSource::Disabled => None,
            ServicesSource::Default => Some(PathBuf::from(DEFAULT_SERVICES_PATH)),
            ServicesSource::Path(path) => Some(path.clone()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no capture interface given")]
    MissingInterface,
    #[error("export file path is empty")]
    EmptyExportPath,
    #[error("services file path is empty")]
    EmptyServicesPath,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: String::new(),
            export: ExportTarget::Screen {
                format: ScreenFormat::Json,
            },
            record_policy: RecordPolicy::Lenient,
            services: ServicesSource::Disabled,
            inbound_only: true,
        }
    }
}

impl Config {
    /// Checks the settings that cannot be expressed by the types alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.trim().is_empty() {
            return Err(ConfigError::MissingInterface);
        }
        if let ExportTarget::File { path } = &self.export {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyExportPath);
            }
        }
        if let ServicesSource::Path(path) = &self.services {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyServicesPath);
            }
        }
        Ok(())
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
