pub mod listen;
pub mod selftest;

use std::path::PathBuf;

use badcapt_common::config::{
    Config, DEFAULT_SERVICES_PATH, ExportTarget, RecordPolicy, ScreenFormat, ServicesSource,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "badcapt")]
#[command(about = "Flags packets carrying the fingerprints of mass scanners and botnets.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture on an interface and report tagged packets
    #[command(alias = "l")]
    Listen {
        /// Interface to capture from
        #[arg(short, long)]
        iface: String,

        /// Also inspect frames sent by this host
        #[arg(long)]
        include_outbound: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run crafted fingerprint frames through the markers
    #[command(alias = "t")]
    Selftest {
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
pub struct OutputArgs {
    /// Name destination ports from an nmap-services file
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = DEFAULT_SERVICES_PATH)]
    pub services: Option<PathBuf>,

    /// How records are printed on screen
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Append JSON lines to this file instead of printing them
    #[arg(long, value_name = "PATH")]
    pub out_file: Option<PathBuf>,

    /// Drop tagged packets lacking an IPv4 or TCP/UDP layer
    #[arg(long)]
    pub strict: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl OutputArgs {
    /// Fills the output related fields of a [`Config`].
    pub fn to_config(&self, interface: &str, inbound_only: bool) -> Config {
        let export: ExportTarget = match &self.out_file {
            Some(path) => ExportTarget::File { path: path.clone() },
            None => ExportTarget::Screen {
                format: match self.format {
                    OutputFormat::Json => ScreenFormat::Json,
                    OutputFormat::Pretty => ScreenFormat::Pretty,
                },
            },
        };
        let services: ServicesSource = match &self.services {
            None => ServicesSource::Disabled,
            Some(path) if path.as_os_str() == DEFAULT_SERVICES_PATH => ServicesSource::Default,
            Some(path) => ServicesSource::Path(path.clone()),
        };

        Config {
            interface: interface.to_string(),
            export,
            record_policy: if self.strict {
                RecordPolicy::Strict
            } else {
                RecordPolicy::Lenient
            },
            services,
            inbound_only,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CommandLine {
        CommandLine::try_parse_from(args).unwrap()
    }

    fn listen_config(cmd: CommandLine) -> Config {
        match cmd.command {
            Commands::Listen {
                iface,
                include_outbound,
                output,
            } => output.to_config(&iface, !include_outbound),
            Commands::Selftest { .. } => panic!("expected listen"),
        }
    }

    #[test]
    fn listen_should_default_to_json_without_services() {
        let cfg: Config = listen_config(parse(&["badcapt", "listen", "-i", "eth0"]));
        assert_eq!(cfg.interface, "eth0");
        assert_eq!(cfg.export, ExportTarget::Screen { format: ScreenFormat::Json });
        assert_eq!(cfg.services, ServicesSource::Disabled);
        assert_eq!(cfg.record_policy, RecordPolicy::Lenient);
        assert!(cfg.inbound_only);
    }

    #[test]
    fn bare_services_flag_should_use_default_table() {
        let cfg: Config = listen_config(parse(&["badcapt", "listen", "-i", "eth0", "--services"]));
        assert_eq!(cfg.services, ServicesSource::Default);
    }

    #[test]
    fn services_path_should_be_kept() {
        let cfg: Config = listen_config(parse(&[
            "badcapt",
            "listen",
            "-i",
            "eth0",
            "--services",
            "/tmp/services",
        ]));
        assert_eq!(cfg.services, ServicesSource::Path("/tmp/services".into()));
    }

    #[test]
    fn out_file_should_override_screen_output() {
        let cfg: Config = listen_config(parse(&[
            "badcapt",
            "l",
            "-i",
            "eth0",
            "--format",
            "pretty",
            "--out-file",
            "records.jsonl",
            "--strict",
            "--include-outbound",
        ]));
        assert_eq!(cfg.export, ExportTarget::File { path: "records.jsonl".into() });
        assert_eq!(cfg.record_policy, RecordPolicy::Strict);
        assert!(!cfg.inbound_only);
    }

    #[test]
    fn verbose_should_count_occurrences() {
        let cmd: CommandLine = parse(&["badcapt", "selftest", "-vv"]);
        assert_eq!(cmd.verbose, 2);
    }

    #[test]
    fn listen_should_require_interface() {
        assert!(CommandLine::try_parse_from(["badcapt", "listen"]).is_err());
    }
}
