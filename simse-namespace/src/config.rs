use clap::{Parser, Subcommand};

use crate::namespace::NamespaceOptions;
use crate::path::NamespaceLimits;

#[derive(Parser, Debug)]
#[command(name = "simse-namespace", about = "Concurrent in-memory namespace: guided tour and stress driver")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Mode bits of the root directory (octal)
    #[arg(long, default_value = "755", value_parser = parse_mode, env = "SIMSE_NAMESPACE_ROOT_MODE")]
    pub root_mode: u32,

    /// Mode bits of files created without an explicit mode (octal)
    #[arg(long, default_value = "644", value_parser = parse_mode, env = "SIMSE_NAMESPACE_FILE_MODE")]
    pub file_mode: u32,

    /// Maximum number of path components
    #[arg(long, default_value = "32", env = "SIMSE_NAMESPACE_MAX_DEPTH")]
    pub max_depth: usize,

    /// Maximum length of a single path component
    #[arg(long, default_value = "255")]
    pub max_name_length: usize,

    /// Maximum length of a canonical path
    #[arg(long, default_value = "1024")]
    pub max_path_length: usize,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info", env = "SIMSE_NAMESPACE_LOG_LEVEL")]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Walk through every operation on a sample tree
    Tour,
    /// Hammer one namespace from many threads and verify the result
    Stress {
        /// Worker threads
        #[arg(long, default_value = "8", env = "SIMSE_NAMESPACE_THREADS")]
        threads: usize,

        /// Files written by each thread
        #[arg(long, default_value = "100")]
        files: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Tour)
    }

    pub fn namespace_options(&self) -> NamespaceOptions {
        NamespaceOptions {
            limits: NamespaceLimits {
                max_path_depth: self.max_depth,
                max_name_length: self.max_name_length,
                max_path_length: self.max_path_length,
            },
            root_mode: self.root_mode,
            default_file_mode: self.file_mode,
        }
    }
}

/// Parse mode bits written in octal, with or without a `0o` prefix.
fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|e| format!("invalid octal mode {:?}: {}", s, e))?;
    if mode > 0o7777 {
        return Err(format!("mode out of range: {:o}", mode));
    }
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_namespace_defaults() {
        let args = CliArgs::try_parse_from(["simse-namespace"]).unwrap();
        assert_eq!(args.command(), Command::Tour);
        assert_eq!(args.namespace_options(), NamespaceOptions::default());
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn stress_subcommand() {
        let args = CliArgs::try_parse_from([
            "simse-namespace",
            "stress",
            "--threads",
            "4",
            "--files",
            "10",
            "--json",
        ])
        .unwrap();
        assert_eq!(
            args.command(),
            Command::Stress {
                threads: 4,
                files: 10,
                json: true,
            }
        );
    }

    #[test]
    fn modes_are_octal() {
        let args = CliArgs::try_parse_from([
            "simse-namespace",
            "--root-mode",
            "0o700",
            "--file-mode",
            "600",
        ])
        .unwrap();
        let options = args.namespace_options();
        assert_eq!(options.root_mode, 0o700);
        assert_eq!(options.default_file_mode, 0o600);
    }

    #[test]
    fn invalid_mode_rejected() {
        assert!(parse_mode("9").is_err());
        assert!(parse_mode("17777").is_err());
        assert!(CliArgs::try_parse_from(["simse-namespace", "--root-mode", "rwx"]).is_err());
    }
}
