use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report missing keys per language
    Scan {
        /// Only scan this language
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Translate missing keys and write the locale files
    Sync {
        /// Target languages (comma-separated, default: all supported)
        #[arg(short, long, value_delimiter = ',')]
        langs: Vec<String>,

        /// Show the translations without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Check on start, then re-check for each language code read from stdin
    Watch,

    /// Translate catalog entities
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Verify that the completion endpoint is reachable
    Check,

    /// Write a default configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "autotranslate.toml")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum CatalogAction {
    /// Translate many entities with a single request
    Translate {
        /// Target language
        #[arg(short, long)]
        lang: String,

        /// Maximum number of entities
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Fill in missing fields per entity in the background and wait for the results
    Ensure {
        /// Target language
        #[arg(short, long)]
        lang: String,

        /// Entity ids (comma-separated, default: all)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_languages() {
        let args = Args::parse_from(["autotranslate", "-v", "sync", "--langs", "es,fr", "--dry-run"]);
        assert!(args.verbose);
        match args.command {
            Commands::Sync { langs, dry_run } => {
                assert_eq!(langs, vec!["es", "fr"]);
                assert!(dry_run);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_parse_catalog_ensure() {
        let args = Args::parse_from(["autotranslate", "catalog", "ensure", "--lang", "es", "--ids", "a,b"]);
        match args.command {
            Commands::Catalog {
                action: CatalogAction::Ensure { lang, ids },
            } => {
                assert_eq!(lang, "es");
                assert_eq!(ids, vec!["a", "b"]);
            }
            _ => panic!("expected catalog ensure"),
        }
    }
}
