//! CLI command definitions.

use cairn_core::resource::{Priority, ResourceKind};
use clap::{Subcommand, ValueEnum};

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect the engine configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Load resources through the engine and report each outcome
    Fetch {
        /// Locators to load (http, https or file URLs)
        #[arg(required = true)]
        urls: Vec<String>,

        /// Admission priority for every locator
        #[arg(short, long, value_enum, default_value = "medium")]
        priority: PriorityArg,

        /// How response bodies are decoded
        #[arg(short, long, value_enum, default_value = "binary")]
        kind: KindArg,

        /// Bypass the cache
        #[arg(long)]
        no_cache: bool,

        /// Load every locator twice to show cache hits
        #[arg(long)]
        repeat: bool,
    },

    /// Run the monitoring loop and print snapshots
    Monitor {
        /// Number of snapshots to print before exiting
        #[arg(short, long, default_value_t = 3)]
        samples: u32,

        /// Frame rate to report to the quality controller
        #[arg(long)]
        fps: Option<f64>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as YAML
    Show,

    /// Check a configuration file without running the engine
    Validate {
        /// Path to configuration file
        #[arg(default_value = "cairn.yaml")]
        path: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
            PriorityArg::Critical => Priority::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Image,
    Audio,
    Json,
    Text,
    Binary,
}

impl From<KindArg> for ResourceKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Image => ResourceKind::Image,
            KindArg::Audio => ResourceKind::Audio,
            KindArg::Json => ResourceKind::Json,
            KindArg::Text => ResourceKind::Text,
            KindArg::Binary => ResourceKind::Binary,
        }
    }
}
