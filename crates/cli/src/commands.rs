use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Read every configured table and write records as JSON lines to stdout
    Run {
        #[arg(long, help = "Source settings file (JSON)")]
        config: PathBuf,

        #[arg(long, help = "Extra KEY=VALUE file for ${VAR} references")]
        env_file: Option<PathBuf>,

        #[arg(long, help = "Checkpoint directory, defaults to ~/.tableflow/state")]
        state_dir: Option<PathBuf>,

        #[arg(long, help = "Overrides max_batch_size from the settings file")]
        max_batch_size: Option<usize>,

        #[arg(long, help = "Stop after this many batches")]
        max_batches: Option<u64>,

        #[arg(long, help = "Stop at the first empty batch instead of polling")]
        once: bool,
    },
    /// Check the settings against the database without reading any rows
    Validate {
        #[arg(long, help = "Source settings file (JSON)")]
        config: PathBuf,

        #[arg(long, help = "Extra KEY=VALUE file for ${VAR} references")]
        env_file: Option<PathBuf>,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    Offset {
        #[command(subcommand)]
        command: OffsetCommand,
    },
    /// Test a connection string against a given format
    TestConn {
        /// Data format: "postgres" or "memory"
        #[arg(long)]
        format: String,

        /// Connection string
        #[arg(long, default_value = "")]
        conn_str: String,
    },
}

#[derive(Subcommand)]
pub enum OffsetCommand {
    /// Print the stored checkpoint of a source, or all of them
    Show {
        #[arg(long, help = "Source name; lists every checkpoint when omitted")]
        source: Option<String>,

        #[arg(long)]
        state_dir: Option<PathBuf>,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },
    /// Forget the checkpoint of a source so the next run starts over
    Reset {
        #[arg(long)]
        source: String,

        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
}
