use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rel",
    about = "Regulated Entity Ledger: lifecycle and audit engine for loans, customers, and compliance cases",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the write-ahead log; in-memory when omitted
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// TOML engine configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Identity recorded on every mutation
    #[arg(long, global = true, default_value = "cli")]
    pub actor: String,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Invoke an engine function
    Invoke(InvokeArgs),
    /// Show the audit trail of an entity
    History(HistoryArgs),
    /// Show committed transactions and their events
    Log(LogArgs),
    /// Validate every history stream
    Verify(VerifyArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct InvokeArgs {
    /// Function name, e.g. SubmitLoanApplication
    pub function: String,
    /// Positional arguments; `-` reads one argument from stdin
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub entity_id: String,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    /// First commit sequence to show
    #[arg(long, default_value = "1")]
    pub from: u64,
}

#[derive(Args)]
pub struct VerifyArgs {}

#[derive(Args)]
pub struct ConfigArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rel",
            "invoke",
            "GetLoan",
            "LOAN_1",
            "--actor",
            "officer-7",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.actor, "officer-7");
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.data_dir.is_none());
        match cli.command {
            Command::Invoke(args) => {
                assert_eq!(args.function, "GetLoan");
                assert_eq!(args.args, ["LOAN_1"]);
            }
            _ => panic!("expected invoke"),
        }
    }

    #[test]
    fn log_defaults() {
        let cli = Cli::try_parse_from(["rel", "--data-dir", "/tmp/rel", "log"]).unwrap();
        assert_eq!(cli.data_dir.as_deref(), Some(std::path::Path::new("/tmp/rel")));
        match cli.command {
            Command::Log(args) => {
                assert_eq!(args.limit, 20);
                assert_eq!(args.from, 1);
            }
            _ => panic!("expected log"),
        }
    }
}
