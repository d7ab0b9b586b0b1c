use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::debug;

use token_guard::budget::{GuardOptions, PricingTable};
use token_guard::config::{self, FileConfig};
use token_guard::logging;
use token_guard::report::terminal::{self, Palette};
use token_guard::report::{write_report, TerminalReporter};
use token_guard::supervisor::{RunOutcome, Supervisor};

const AFTER_HELP: &str = "\
EXAMPLES:
  token-guard -- claude \"refactor the auth module\"
  token-guard -b 50000 -- aider --message \"add tests\"
  token-guard -c 0.50 -- claude \"explain this codebase\"
  token-guard -b 100000 -w 50 -o report.json -- claude \"review PR\"

CONFIGURATION:
  Create ~/.token-guard.json for persistent settings:
  {
    \"defaultBudget\": 50000,
    \"warnPercent\": 80,
    \"models\": {
      \"custom-model\": { \"input\": 5.00, \"output\": 15.00 }
    }
  }";

/// Monitor and limit token usage for AI coding assistants
#[derive(Parser, Debug)]
#[command(name = "token-guard", version, about, after_help = AFTER_HELP)]
struct Cli {
    /// Maximum tokens allowed (default: unlimited)
    #[arg(short, long, value_name = "TOKENS")]
    budget: Option<u64>,

    /// Maximum cost in USD (default: unlimited)
    #[arg(short, long, value_name = "USD")]
    cost_limit: Option<f64>,

    /// Model for pricing (default: auto-detect)
    #[arg(short, long, value_name = "NAME")]
    model: Option<String>,

    /// Warn at percentage of budget (default: 80)
    #[arg(short, long, value_name = "PERCENT")]
    warn: Option<f64>,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Save usage report to JSON file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Command to run, with its arguments
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Cli {
    /// Flags win over config-file defaults.
    fn options(&self, config: &FileConfig) -> GuardOptions {
        GuardOptions {
            budget: self.budget.or(config.default_budget),
            cost_limit: self.cost_limit.or(config.default_cost_limit),
            model: self.model.clone(),
            warn_percent: self.warn.unwrap_or(config.warn_percent),
            quiet: self.quiet,
            output: self.output.clone(),
        }
    }
}

fn main() {
    if std::env::args_os().len() <= 1 {
        let _ = Cli::command().print_help();
        println!();
        std::process::exit(0);
    }

    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("Warning: {e}");
    }

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            terminal::error(&format!("{e:#}"), Palette::for_stderr());
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    if cli.command.is_empty() {
        anyhow::bail!("No command specified\nUsage: token-guard [options] -- <command>");
    }

    let file_config = config::load_config();
    let options = cli.options(&file_config);
    let table = PricingTable::builtin().with_overrides(&file_config.models);
    debug!(?options, "resolved options");

    let reporter = Arc::new(TerminalReporter::new(&options));
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let outcome = runtime.block_on(async {
        Supervisor::new(cli.command, options.clone(), &table, reporter.clone())?
            .run()
            .await
    })?;

    if let RunOutcome::Exited(report) = &outcome {
        reporter.final_report(&report.stats);

        if let Some(path) = &options.output {
            if let Err(e) = write_report(path, report) {
                debug!(path = %path.display(), error = %e, "report not saved");
                reporter.error(&format!("Failed to save report: {e}"));
            }
        }
    }

    Ok(outcome.exit_code())
}
