use std::io::Read;

use anyhow::{bail, Context};
use colored::Colorize;
use rel_engine::{Engine, EngineConfig, Function};
use rel_store::{CommitRecord, WriteOp};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match &cli.command {
        Command::Config(_) => cmd_config(&config, cli.format),
        Command::Invoke(args) => cmd_invoke(&open_engine(&cli, config)?, &cli, args),
        Command::History(args) => cmd_history(&open_engine(&cli, config)?, cli.format, args),
        Command::Log(args) => cmd_log(&open_engine(&cli, config)?, cli.format, args),
        Command::Verify(_) => cmd_verify(&open_engine(&cli, config)?, cli.format),
    }
}

fn open_engine(cli: &Cli, config: EngineConfig) -> anyhow::Result<Engine> {
    debug!(data_dir = ?cli.data_dir, actor = %cli.actor, "opening engine");
    let engine = match &cli.data_dir {
        Some(dir) => Engine::open(dir, config)
            .with_context(|| format!("opening ledger in {}", dir.display()))?,
        None => Engine::in_memory(config)?,
    };
    Ok(engine)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_invoke(engine: &Engine, cli: &Cli, args: &InvokeArgs) -> anyhow::Result<()> {
    let function: Function = args.function.parse()?;
    let mut positional = Vec::with_capacity(args.args.len());
    for arg in &args.args {
        if arg == "-" {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("reading argument from stdin")?;
            positional.push(body);
        } else {
            positional.push(arg.clone());
        }
    }

    match engine.invoke(&cli.actor, function, &positional) {
        Ok(value) => {
            if cli.format == OutputFormat::Text {
                let verb = if function.is_query() { "queried" } else { "committed" };
                println!("{} {} {}", "✓".green().bold(), function.as_str().bold(), verb);
            }
            print_json(&value)
        }
        Err(err) => match cli.format {
            OutputFormat::Json => {
                print_json(&err.to_json())?;
                std::process::exit(1)
            }
            OutputFormat::Text => bail!("{} {}", err.kind().red().bold(), err),
        },
    }
}

fn cmd_history(engine: &Engine, format: OutputFormat, args: &HistoryArgs) -> anyhow::Result<()> {
    let entries = engine.history(&args.entity_id)?;
    if format == OutputFormat::Json {
        return print_json(&entries);
    }

    println!("History of {} ({} entries)", args.entity_id.bold(), entries.len());
    for entry in &entries {
        println!(
            "{}  {}  {}: {} → {}",
            entry.timestamp.dimmed(),
            entry.change_type.as_str().yellow(),
            entry.field_name.bold(),
            display_value(&entry.previous_value),
            display_value(&entry.new_value),
        );
        println!(
            "    by {} in tx {}",
            entry.actor_id.cyan(),
            entry.transaction_id.dimmed()
        );
    }
    Ok(())
}

fn display_value(value: &str) -> String {
    const MAX: usize = 60;
    if value.is_empty() {
        return "∅".dimmed().to_string();
    }
    if value.chars().count() > MAX {
        let cut: String = value.chars().take(MAX).collect();
        return format!("{cut}…");
    }
    value.to_string()
}

fn write_summary(record: &CommitRecord) -> Vec<Value> {
    record
        .writes
        .iter()
        .map(|w| {
            let op = match w.op {
                WriteOp::Put(_) => "put",
                WriteOp::Delete => "delete",
            };
            json!({"key": w.key, "op": op})
        })
        .collect()
}

fn cmd_log(engine: &Engine, format: OutputFormat, args: &LogArgs) -> anyhow::Result<()> {
    let commits = engine.log(args.from, args.limit)?;

    if format == OutputFormat::Json {
        let mut out = Vec::with_capacity(commits.len());
        for record in &commits {
            out.push(json!({
                "seq": record.seq,
                "txId": record.tx_id,
                "committedAtMs": record.committed_at_ms,
                "writes": write_summary(record),
                "events": engine.events_of(record)?,
            }));
        }
        return print_json(&out);
    }

    if commits.is_empty() {
        println!("No commits.");
        return Ok(());
    }
    for record in &commits {
        println!(
            "{}  {}  ({} writes)",
            format!("#{}", record.seq).yellow().bold(),
            record.tx_id.dimmed(),
            record.writes.len()
        );
        for committed in engine.events_of(record)? {
            let event = committed.event;
            println!(
                "  {} {} by {}",
                event.event_type.as_str().green(),
                event.entity_id,
                event.actor_id.cyan()
            );
        }
    }
    Ok(())
}

fn cmd_verify(engine: &Engine, format: OutputFormat) -> anyhow::Result<()> {
    let report = engine.verify()?;
    if format == OutputFormat::Json {
        print_json(&report)?;
    } else if report.is_valid() {
        println!("{} History streams verified", "✓".green().bold());
        println!("  Entities: {}", report.entities.to_string().bold());
        println!("  Entries: {}", report.entries.to_string().bold());
    } else {
        println!("{} {} violations", "✗".red().bold(), report.violations.len());
        for violation in &report.violations {
            println!(
                "  {:?} {} {}: {}",
                violation.kind,
                violation.entity_id.bold(),
                violation.history_id.dimmed(),
                violation.description
            );
        }
    }
    if !report.is_valid() {
        bail!("audit found {} violations", report.violations.len());
    }
    Ok(())
}

fn cmd_config(config: &EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Text => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
