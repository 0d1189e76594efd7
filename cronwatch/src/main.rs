use anyhow::{Context, Result};
use colored::Colorize;
use crontick::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Interactive commands accepted on stdin while the watcher runs.
const COMMANDS: &str = "commands: reset <spec> | stop | quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .init();

    // Configuration comes from cronwatch.toml (if present), CRONWATCH_*
    // environment variables, and finally a spec argument on the command
    // line, each layer overriding the previous one.
    let settings = config::Config::builder()
        .set_default("spec", "* * * * * *")?
        .set_default(
            "fields",
            vec!["second", "minute", "hour", "dom", "month", "dow", "descriptor"],
        )?
        .add_source(config::File::with_name("cronwatch").required(false))
        .add_source(config::Environment::with_prefix("CRONWATCH"))
        .build()
        .context("failed to load cronwatch configuration")?;
    let mut watch_config: TickerConfig = settings
        .try_deserialize()
        .context("invalid cronwatch configuration")?;
    if let Some(spec) = std::env::args().nth(1) {
        watch_config.spec = spec;
    }

    let mut ticker = Ticker::from_config(&watch_config)?;
    println!(
        "{} v{} {} {}",
        "cronwatch".green().bold(),
        crontick::VERSION,
        "watching".green(),
        watch_config.spec.yellow()
    );
    println!("{}", COMMANDS.dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(tick) = ticker.ticks.recv() => {
                println!(
                    "{} {}",
                    "tick".cyan().bold(),
                    tick.format("%Y-%m-%d %H:%M:%S %:z")
                );
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !handle_command(&mut ticker, line.trim()).await {
                    break;
                }
            }
        }
    }

    ticker.stop().await;
    info!("cronwatch exiting");
    Ok(())
}

/// Applies one command line to the ticker. Returns `false` to exit.
async fn handle_command(ticker: &mut Ticker, line: &str) -> bool {
    match line {
        "" => {}
        "quit" | "exit" => return false,
        "stop" => {
            ticker.stop().await;
            println!("{}", "stopped".red());
        }
        _ => {
            if let Some(spec) = line.strip_prefix("reset ") {
                match ticker.reset(spec).await {
                    Ok(()) => println!("{} {}", "watching".green(), spec.yellow()),
                    Err(e) => println!("{} {e}", "error:".red().bold()),
                }
            } else {
                println!("{} {line:?} ({})", "unknown command".red(), COMMANDS.dimmed());
            }
        }
    }
    true
}
