use anyhow::Result;
use crontick::prelude::*;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    // 2. Read the schedule from the command line, defaulting to every
    //    second so the dev loop has something to show immediately.
    let spec = std::env::args().nth(1).unwrap_or_else(|| "* * * * * *".to_string());

    // 3. Use a seconds-capable parser so sub-minute schedules work here.
    let parser = Parser::new(
        Fields::SECOND
            | Fields::MINUTE
            | Fields::HOUR
            | Fields::DOM
            | Fields::MONTH
            | Fields::DOW
            | Fields::DESCRIPTOR,
    );
    let mut ticker = Ticker::with_parser(&spec, parser)?;

    info!("Ticking on {spec:?}. Press Ctrl+C to stop.");

    // 4. Print ticks until the process is interrupted.
    loop {
        tokio::select! {
            Some(tick) = ticker.ticks.recv() => {
                info!("tick: {}", tick.format("%Y-%m-%d %H:%M:%S"));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ticker.stop().await;
    info!("Ticker stopped.");
    Ok(())
}
