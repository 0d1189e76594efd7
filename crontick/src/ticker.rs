//! The ticker controller and its background timer loop.

use chrono::{DateTime, Local};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::config::TickerConfig;
use crate::error::Result;
use crate::parser::Parser;
use crate::schedule::Schedule;

/// A `Ticker` holds a channel that delivers "ticks" of a clock according to
/// a crontab schedule.
///
/// Each live ticker runs exactly one background timer task. The task sleeps
/// until the next scheduled occurrence, sends that occurrence's timestamp on
/// [`ticks`](Ticker::ticks), and rearms itself from the *scheduled* time,
/// so a slow consumer delays delivery but never shifts the schedule.
///
/// The tick channel holds at most one pending tick. While it is full the
/// timer task waits for the consumer instead of queueing further ticks;
/// delivered timestamps are always strictly increasing with nothing skipped
/// or reordered.
///
/// Call [`stop`](Ticker::stop) to release the timer task; dropping the
/// ticker also tears it down, but without waiting for it to finish.
#[derive(Debug)]
pub struct Ticker {
    /// Receiving side of the tick channel. The channel is created once at
    /// construction and survives [`reset`](Ticker::reset): only the
    /// producing side is replaced.
    pub ticks: mpsc::Receiver<DateTime<Local>>,

    tick_tx: mpsc::Sender<DateTime<Local>>,
    cancel_tx: broadcast::Sender<()>,
    timer: Option<JoinHandle<()>>,
    schedule: Schedule,
    parser: Parser,
}

impl Ticker {
    /// Creates a ticker for `spec`, parsed with the standard five-field
    /// crontab parser (minute, hour, day-of-month, month, day-of-week, and
    /// `@`-descriptors).
    ///
    /// Returns [`Error::Spec`](crate::error::Error::Spec) without starting
    /// anything if the specification does not parse. Must be called within
    /// a Tokio runtime.
    pub fn new(spec: &str) -> Result<Self> {
        Self::with_parser(spec, Parser::standard())
    }

    /// Creates a ticker for `spec`, parsed with the provided parser. Use
    /// this to recognize a seconds field or otherwise change the accepted
    /// grammar; the parser is kept and reused by [`reset`](Ticker::reset).
    pub fn with_parser(spec: &str, parser: Parser) -> Result<Self> {
        let schedule = parser.parse(spec)?;
        let (tick_tx, ticks) = mpsc::channel(1);
        let mut ticker = Self {
            ticks,
            tick_tx,
            cancel_tx: broadcast::channel(1).0,
            timer: None,
            schedule,
            parser,
        };
        ticker.spawn_timer();
        Ok(ticker)
    }

    /// Creates a ticker from a deserialized [`TickerConfig`].
    pub fn from_config(config: &TickerConfig) -> Result<Self> {
        Self::with_parser(&config.spec, config.parser())
    }

    /// The schedule currently driving the timer loop.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Turns off the ticker. After `stop` returns the timer task has exited
    /// and no more ticks will be sent; a tick already sitting in the channel
    /// stays readable. Calling `stop` again is a no-op.
    pub async fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.cancel_tx.send(()).ok();
            timer.await.ok();
            debug!("ticker stopped");
        }
    }

    /// Stops the ticker and restarts it against a new specification, parsed
    /// with the parser the ticker was created with.
    ///
    /// The tick channel is reused, so a consumer reading
    /// [`ticks`](Ticker::ticks) keeps working across the reset. If the new
    /// specification does not parse, the ticker is left stopped and the
    /// error is returned.
    pub async fn reset(&mut self, spec: &str) -> Result<()> {
        self.stop().await;
        self.schedule = self.parser.parse(spec)?;
        self.spawn_timer();
        Ok(())
    }

    fn spawn_timer(&mut self) {
        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        self.cancel_tx = cancel_tx;
        self.timer = Some(tokio::spawn(run_timer(
            self.schedule,
            self.tick_tx.clone(),
            cancel_rx,
        )));
    }
}

/// The timer loop: wait for the next occurrence or for cancellation,
/// whichever comes first.
///
/// Cancellation is checked with priority at every suspension point,
/// including while a send is blocked on a full channel: `stop()` must
/// terminate the loop even when the consumer never drains the slot. The
/// receiver side of `cancel` also closes when the ticker is dropped, which
/// wakes the loop the same way.
async fn run_timer(
    schedule: Schedule,
    tick_tx: mpsc::Sender<DateTime<Local>>,
    mut cancel: broadcast::Receiver<()>,
) {
    let Some(mut next) = schedule.next(Local::now()) else {
        // No future occurrence (e.g. an impossible date). Produce nothing,
        // but keep the stop handshake alive.
        cancel.recv().await.ok();
        return;
    };

    loop {
        trace!("timer armed for {}", next);
        tokio::select! {
            biased;
            _ = cancel.recv() => return,
            _ = sleep_until(deadline(next)) => {
                tokio::select! {
                    biased;
                    _ = cancel.recv() => return,
                    sent = tick_tx.send(next) => {
                        // The consumer half only closes if the Ticker
                        // itself is gone.
                        if sent.is_err() {
                            return;
                        }
                        trace!("tick delivered for {}", next);
                    }
                }
                next = match schedule.next(next) {
                    Some(next) => next,
                    None => {
                        cancel.recv().await.ok();
                        return;
                    }
                };
            }
        }
    }
}

/// Converts a wall-clock occurrence into a monotonic deadline. Occurrences
/// already in the past (e.g. delivery was held back by a full channel) fire
/// immediately.
fn deadline(next: DateTime<Local>) -> Instant {
    let wait = (next - Local::now()).to_std().unwrap_or_default();
    Instant::now() + wait
}
