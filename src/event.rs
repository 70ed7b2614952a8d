use std::time::Duration;
use tokio::sync::mpsc;

/// Application events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  /// Periodic tick: time to ask the monitor for a fresh snapshot
  Tick,
  /// Ctrl-C or termination requested
  Shutdown,
}

/// Event handler that produces events from a tick timer and the shutdown signal
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Tick timer; the first tick fires immediately
    let tick_tx = tx.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(tick_rate);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        if tick_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    // Shutdown signal
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        let _ = tx.send(Event::Shutdown);
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
