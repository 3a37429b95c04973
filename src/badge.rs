//! Unread-count badge.
//!
//! `BadgeState` is the pure counter; `spawn_badge_poller` runs it inside a
//! tokio task that polls an [`UnreadCountSource`] on one interval, slower
//! while the client is blurred.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::api::UnreadCountSource;
use crate::config::BadgeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    Focus,
    Blur,
}

#[derive(Debug, Clone)]
pub struct BadgeState {
    count: u64,
    /// No count received yet; the first one never reports an increase
    first: bool,
    focus: FocusState,
    interval: Duration,
    blur_factor: u32,
}

impl BadgeState {
    pub fn new(interval: Duration, blur_factor: u32) -> Self {
        Self {
            count: 0,
            first: true,
            focus: FocusState::Focus,
            interval,
            blur_factor: blur_factor.max(1),
        }
    }

    pub fn from_config(config: &BadgeConfig) -> Self {
        Self::new(config.interval(), config.blur_factor)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn focus(&self) -> FocusState {
        self.focus
    }

    /// Store a polled count. Returns true when it went up since the last poll.
    pub fn update_count(&mut self, count: u64) -> bool {
        let increased = !self.first && count > self.count;
        self.first = false;
        self.count = count;
        increased
    }

    /// Local decrement after the user reads `n` messages.
    pub fn mark_read(&mut self, n: u64) {
        self.count = self.count.saturating_sub(n);
    }

    /// Returns true if the focus actually changed.
    pub fn set_focus(&mut self, focus: FocusState) -> bool {
        let changed = self.focus != focus;
        self.focus = focus;
        changed
    }

    pub fn interval(&self) -> Duration {
        match self.focus {
            FocusState::Focus => self.interval,
            FocusState::Blur => self.interval * self.blur_factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCommand {
    MarkRead(u64),
    Focus(FocusState),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeEvent {
    /// The count went up; the inbox list should refresh.
    Updated { count: u64 },
    /// The count changed without new mail (first poll, unchanged, or read).
    Count(u64),
    Error(String),
}

pub struct BadgeHandle {
    pub cmd_tx: mpsc::Sender<BadgeCommand>,
    pub event_rx: mpsc::Receiver<BadgeEvent>,
}

/// Spawn the poller task. The first poll happens immediately.
pub fn spawn_badge_poller<S>(source: S, state: BadgeState) -> BadgeHandle
where
    S: UnreadCountSource + Send + Sync + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::channel(64);

    tokio::spawn(badge_poller(source, state, cmd_rx, event_tx));

    BadgeHandle { cmd_tx, event_rx }
}

async fn badge_poller<S: UnreadCountSource>(
    source: S,
    mut state: BadgeState,
    mut cmd_rx: mpsc::Receiver<BadgeCommand>,
    event_tx: mpsc::Sender<BadgeEvent>,
) {
    let mut ticker = ticker(Instant::now(), state.interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let event = match source.unread_count().await {
                    Ok(count) => {
                        if state.update_count(count) {
                            tracing::info!("Unread count increased to {}", count);
                            BadgeEvent::Updated { count }
                        } else {
                            BadgeEvent::Count(count)
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Unread count poll failed: {}", e);
                        BadgeEvent::Error(e.to_string())
                    }
                };
                if event_tx.send(event).await.is_err() {
                    tracing::debug!("Badge receiver dropped, stopping poller");
                    return;
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(BadgeCommand::MarkRead(n)) => {
                        state.mark_read(n);
                        event_tx.send(BadgeEvent::Count(state.count())).await.ok();
                    }
                    Some(BadgeCommand::Focus(focus)) => {
                        if state.set_focus(focus) {
                            // Exactly one timer: the old interval is dropped here
                            let period = state.interval();
                            tracing::debug!("Badge focus {:?}, polling every {:?}", focus, period);
                            ticker = ticker_after(Instant::now(), period);
                        }
                    }
                    Some(BadgeCommand::Shutdown) | None => {
                        tracing::debug!("Badge poller shutting down");
                        return;
                    }
                }
            }
        }
    }
}

fn ticker(start: Instant, period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn ticker_after(now: Instant, period: Duration) -> Interval {
    ticker(now + period, period)
}
