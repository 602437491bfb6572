//! Two-sided countdown ticking at 1 Hz, resynced from server times.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// Formats milliseconds as `hh:mm:ss`, flooring partial seconds.
pub fn format_hms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Both clocks as seen from the local player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockDisplay {
    pub player: String,
    pub opponent: String,
}

/// Remaining time for both sides plus whose clock is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockState {
    pub white_ms: u64,
    pub black_ms: u64,
    pub is_playing_white: bool,
    pub is_player_turn: bool,
}

impl ClockState {
    pub fn new(white_ms: u64, black_ms: u64, is_playing_white: bool, is_player_turn: bool) -> Self {
        Self {
            white_ms,
            black_ms,
            is_playing_white,
            is_player_turn,
        }
    }

    /// Takes one second off the side to move, never below zero.
    pub fn tick(&mut self) {
        let white_to_move = self.is_playing_white == self.is_player_turn;
        let remaining = if white_to_move {
            &mut self.white_ms
        } else {
            &mut self.black_ms
        };
        *remaining = remaining.saturating_sub(TICK.as_millis() as u64);
    }

    pub fn display(&self) -> ClockDisplay {
        let (player, opponent) = if self.is_playing_white {
            (self.white_ms, self.black_ms)
        } else {
            (self.black_ms, self.white_ms)
        };
        ClockDisplay {
            player: format_hms(player),
            opponent: format_hms(opponent),
        }
    }
}

/// Receives the formatted clocks after every tick and every sync.
pub type ClockNotify = Arc<dyn Fn(ClockDisplay) + Send + Sync>;

struct Shared {
    state: ClockState,
    ticker: Option<CancellationToken>,
    generation: u64,
    disposed: bool,
}

impl Shared {
    fn halt(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.generation += 1;
    }
}

/// Live game clock.
///
/// Sync and tick both run under one mutex, so the remaining-time pair is never
/// observed half-updated and a sync never races a pending tick. Ticking needs
/// a tokio runtime.
#[derive(Clone)]
pub struct GameClock {
    shared: Arc<Mutex<Shared>>,
    notify: ClockNotify,
}

impl GameClock {
    pub fn new(notify: impl Fn(ClockDisplay) + Send + Sync + 'static) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: ClockState::default(),
                ticker: None,
                generation: 0,
                disposed: false,
            })),
            notify: Arc::new(notify),
        }
    }

    pub fn state(&self) -> ClockState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.lock().ticker.is_some()
    }

    /// Replaces both times and turn flags, then restarts the tick cadence.
    pub fn sync_with_server_time(
        &self,
        white_ms: u64,
        black_ms: u64,
        is_playing_white: bool,
        is_player_turn: bool,
    ) {
        let mut shared = self.lock();
        if shared.disposed {
            return;
        }
        shared.halt();
        shared.state = ClockState::new(white_ms, black_ms, is_playing_white, is_player_turn);

        let ticker = CancellationToken::new();
        shared.ticker = Some(ticker.clone());
        tokio::spawn(run_ticker(
            Arc::clone(&self.shared),
            Arc::clone(&self.notify),
            shared.generation,
            ticker,
        ));

        (self.notify)(shared.state.display());
    }

    /// Stops ticking and keeps the current values.
    pub fn stop(&self) {
        self.lock().halt();
    }

    /// Stops ticking and zeroes both clocks.
    pub fn reset(&self) {
        let mut shared = self.lock();
        shared.halt();
        shared.state = ClockState::default();
        if !shared.disposed {
            (self.notify)(shared.state.display());
        }
    }

    /// Stops ticking for good; later syncs are ignored. Idempotent.
    pub fn dispose(&self) {
        let mut shared = self.lock();
        shared.halt();
        shared.disposed = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_ticker(
    shared: Arc<Mutex<Shared>>,
    notify: ClockNotify,
    generation: u64,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            _ = interval.tick() => {}
        }

        let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
        // A sync may have replaced this ticker between the tick and the lock.
        if guard.generation != generation {
            return;
        }
        guard.state.tick();
        notify(guard.state.display());
    }
}
