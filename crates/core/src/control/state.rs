use crate::config::ControlSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the buy window.
    Idle,
    Buying,
    /// Reserve raised; watching charge level and the clock.
    Holding,
    Resetting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    pub phase: Phase,
    /// Set once per buy window; cleared only by a successful reset.
    pub buying_done_today: bool,
    /// Reserve the battery is buying up to today.
    pub target: i32,
}

impl ControlState {
    pub fn new(min_reserve: u8) -> Self {
        Self {
            phase: Phase::Idle,
            buying_done_today: false,
            target: i32::from(min_reserve),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Buy,
    Reset,
    Hold,
}

/// One decision per wake-up. The buy trigger is checked first and only fires
/// on the BUY_LOW hour while today's buy hasn't happened. Reset fires when the
/// window is over or the battery has reached today's target, whichever comes
/// first. An unknown charge level never triggers a reset on its own.
pub fn decide(
    state: &ControlState,
    settings: &ControlSettings,
    hour: u32,
    percentage_charged: Option<u8>,
) -> Decision {
    if hour == settings.buy_low && !state.buying_done_today {
        return Decision::Buy;
    }

    let window_over = hour >= settings.stop_buy;
    let target_reached = percentage_charged
        .map(|charged| i32::from(charged) >= state.target)
        .unwrap_or(false);
    if window_over || target_reached {
        return Decision::Reset;
    }

    Decision::Hold
}
