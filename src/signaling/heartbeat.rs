use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval_at};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// What the connection should do on a heartbeat tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Send a WebSocket ping
    Send,
    /// The previous ping was never answered
    TimedOut,
}

/// Two-state liveness machine: either the last probe was acknowledged or it
/// is still outstanding. One unanswered cycle is fatal.
#[derive(Debug)]
pub struct Heartbeat {
    awaiting_ack: bool,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            awaiting_ack: false,
        }
    }

    pub fn tick(&mut self) -> Probe {
        if self.awaiting_ack {
            return Probe::TimedOut;
        }
        self.awaiting_ack = true;
        Probe::Send
    }

    /// Pong received. Does not reschedule the timer.
    pub fn acknowledge(&mut self) {
        self.awaiting_ack = false;
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }
}

/// Timer for one connection. The first tick fires one full period after
/// creation; dropping the interval cancels it.
pub fn heartbeat_timer(period: Duration) -> Interval {
    let mut timer = interval_at(tokio::time::Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_sends_probe() {
        let mut hb = Heartbeat::new();
        assert_eq!(hb.tick(), Probe::Send);
        assert!(hb.is_awaiting_ack());
    }

    #[test]
    fn unanswered_probe_times_out_on_next_tick() {
        let mut hb = Heartbeat::new();
        assert_eq!(hb.tick(), Probe::Send);
        assert_eq!(hb.tick(), Probe::TimedOut);
    }

    #[test]
    fn acknowledged_probe_starts_fresh_cycle() {
        let mut hb = Heartbeat::new();
        for _ in 0..5 {
            assert_eq!(hb.tick(), Probe::Send);
            hb.acknowledge();
        }
        assert!(!hb.is_awaiting_ack());
    }

    #[test]
    fn early_ack_does_not_skip_a_probe() {
        let mut hb = Heartbeat::new();
        hb.acknowledge();
        assert_eq!(hb.tick(), Probe::Send);
        assert_eq!(hb.tick(), Probe::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_waits_one_period_before_first_tick() {
        let start = tokio::time::Instant::now();
        let mut timer = heartbeat_timer(Duration::from_secs(30));
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }
}
