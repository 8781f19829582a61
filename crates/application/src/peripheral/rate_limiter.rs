use std::collections::VecDeque;

use tokio::time::{Duration, Instant};

/// Sliding-window admission control for outbound frames.
///
/// Within any window of length `window`, at most `max_per_window` sends are
/// admitted. Denied sends are not recorded.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
}

impl RateLimiter {
    /// Limiter admitting `max_per_second` sends in any one-second window
    pub fn new(max_per_second: usize) -> Self {
        Self::with_window(max_per_second, Duration::from_secs(1))
    }

    pub fn with_window(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            admitted: VecDeque::with_capacity(max_per_window),
        }
    }

    /// Admit one send now if the window has room
    pub fn okay_to_send(&mut self) -> bool {
        self.okay_to_send_at(Instant::now())
    }

    pub fn okay_to_send_at(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.admitted.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }

        if self.admitted.len() < self.max_per_window {
            self.admitted.push_back(now);
            true
        } else {
            false
        }
    }

    /// Forget all admissions (new session)
    pub fn reset(&mut self) {
        self.admitted.clear();
    }

    pub fn admitted_in_window(&self) -> usize {
        self.admitted.len()
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }
}
