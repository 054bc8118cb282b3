//! Fixed-window request counting.

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Denied; the window resets after this many seconds.
    Limited { retry_after: u64 },
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// A user's current window, as stored in `rate_limits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub request_count: u32,
    pub window_start: i64,
}

impl RateWindow {
    /// Empty window opened at `now`; the first request is counted by
    /// [`RateWindow::admit`] like any other.
    pub fn open(now: i64) -> Self {
        Self {
            request_count: 0,
            window_start: now,
        }
    }

    /// Try to admit a request at `now`.
    ///
    /// An expired window restarts before counting. A full window denies
    /// without counting the denied request.
    pub fn admit(&mut self, now: i64, max_requests: u32, window_secs: u64) -> Admission {
        let window = i64::try_from(window_secs).unwrap_or(i64::MAX);
        let mut resets_at = self.window_start.saturating_add(window);

        if resets_at <= now {
            *self = Self::open(now);
            resets_at = now.saturating_add(window);
        }

        if self.request_count >= max_requests {
            let retry_after = resets_at.saturating_sub(now).max(1) as u64;
            return Admission::Limited { retry_after };
        }

        self.request_count = self.request_count.saturating_add(1);
        Admission::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let mut window = RateWindow::open(1_000);
        for _ in 0..5 {
            assert!(window.admit(1_010, 5, 60).is_allowed());
        }
        assert_eq!(window.request_count, 5);
        assert_eq!(window.admit(1_020, 5, 60), Admission::Limited { retry_after: 40 });
        assert_eq!(window.request_count, 5);
    }

    #[test]
    fn test_resets_after_window() {
        let mut window = RateWindow {
            request_count: 5,
            window_start: 1_000,
        };
        assert!(!window.admit(1_059, 5, 60).is_allowed());
        assert!(window.admit(1_060, 5, 60).is_allowed());
        assert_eq!(
            window,
            RateWindow {
                request_count: 1,
                window_start: 1_060,
            }
        );
    }

    #[test]
    fn test_zero_limit_denies_first_request() {
        let mut window = RateWindow::open(1_000);
        assert_eq!(window.admit(1_000, 0, 60), Admission::Limited { retry_after: 60 });
        assert_eq!(window.request_count, 0);
    }

    #[test]
    fn test_huge_window_never_resets_or_overflows() {
        for window_secs in [u64::MAX, i64::MAX as u64] {
            let mut window = RateWindow::open(1_000);
            assert!(window.admit(1_000, 1, window_secs).is_allowed());
            for now in [1_001, 50_000, i64::MAX] {
                assert!(!window.admit(now, 1, window_secs).is_allowed());
            }
            assert_eq!(window.request_count, 1);
        }
    }
}
