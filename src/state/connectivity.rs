/// Watermark of the last successful fetch
///
/// A fetch failure while connectivity is healthy means the URL itself is at fault;
/// a failure while unhealthy may just mean the spider is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    last_success: Option<i64>,
    window_secs: i64,
}

impl Connectivity {
    /// Creates a watermark with no recorded success
    pub fn new(window_secs: i64) -> Self {
        Self {
            last_success: None,
            window_secs,
        }
    }

    /// Records a successful fetch at `now`
    pub fn record_success(&mut self, now: i64) {
        self.last_success = Some(now);
    }

    /// Epoch of the last successful fetch, if any
    pub fn last_success(&self) -> Option<i64> {
        self.last_success
    }

    /// True when some fetch succeeded within the window before `now`
    pub fn is_healthy(&self, now: i64) -> bool {
        self.last_success
            .map(|at| now - at <= self.window_secs)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unhealthy() {
        assert!(!Connectivity::new(60).is_healthy(1_000));
    }

    #[test]
    fn test_recent_success_is_healthy() {
        let mut connectivity = Connectivity::new(60);
        connectivity.record_success(1_000);
        assert!(connectivity.is_healthy(1_000));
        assert!(connectivity.is_healthy(1_060));
        assert!(!connectivity.is_healthy(1_061));
        assert_eq!(connectivity.last_success(), Some(1_000));
    }

    #[test]
    fn test_window_is_tunable() {
        let mut connectivity = Connectivity::new(600);
        connectivity.record_success(0);
        assert!(connectivity.is_healthy(599));
    }
}
