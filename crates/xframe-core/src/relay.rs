//! Height relay
//!
//! The frame measures its content and reports whole pixels through
//! [`HeightTracker`]; the parent stores the latest report in [`HeightSink`].
//! Reports replace each other, nothing is accumulated.

/// Whole pixels for a measured height; `None` for negative or non-finite
/// input.
pub fn normalize_height(px: f64) -> Option<u32> {
    if !px.is_finite() || px < 0.0 {
        return None;
    }
    if px >= u32::MAX as f64 {
        return Some(u32::MAX);
    }
    Some((px + 0.5) as u32)
}

/// Frame side: decides when a measurement is worth reporting
#[derive(Clone, Debug, Default)]
pub struct HeightTracker {
    last_measured: Option<u32>,
    last_reported: Option<u32>,
}

impl HeightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a measurement. Returns the height to report, if it differs
    /// from the last reported one.
    pub fn measure(&mut self, px: f64) -> Option<u32> {
        let px = normalize_height(px)?;
        self.last_measured = Some(px);
        self.pending()
    }

    /// Measured but not yet reported (e.g. measured before the handshake)
    pub fn pending(&self) -> Option<u32> {
        match self.last_measured {
            Some(px) if self.last_reported != Some(px) => Some(px),
            _ => None,
        }
    }

    pub fn mark_reported(&mut self, px: u32) {
        self.last_reported = Some(px);
    }

    pub fn last_reported(&self) -> Option<u32> {
        self.last_reported
    }
}

/// Parent side: the current height of the iframe element
#[derive(Clone, Debug, Default)]
pub struct HeightSink {
    current: Option<u32>,
}

impl HeightSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored height. Returns the new value when it changed.
    pub fn apply(&mut self, px: f64) -> Result<Option<u32>, f64> {
        let px = normalize_height(px).ok_or(px)?;
        if self.current == Some(px) {
            return Ok(None);
        }
        self.current = Some(px);
        Ok(Some(px))
    }

    pub fn current(&self) -> Option<u32> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_height(0.0), Some(0));
        assert_eq!(normalize_height(99.4), Some(99));
        assert_eq!(normalize_height(99.5), Some(100));
        assert_eq!(normalize_height(-1.0), None);
        assert_eq!(normalize_height(f64::NAN), None);
        assert_eq!(normalize_height(f64::INFINITY), None);
    }

    #[test]
    fn test_tracker_reports_only_changes() {
        let mut tracker = HeightTracker::new();
        assert_eq!(tracker.measure(100.2), Some(100));
        tracker.mark_reported(100);
        assert_eq!(tracker.measure(99.8), None);
        assert_eq!(tracker.measure(240.0), Some(240));
    }

    #[test]
    fn test_tracker_pending_until_reported() {
        let mut tracker = HeightTracker::new();
        tracker.measure(300.0);
        tracker.measure(320.0);
        assert_eq!(tracker.pending(), Some(320));
        tracker.mark_reported(320);
        assert_eq!(tracker.pending(), None);
    }

    #[test]
    fn test_sink_last_value_wins() {
        let mut sink = HeightSink::new();
        for px in [100.0, 250.0, 80.0, 400.0] {
            sink.apply(px).unwrap();
        }
        assert_eq!(sink.current(), Some(400));
        assert_eq!(sink.apply(400.0), Ok(None));
    }

    #[test]
    fn test_sink_rejects_invalid() {
        let mut sink = HeightSink::new();
        sink.apply(50.0).unwrap();
        assert!(sink.apply(-5.0).is_err());
        assert_eq!(sink.current(), Some(50));
    }
}
