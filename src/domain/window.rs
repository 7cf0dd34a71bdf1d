// Visible time window and scroll addressing for the live view
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Scroll steps per time frame.
pub const SCROLL_STEPS_PER_FRAME: u32 = 30;

pub const LIVE_LOOKAHEAD: TimeDelta = TimeDelta::seconds(1);

pub const TIME_FRAME_PRESETS_SECS: [i64; 6] = [5, 10, 20, 30, 45, 60];

/// Longest accepted time frame; keeps every window computation inside chrono's range.
pub const MAX_TIME_FRAME_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WindowError {
    #[error("time frame must be positive, got {0} ms")]
    InvalidTimeFrame(i64),
    #[error("time frame must not exceed {max} s, got {0} s", max = MAX_TIME_FRAME_SECS)]
    TimeFrameTooLong(i64),
}

/// Builds a time frame from whole seconds without panicking on out-of-range input.
pub fn time_frame_from_secs(secs: i64) -> Result<TimeDelta, WindowError> {
    let time_frame = TimeDelta::try_seconds(secs).ok_or(WindowError::TimeFrameTooLong(secs))?;
    validate(time_frame)?;
    Ok(time_frame)
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub time_frame_secs: f64,
    pub scroll_position: u32,
    pub scroll_maximum: u32,
    pub tracking: bool,
    pub session_start: Option<DateTime<Utc>>,
    pub visible: Option<TimeRange>,
}

#[derive(Debug, Clone)]
pub struct WindowController {
    time_frame: TimeDelta,
    scroll_position: u32,
    scroll_maximum: u32,
    tracking: bool,
    session_start: Option<DateTime<Utc>>,
    last_tick: Option<DateTime<Utc>>,
    visible: Option<TimeRange>,
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

/// Highest scroll position for the given elapsed session time.
pub fn max_scroll_position(elapsed: TimeDelta, time_frame: TimeDelta) -> u32 {
    let frames = (seconds(elapsed) / seconds(time_frame)).floor().max(0.0);
    frames as u32 * SCROLL_STEPS_PER_FRAME
}

pub fn scrolled_range(session_start: DateTime<Utc>, time_frame: TimeDelta, position: u32) -> TimeRange {
    let index = position / SCROLL_STEPS_PER_FRAME;
    let start = session_start + time_frame * index as i32;
    TimeRange {
        start,
        end: start + time_frame,
    }
}

pub fn live_range(now: DateTime<Utc>, time_frame: TimeDelta) -> TimeRange {
    TimeRange {
        start: now - time_frame,
        end: now + LIVE_LOOKAHEAD,
    }
}

impl WindowController {
    pub fn new(time_frame: TimeDelta) -> Result<Self, WindowError> {
        validate(time_frame)?;
        Ok(Self {
            time_frame,
            scroll_position: 0,
            scroll_maximum: 0,
            tracking: true,
            session_start: None,
            last_tick: None,
            visible: None,
        })
    }

    /// Called once per published tick.
    pub fn on_tick(&mut self, now: DateTime<Utc>) {
        let start = *self.session_start.get_or_insert(now);
        self.last_tick = Some(now);
        self.scroll_maximum = max_scroll_position(now - start, self.time_frame);

        if self.tracking {
            self.scroll_position = self.scroll_maximum;
            self.visible = Some(live_range(now, self.time_frame));
        }
    }

    /// User scroll input. Reaching the maximum re-enters live tracking.
    pub fn scroll_to(&mut self, position: u32) {
        let position = position.min(self.scroll_maximum);
        self.scroll_position = position;
        self.tracking = position == self.scroll_maximum;

        self.visible = match (self.session_start, self.last_tick) {
            (Some(_), Some(now)) if self.tracking => Some(live_range(now, self.time_frame)),
            (Some(start), Some(_)) => Some(scrolled_range(start, self.time_frame, position)),
            _ => None,
        };
    }

    pub fn set_time_frame(&mut self, time_frame: TimeDelta) -> Result<(), WindowError> {
        validate(time_frame)?;
        self.time_frame = time_frame;
        if let (Some(start), Some(now)) = (self.session_start, self.last_tick) {
            self.scroll_maximum = max_scroll_position(now - start, time_frame);
            self.visible = Some(live_range(now, time_frame));
        }
        self.scroll_position = self.scroll_maximum;
        self.tracking = true;
        Ok(())
    }

    pub fn track(&mut self) {
        let current = self.time_frame;
        // current frame already passed validation
        let _ = self.set_time_frame(current);
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn time_frame(&self) -> TimeDelta {
        self.time_frame
    }

    pub fn scroll_position(&self) -> u32 {
        self.scroll_position
    }

    pub fn scroll_maximum(&self) -> u32 {
        self.scroll_maximum
    }

    pub fn visible(&self) -> Option<TimeRange> {
        self.visible
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            time_frame_secs: seconds(self.time_frame()),
            scroll_position: self.scroll_position(),
            scroll_maximum: self.scroll_maximum(),
            tracking: self.is_tracking(),
            session_start: self.session_start,
            visible: self.visible,
        }
    }
}

fn validate(time_frame: TimeDelta) -> Result<(), WindowError> {
    if time_frame <= TimeDelta::zero() {
        return Err(WindowError::InvalidTimeFrame(time_frame.num_milliseconds()));
    }
    if time_frame > TimeDelta::seconds(MAX_TIME_FRAME_SECS) {
        return Err(WindowError::TimeFrameTooLong(time_frame.num_seconds()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000)
    }

    fn controller_at(elapsed_secs: i64) -> WindowController {
        let mut window = WindowController::new(TimeDelta::seconds(10)).unwrap();
        window.on_tick(start());
        window.on_tick(start() + TimeDelta::seconds(elapsed_secs));
        window
    }

    #[test]
    fn test_scroll_position_maps_to_window() {
        let range = scrolled_range(start(), TimeDelta::seconds(10), 45);
        assert_eq!(range.start, start() + TimeDelta::seconds(10));
        assert_eq!(range.end, start() + TimeDelta::seconds(20));
    }

    #[test]
    fn test_max_scroll_position() {
        assert_eq!(max_scroll_position(TimeDelta::seconds(95), TimeDelta::seconds(10)), 270);
        assert_eq!(max_scroll_position(TimeDelta::seconds(9), TimeDelta::seconds(10)), 0);
        assert_eq!(max_scroll_position(TimeDelta::zero(), TimeDelta::seconds(5)), 0);
    }

    #[test]
    fn test_live_mode_follows_newest_tick() {
        let window = controller_at(95);
        assert!(window.is_tracking());
        assert_eq!(window.scroll_maximum(), 270);
        assert_eq!(window.scroll_position(), 270);

        let now = start() + TimeDelta::seconds(95);
        let visible = window.visible().unwrap();
        assert_eq!(visible.start, now - TimeDelta::seconds(10));
        assert_eq!(visible.end, now + LIVE_LOOKAHEAD);
    }

    #[test]
    fn test_scrolling_back_leaves_live_mode() {
        let mut window = controller_at(95);
        window.scroll_to(45);
        assert!(!window.is_tracking());
        assert_eq!(window.scroll_position(), 45);
        assert_eq!(window.visible().unwrap().start, start() + TimeDelta::seconds(10));

        // new ticks raise the maximum but leave the scrolled window alone
        window.on_tick(start() + TimeDelta::seconds(120));
        assert_eq!(window.scroll_maximum(), 360);
        assert_eq!(window.scroll_position(), 45);
        assert_eq!(window.visible().unwrap().end, start() + TimeDelta::seconds(20));
    }

    #[test]
    fn test_scrolling_to_maximum_resumes_tracking() {
        let mut window = controller_at(95);
        window.scroll_to(30);
        window.scroll_to(1000);
        assert!(window.is_tracking());
        assert_eq!(window.scroll_position(), 270);
    }

    #[test]
    fn test_changing_time_frame_reenters_live_mode() {
        let mut window = controller_at(95);
        window.scroll_to(0);
        window.set_time_frame(TimeDelta::seconds(5)).unwrap();
        assert!(window.is_tracking());
        assert_eq!(window.scroll_maximum(), 19 * 30);
        assert_eq!(window.scroll_position(), 19 * 30);
    }

    #[test]
    fn test_track_restores_live_mode() {
        let mut window = controller_at(40);
        window.scroll_to(0);
        window.track();
        assert!(window.is_tracking());
        assert_eq!(window.scroll_position(), window.scroll_maximum());
    }

    #[test]
    fn test_rejects_non_positive_time_frame() {
        assert!(WindowController::new(TimeDelta::zero()).is_err());
        let mut window = controller_at(10);
        assert_eq!(
            window.set_time_frame(TimeDelta::seconds(-1)),
            Err(WindowError::InvalidTimeFrame(-1000))
        );
        assert_eq!(window.time_frame(), TimeDelta::seconds(10));
    }

    #[test]
    fn test_oversized_time_frame_is_rejected() {
        assert_eq!(time_frame_from_secs(i64::MAX), Err(WindowError::TimeFrameTooLong(i64::MAX)));
        assert_eq!(
            time_frame_from_secs(10_000_000_000_000),
            Err(WindowError::TimeFrameTooLong(10_000_000_000_000))
        );
        assert_eq!(time_frame_from_secs(0), Err(WindowError::InvalidTimeFrame(0)));
        assert_eq!(time_frame_from_secs(60), Ok(TimeDelta::seconds(60)));

        let mut window = controller_at(10);
        assert_eq!(
            window.set_time_frame(TimeDelta::seconds(MAX_TIME_FRAME_SECS + 1)),
            Err(WindowError::TimeFrameTooLong(MAX_TIME_FRAME_SECS + 1))
        );
        window.set_time_frame(TimeDelta::seconds(MAX_TIME_FRAME_SECS)).unwrap();
        window.on_tick(start() + TimeDelta::seconds(11));
        assert_eq!(window.scroll_maximum(), 0);
    }

    #[test]
    fn test_scroll_before_first_tick_has_no_window() {
        let mut window = WindowController::new(TimeDelta::seconds(10)).unwrap();
        window.scroll_to(10);
        assert_eq!(window.visible(), None);
        assert!(window.is_tracking());
    }
}
