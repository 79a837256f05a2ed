use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::sync::Arc;
#[cfg(any(test, feature = "test-support"))]
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A point on a trial's time axis, in nanoseconds since the clock's epoch.
///
/// Serialized as fractional milliseconds so reports read the same regardless
/// of which clock produced them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "f64", from = "f64")]
pub struct ClockValue(u64);

impl ClockValue {
    pub const ZERO: ClockValue = ClockValue(0);

    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    pub fn from_duration(d: Duration) -> Self {
        Self(d.as_nanos() as u64)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: ClockValue) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for ClockValue {
    type Output = ClockValue;

    fn add(self, rhs: Duration) -> ClockValue {
        ClockValue(self.0.saturating_add(rhs.as_nanos() as u64))
    }
}

impl From<ClockValue> for f64 {
    fn from(value: ClockValue) -> f64 {
        value.as_millis_f64()
    }
}

impl From<f64> for ClockValue {
    fn from(ms: f64) -> ClockValue {
        if ms.is_finite() && ms > 0.0 {
            ClockValue((ms * 1_000_000.0).round() as u64)
        } else {
            ClockValue::ZERO
        }
    }
}

impl fmt::Display for ClockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ms", self.as_millis_f64())
    }
}

/// Which engine a clock reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockKind {
    /// Playback clock of the audio engine.
    Audio,
    /// Monotonic system timer.
    Wall,
}

/// A monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> ClockValue;
    fn kind(&self) -> ClockKind;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> ClockValue {
        (**self).now()
    }

    fn kind(&self) -> ClockKind {
        (**self).kind()
    }
}

/// Monotonic system clock, zeroed at construction.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// The instant this clock reads zero at.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Converts a reading back into a system instant.
    pub fn instant_at(&self, value: ClockValue) -> Instant {
        self.origin + Duration::from_nanos(value.as_nanos())
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> ClockValue {
        ClockValue::from_duration(self.origin.elapsed())
    }

    fn kind(&self) -> ClockKind {
        ClockKind::Wall
    }
}

/// The single clock a trial records every presentation timestamp against.
///
/// Selected once at setup; the audio clock wins whenever one is offered.
pub struct ClockSource {
    clock: Arc<dyn Clock>,
    anchor: Option<ClockValue>,
}

impl ClockSource {
    pub fn select(audio: Option<Arc<dyn Clock>>, wall: Arc<dyn Clock>) -> Self {
        let clock = audio.unwrap_or(wall);
        log::debug!("trial clock selected: {:?}", clock.kind());
        Self {
            clock,
            anchor: None,
        }
    }

    pub fn kind(&self) -> ClockKind {
        self.clock.kind()
    }

    /// Records the anchor time. Later calls return the first anchor.
    pub fn start(&mut self) -> ClockValue {
        *self.anchor.get_or_insert_with(|| self.clock.now())
    }

    pub fn anchor(&self) -> Option<ClockValue> {
        self.anchor
    }

    pub fn is_started(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn now(&self) -> ClockValue {
        self.clock.now()
    }
}

impl fmt::Debug for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockSource")
            .field("kind", &self.kind())
            .field("anchor", &self.anchor)
            .finish()
    }
}

/// Hand-advanced clock for deterministic tests. Clones share one reading.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
    kind: ClockKind,
}

#[cfg(any(test, feature = "test-support"))]
impl ManualClock {
    pub fn new() -> Self {
        Self::with_kind(ClockKind::Wall)
    }

    pub fn with_kind(kind: ClockKind) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
            kind,
        }
    }

    pub fn set(&self, value: ClockValue) {
        self.nanos.store(value.as_nanos(), Ordering::SeqCst);
    }

    pub fn set_millis(&self, ms: u64) {
        self.set(ClockValue::from_millis(ms));
    }

    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for ManualClock {
    fn now(&self) -> ClockValue {
        ClockValue::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn kind(&self) -> ClockKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clock_value_converts_through_milliseconds() {
        let v = ClockValue::from_nanos(1_500_000);
        assert_eq!(f64::from(v), 1.5);
        assert_eq!(ClockValue::from(2.25), ClockValue::from_nanos(2_250_000));
        assert_eq!(ClockValue::from(-4.0), ClockValue::ZERO);
        assert_eq!(ClockValue::from(f64::NAN), ClockValue::ZERO);
    }

    #[test]
    fn duration_since_saturates() {
        let a = ClockValue::from_millis(10);
        let b = ClockValue::from_millis(25);
        assert_eq!(b.saturating_duration_since(a), Duration::from_millis(15));
        assert_eq!(a.saturating_duration_since(b), Duration::ZERO);
    }

    #[test]
    fn source_prefers_audio_clock() {
        let audio = ManualClock::with_kind(ClockKind::Audio);
        let wall = ManualClock::new();
        let source = ClockSource::select(
            Some(Arc::new(audio) as Arc<dyn Clock>),
            Arc::new(wall.clone()),
        );
        assert_eq!(source.kind(), ClockKind::Audio);

        let source = ClockSource::select(None, Arc::new(wall));
        assert_eq!(source.kind(), ClockKind::Wall);
    }

    #[test]
    fn source_anchor_is_fixed_after_first_start() {
        let clock = ManualClock::new();
        let mut source = ClockSource::select(None, Arc::new(clock.clone()));
        assert!(!source.is_started());

        clock.set_millis(40);
        assert_eq!(source.start(), ClockValue::from_millis(40));
        clock.set_millis(90);
        assert_eq!(source.start(), ClockValue::from_millis(40));
        assert_eq!(source.anchor(), Some(ClockValue::from_millis(40)));
        assert_eq!(source.now(), ClockValue::from_millis(90));
    }

    #[test]
    fn manual_clock_clones_share_reading() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance_millis(7);
        assert_eq!(other.now(), ClockValue::from_millis(7));
    }

    #[test]
    fn wall_clock_is_monotonic() {
        let clock = WallClock::new();
        let t1 = clock.now();
        let t2 = clock.now();
        assert!(t2 >= t1);
        assert_eq!(clock.kind(), ClockKind::Wall);
    }

    proptest! {
        #[test]
        fn prop_offset_is_recoverable(anchor in 0u64..10_000_000_000, offset in 0u64..600_000_000_000) {
            let start = ClockValue::from_nanos(anchor);
            let end = start + Duration::from_nanos(offset);
            prop_assert_eq!(end.saturating_duration_since(start), Duration::from_nanos(offset));
        }
    }
}
