use cogex_core::{CancelToken, PresentationEvent};
use cogex_timing::ClockValue;

/// Upper bound on which deadlines a poll may act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Everything due at or before the instant.
    Through(ClockValue),
    /// Everything strictly before the instant; used when the trial ends there.
    Before(ClockValue),
}

impl Horizon {
    pub fn admits(self, t: ClockValue) -> bool {
        match self {
            Horizon::Through(limit) => t <= limit,
            Horizon::Before(limit) => t < limit,
        }
    }
}

/// A presentation event bound to an absolute fire time.
#[derive(Debug, Clone)]
pub struct ScheduledTimer<A> {
    index: usize,
    fire_at: ClockValue,
    event: PresentationEvent<A>,
    group: CancelToken,
    fired: bool,
}

impl<A> ScheduledTimer<A> {
    /// Position in submission order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn fire_at(&self) -> ClockValue {
        self.fire_at
    }

    pub fn event(&self) -> &PresentationEvent<A> {
        &self.event
    }

    pub fn action(&self) -> &A {
        &self.event.action
    }

    pub fn is_fired(&self) -> bool {
        self.fired
    }

    pub fn is_cancelled(&self) -> bool {
        !self.fired && self.group.is_cancelled()
    }
}

/// Fires presentation events at anchor + offset.
///
/// Timers are kept sorted by fire time with a stable sort, so events with
/// equal offsets fire in the order they were supplied. All timers share one
/// cancellation group.
#[derive(Debug)]
pub struct TimelineScheduler<A> {
    timers: Vec<ScheduledTimer<A>>,
    next: usize,
    group: CancelToken,
}

impl<A> TimelineScheduler<A> {
    pub fn new(group: CancelToken) -> Self {
        Self {
            timers: Vec::new(),
            next: 0,
            group,
        }
    }

    pub fn schedule(
        &mut self,
        anchor: ClockValue,
        events: Vec<PresentationEvent<A>>,
    ) -> &[ScheduledTimer<A>] {
        let base = self.timers.len();
        self.timers
            .extend(events.into_iter().enumerate().map(|(i, event)| ScheduledTimer {
                index: base + i,
                fire_at: anchor + event.offset,
                event,
                group: self.group.clone(),
                fired: false,
            }));
        self.timers[self.next..].sort_by_key(|t| t.fire_at);
        log::debug!(
            "scheduled {} timers against anchor {anchor}",
            self.timers.len() - base
        );
        &self.timers
    }

    /// Fires every pending timer the horizon admits, in order.
    pub fn fire_due(&mut self, horizon: Horizon, mut fire: impl FnMut(&ScheduledTimer<A>)) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.timers.get_mut(self.next) {
            if timer.group.is_cancelled() || !horizon.admits(timer.fire_at) {
                break;
            }
            timer.fired = true;
            self.next += 1;
            fire(&self.timers[self.next - 1]);
            fired += 1;
        }
        fired
    }

    pub fn next_fire_at(&self) -> Option<ClockValue> {
        if self.group.is_cancelled() {
            return None;
        }
        self.timers.get(self.next).map(|t| t.fire_at)
    }

    /// Timers not yet fired.
    pub fn pending(&self) -> usize {
        self.timers.len() - self.next
    }

    /// Cancels the whole group. Returns how many timers will never fire.
    pub fn cancel_all(&mut self) -> usize {
        let pending = self.pending();
        if self.group.cancel() || pending > 0 {
            log::debug!("timeline cancelled with {pending} timers pending");
        }
        pending
    }

    pub fn is_cancelled(&self) -> bool {
        self.group.is_cancelled()
    }

    pub fn timers(&self) -> &[ScheduledTimer<A>] {
        &self.timers
    }
}
