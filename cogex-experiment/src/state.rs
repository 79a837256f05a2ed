use crate::anchor::AudioAnchor;
use crate::capture::InputCaptureSession;
use crate::config::TrialConfig;
use crate::metronome::{MetronomeEvent, MetronomeGenerator};
use crate::scheduler::{Horizon, TimelineScheduler};
use crate::survey::{Question, QuestionSequence};
use crate::trial::{TrialContext, TrialControl, TrialSignal};
use cogex_core::{
    AudioLoader, CancelToken, DeviceUnavailable, EndReason, EventLog, LogEntry,
    PresentationEvent, RenderAction, TickSink, TrialError, TrialReport, TrialState,
};
use cogex_timing::{ClockKind, ClockSource, ClockValue, JitterWindow};
use std::collections::BTreeMap;
use std::sync::mpsc;

/// One trial: clock-anchored presentation, optional audio, metronome and
/// input capture, ended by whichever end condition comes first.
///
/// The trial is driven by [`Trial::poll`]. Each poll handles, in order,
/// posted control signals, newly captured input, the end of audio playback
/// and the duration deadline. The earliest end condition wins; ties go to
/// the lowest [`EndReason::precedence`]. Presentation events and metronome
/// ticks due strictly before the end instant still fire, everything later
/// is cancelled, and the report is handed to the output sink exactly once.
pub struct Trial<A: RenderAction> {
    config: TrialConfig,
    timeline: Vec<PresentationEvent<A>>,
    questions: QuestionSequence<A>,
    ctx: TrialContext<A>,
    state: TrialState,
    clock: Option<ClockSource>,
    audio: Option<AudioAnchor>,
    group: CancelToken,
    scheduler: TimelineScheduler<A>,
    metronome: Option<MetronomeGenerator>,
    capture: Option<InputCaptureSession>,
    deadline: Option<ClockValue>,
    lateness: JitterWindow,
    log: EventLog,
    annotations: BTreeMap<String, String>,
    discarded_signals: u32,
    signals_tx: mpsc::Sender<TrialSignal>,
    signals: mpsc::Receiver<TrialSignal>,
    end: Option<(EndReason, ClockValue)>,
}

/// Keeps the earlier end condition; equal instants go to the lower precedence.
fn offer(reason: EndReason, at: ClockValue, end: &mut Option<(EndReason, ClockValue)>) {
    let wins = end.is_none_or(|(r, t)| (at, reason.precedence()) < (t, r.precedence()));
    if wins {
        *end = Some((reason, at));
    }
}

/// Ticks with nowhere to go when no speaker is attached.
struct SilentTicks;

impl TickSink for SilentTicks {
    fn tick(&mut self, _beat: u32) {}
}

impl<A: RenderAction> Trial<A> {
    pub fn configure(
        config: TrialConfig,
        timeline: Vec<PresentationEvent<A>>,
        ctx: TrialContext<A>,
    ) -> Self {
        let group = CancelToken::new();
        let (signals_tx, signals) = mpsc::channel();
        log::debug!(
            "configured trial: {} events, stimulus {:?}, duration {:?}",
            timeline.len(),
            config.stimulus,
            config.trial_duration()
        );
        Self {
            config,
            timeline,
            questions: QuestionSequence::default(),
            ctx,
            state: TrialState::Idle,
            clock: None,
            audio: None,
            scheduler: TimelineScheduler::new(group.clone()),
            group,
            metronome: None,
            capture: None,
            deadline: None,
            lateness: JitterWindow::default(),
            log: EventLog::new(),
            annotations: BTreeMap::new(),
            discarded_signals: 0,
            signals_tx,
            signals,
            end: None,
        }
    }

    pub fn with_questions(mut self, questions: Vec<Question<A>>) -> Self {
        self.questions = QuestionSequence::new(questions);
        self
    }

    /// Loads the stimulus, selects the trial clock and arms the trial, or
    /// starts it right away when no start gesture is required.
    ///
    /// On a load error the trial stays idle with nothing scheduled.
    pub async fn prepare<L: AudioLoader>(&mut self, loader: &mut L) -> Result<TrialState, TrialError> {
        if self.state != TrialState::Idle || self.clock.is_some() {
            return Err(TrialError::InvalidState {
                operation: "prepare",
                state: self.state,
            });
        }
        if let Some(path) = self.config.stimulus.clone() {
            match AudioAnchor::load(loader, &path).await {
                Ok(anchor) => self.audio = Some(anchor),
                Err(err) => {
                    log::warn!("trial not started: {err}");
                    return Err(err.into());
                }
            }
        }
        let engine = self.audio.as_ref().and_then(AudioAnchor::engine_clock);
        self.clock = Some(ClockSource::select(engine, self.ctx.wall_clock.clone()));

        if self.config.click_to_start {
            self.transition(TrialState::Armed, self.stamp());
        } else {
            self.enter_running();
        }
        Ok(self.state)
    }

    pub fn control(&self) -> TrialControl {
        TrialControl::new(self.signals_tx.clone())
    }

    /// Starts an armed trial at the next poll, which runs immediately.
    pub fn signal_start(&mut self) -> Result<TrialState, TrialError> {
        self.post("start", TrialSignal::Start)
    }

    pub fn request_stop(&mut self) -> Result<TrialState, TrialError> {
        self.post("stop", TrialSignal::Stop)
    }

    /// Answers the open question.
    pub fn submit_response(&mut self, answer: impl Into<String>) -> Result<TrialState, TrialError> {
        self.post("respond", TrialSignal::Response(answer.into()))
    }

    fn post(&mut self, operation: &'static str, signal: TrialSignal) -> Result<TrialState, TrialError> {
        match self.state {
            TrialState::Idle => {
                return Err(TrialError::InvalidState {
                    operation,
                    state: self.state,
                });
            }
            TrialState::Done => {
                self.discard(&signal);
                return Ok(self.state);
            }
            _ => {}
        }
        // The receiver lives in self, so this cannot fail.
        let _ = self.signals_tx.send(signal);
        Ok(self.poll())
    }

    /// Adds a key/value pair to the report.
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    pub fn clock_kind(&self) -> Option<ClockKind> {
        self.clock.as_ref().map(ClockSource::kind)
    }

    pub fn anchor(&self) -> Option<ClockValue> {
        self.clock.as_ref().and_then(ClockSource::anchor)
    }

    pub fn now(&self) -> Option<ClockValue> {
        self.clock.as_ref().map(ClockSource::now)
    }

    /// Entries recorded so far. Moved into the report when the trial is done.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn end(&self) -> Option<(EndReason, ClockValue)> {
        self.end
    }

    pub fn discarded_signals(&self) -> u32 {
        self.discarded_signals
    }

    /// Earliest instant at which a poll has timed work to do.
    pub fn next_deadline(&self) -> Option<ClockValue> {
        if self.state != TrialState::Running {
            return None;
        }
        [
            self.scheduler.next_fire_at(),
            self.metronome.as_ref().and_then(MetronomeGenerator::next_tick_at),
            self.deadline,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Advances the trial to the clock's current reading.
    pub fn poll(&mut self) -> TrialState {
        let Some(now) = self.now() else {
            return self.state;
        };
        if matches!(self.state, TrialState::Idle | TrialState::Done) {
            return self.state;
        }

        let mut end: Option<(EndReason, ClockValue)> = None;

        let signals: Vec<TrialSignal> = self.signals.try_iter().collect();
        for signal in signals {
            if end.is_some_and(|(r, _)| r == EndReason::StopRequested) {
                self.discard(&signal);
                continue;
            }
            match signal {
                TrialSignal::Start if self.state == TrialState::Armed => self.enter_running(),
                TrialSignal::Start => log::debug!("start ignored while {}", self.state),
                TrialSignal::Stop => offer(EndReason::StopRequested, now, &mut end),
                TrialSignal::Response(answer) if self.state == TrialState::Running => {
                    self.answer_question(answer, now)
                }
                TrialSignal::Response(_) => log::debug!("response ignored while {}", self.state),
            }
        }

        if self.state == TrialState::Running {
            if self.take_key_response() {
                offer(EndReason::Response, now, &mut end);
            }
            if self.audio.as_mut().is_some_and(AudioAnchor::poll_ended) {
                offer(EndReason::AudioEnded, now, &mut end);
            }
            if let Some(deadline) = self.deadline.filter(|d| *d <= now) {
                offer(EndReason::Duration, deadline, &mut end);
            }
        }

        let horizon = match end {
            Some((_, at)) => Horizon::Before(at),
            None => Horizon::Through(now),
        };
        if self.state == TrialState::Running {
            self.fire_due(horizon, now);
        }
        if let Some((reason, at)) = end {
            self.begin_ending(reason, at);
        }
        self.state
    }

    fn discard(&mut self, signal: &TrialSignal) {
        self.discarded_signals += 1;
        log::debug!("discarded late {signal:?} while {}", self.state);
    }

    fn stamp(&self) -> Option<ClockValue> {
        self.clock
            .as_ref()
            .filter(|c| c.is_started() || c.kind() == ClockKind::Wall)
            .map(ClockSource::now)
    }

    fn transition(&mut self, to: TrialState, at: Option<ClockValue>) {
        let from = self.state;
        self.state = to;
        log::info!("trial {from} -> {to}");
        self.log.push(LogEntry::StateChanged { from, to, at });
    }

    fn enter_running(&mut self) {
        let mut onset = None;
        let mut failed = None;
        if let (Some(clock), Some(audio)) = (self.clock.as_mut(), self.audio.as_mut()) {
            match audio.start(clock) {
                Ok(at) => {
                    if self.config.trial_ends_after_audio {
                        audio.on_ended();
                    }
                    onset = Some(at);
                }
                Err(err) => failed = Some(err),
            }
        }
        if let Some(err) = failed {
            // An engine clock that never started playing never advances.
            log::warn!("audio unavailable, running on the wall clock: {err}");
            self.log.push(LogEntry::SubsystemFailed {
                subsystem: "audio".into(),
                reason: err.to_string(),
            });
            self.clock = Some(ClockSource::select(None, self.ctx.wall_clock.clone()));
        }
        let Some(clock) = self.clock.as_mut() else {
            return;
        };
        let anchor = clock.start();
        self.transition(TrialState::Running, Some(anchor));
        if let Some(at) = onset {
            self.log.push(LogEntry::AudioOnset {
                stimulus: self.config.stimulus_name(),
                at,
            });
        }

        self.deadline = self.config.trial_duration().map(|d| anchor + d);
        let timeline = std::mem::take(&mut self.timeline);
        self.scheduler.schedule(anchor, timeline);
        self.start_metronome(anchor);
        self.start_capture();

        if let Some(question) = self.questions.present_next(anchor) {
            self.ctx.renderer.render(&question.action);
        }
    }

    fn start_metronome(&mut self, anchor: ClockValue) {
        let Some((bpm, beats)) = self.config.metronome.as_ref().and_then(|m| m.plan()) else {
            return;
        };
        match MetronomeGenerator::start(bpm, beats, anchor, self.group.clone()) {
            Ok(metronome) => self.metronome = Some(metronome),
            Err(err) => {
                log::warn!("metronome disabled: {err}");
                self.log.push(LogEntry::SubsystemFailed {
                    subsystem: "metronome".into(),
                    reason: err.to_string(),
                });
            }
        }
    }

    fn start_capture(&mut self) {
        let Some(kind) = self.config.capture else {
            return;
        };
        let session = match self.ctx.input.take() {
            Some(source) if source.kind() == kind => InputCaptureSession::start(
                source,
                self.ctx.capture_clock.clone(),
                self.group.clone(),
            ),
            _ => InputCaptureSession::unavailable(DeviceUnavailable::NotConfigured { kind }),
        };
        if let Some(err) = session.unavailable_reason() {
            self.log.push(LogEntry::DeviceUnavailable {
                kind,
                reason: err.to_string(),
            });
        }
        self.capture = Some(session);
    }

    /// Drains captured input. True if a new event counts as a trial-ending response.
    fn take_key_response(&mut self) -> bool {
        let Some(capture) = self.capture.as_mut() else {
            return false;
        };
        let fresh = capture.drain();
        if !self.config.response_ends_trial {
            return false;
        }
        match fresh.iter().find(|e| self.config.choices.accepts(&e.payload)) {
            Some(event) => {
                if let Some(key) = event.payload.key() {
                    self.annotations.insert("response".into(), key.to_string());
                }
                true
            }
            None => false,
        }
    }

    fn answer_question(&mut self, answer: String, now: ClockValue) {
        let Some(answered) = self.questions.answer(answer, now) else {
            log::debug!("response with no open question ignored");
            return;
        };
        log::info!(
            "question {} answered after {:?}",
            answered.question,
            answered.response_time()
        );
        self.log.push(LogEntry::Response {
            question: answered.question,
            response_time_ms: ClockValue::from_duration(answered.response_time()).as_millis_f64(),
            name: answered.name,
            answer: answered.answer,
            presented: answered.presented,
            at: answered.at,
        });
        if let Some(question) = self.questions.present_next(now) {
            self.ctx.renderer.render(&question.action);
        }
    }

    fn fire_due(&mut self, horizon: Horizon, now: ClockValue) {
        let renderer = &mut self.ctx.renderer;
        let entries = &mut self.log;
        let lateness = &mut self.lateness;
        self.scheduler.fire_due(horizon, |timer| {
            renderer.render(timer.action());
            lateness.record(now.saturating_duration_since(timer.fire_at()));
            log::debug!("fired event {} due {}", timer.index(), timer.fire_at());
            entries.push(LogEntry::Presented {
                index: timer.index(),
                label: timer.action().label(),
                scheduled: timer.fire_at(),
                fired: now,
            });
        });

        if let Some(metronome) = self.metronome.as_mut() {
            let mut silent = SilentTicks;
            let ticks: &mut dyn TickSink = match self.ctx.ticks.as_mut() {
                Some(ticks) => &mut **ticks,
                None => &mut silent,
            };
            let entries = &mut self.log;
            metronome.poll(horizon, ticks, |event| match event {
                MetronomeEvent::Tick { beat, at } => {
                    entries.push(LogEntry::MetronomeTick { beat, at })
                }
                MetronomeEvent::Finished { beats, at } => {
                    entries.push(LogEntry::MetronomeFinished { beats, at })
                }
            });
        }
    }

    /// The single termination path. Runs at most once per trial.
    fn begin_ending(&mut self, reason: EndReason, at: ClockValue) {
        if self.state.is_terminating() {
            log::debug!("termination by {reason:?} discarded, trial already {}", self.state);
            return;
        }
        self.transition(TrialState::Ending, Some(at));
        self.end = Some((reason, at));
        self.log.push(LogEntry::Ended { reason, at });

        let pending = self.scheduler.cancel_all();
        if let Some(audio) = self.audio.as_mut() {
            audio.clear_on_ended();
            audio.stop();
        }
        if let Some(metronome) = self.metronome.as_mut() {
            metronome.stop();
        }
        let anchor = self.anchor();
        if let Some(capture) = self.capture.as_mut() {
            capture.stop();
            // Capture stamps are relative to the session start, which is the anchor.
            if let Some(anchor) = anchor {
                let limit = ClockValue::from_duration(at.saturating_duration_since(anchor));
                let late = capture.discard_after(limit);
                if late > 0 {
                    log::debug!("dropped {late} input events captured after the end");
                }
            }
        }
        self.ctx.renderer.clear();

        let late: Vec<TrialSignal> = self.signals.try_iter().collect();
        for signal in &late {
            self.discard(signal);
        }
        log::info!("trial ended by {reason:?} at {at}, {pending} events cancelled");

        self.transition(TrialState::Done, Some(at));
        self.report(reason, at);
    }

    fn report(&mut self, end_reason: EndReason, ended_at: ClockValue) {
        let mut log = std::mem::take(&mut self.log);
        if let Some(capture) = self.capture.as_mut() {
            log.absorb_captured(capture.take_events());
        }
        let report = TrialReport {
            end_reason,
            ended_at,
            anchor: self.anchor(),
            clock: self.clock_kind().unwrap_or(ClockKind::Wall),
            stimulus: self.config.stimulus_name(),
            annotations: std::mem::take(&mut self.annotations),
            timing: self.lateness.stats(),
            discarded_signals: self.discarded_signals,
            log,
        };
        self.ctx.output.report(report);
    }
}
