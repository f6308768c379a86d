#![forbid(unsafe_code)]

//! Playback state machine.
//!
//! ```text
//! Idle ──start──▶ Speaking ◀──resume── Paused
//!                  │   └────pause─────▶  │
//!                  └─end─▶ Ended ──grace──▶ Idle
//! any ──stop──▶ Idle
//! ```
//!
//! The controller owns the only [`PlaybackSession`], the speech engine and
//! the highlight surface. It is host-driven: engine callbacks come in through
//! [`PlaybackController::handle_event`] and time advances only through
//! [`PlaybackController::tick`], so every transition is reproducible in
//! tests.

use std::time::Duration;

use readalong_dom::geometry::LayoutOracle;
use readalong_dom::snapshot::DomSnapshot;
use readalong_text::locate::locate_words;
use readalong_text::segment::SpeechText;
use tracing::{debug, info, trace, warn};

use crate::config::{PlaybackConfig, Preferences};
use crate::engine::{EngineError, EngineEvent, Generation, SpeechEngine, UtteranceRequest};
use crate::session::{PlaybackSession, PlaybackState};
use crate::sync::{HighlightOutcome, HighlightSurface, refresh_highlight, word_index_at};
use crate::voice::{Voice, default_voice, resolve_voice};

/// Why a session could not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    /// Neither a selection nor the page produced any words.
    NoContent,
    /// The engine refused the request.
    Engine(EngineError),
}

impl core::fmt::Display for StartError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoContent => write!(f, "No text found to read."),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoContent => None,
            Self::Engine(err) => Some(err),
        }
    }
}

impl From<EngineError> for StartError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

/// What handling one engine event did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventOutcome {
    /// The event belongs to a cancelled or superseded request.
    Stale,
    /// The offset did not fall inside any word.
    Unmapped,
    /// The current word changed.
    Moved {
        index: usize,
        highlight: HighlightOutcome,
    },
    /// Natural end; the grace delay is running.
    Ended,
    /// The engine failed; the session was torn down.
    Failed,
}

/// Owner of the playback session.
#[derive(Debug)]
pub struct PlaybackController<E, S> {
    engine: E,
    surface: S,
    config: PlaybackConfig,
    session: PlaybackSession,
    voices: Vec<Voice>,
    next_generation: Generation,
    now: Duration,
    hide_at: Option<Duration>,
}

impl<E: SpeechEngine, S: HighlightSurface> PlaybackController<E, S> {
    /// Create an idle controller and read the engine's voice catalog.
    pub fn new(engine: E, surface: S, config: PlaybackConfig) -> Self {
        let mut controller = Self {
            engine,
            surface,
            config,
            session: PlaybackSession::new(),
            voices: Vec::new(),
            next_generation: Generation(1),
            now: Duration::ZERO,
            hide_at: None,
        };
        controller.refresh_voices();
        controller
    }

    #[must_use]
    pub const fn session(&self) -> &PlaybackSession {
        &self.session
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.session.state()
    }

    /// `true` only while speaking; a paused session is not playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Speaking
    }

    #[must_use]
    pub const fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    #[must_use]
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Re-read the voice catalog. Picks a default voice if none is selected.
    pub fn refresh_voices(&mut self) {
        self.voices = self.engine.voices();
        if self.session.voice.is_none()
            && let Some(voice) = default_voice(&self.voices)
        {
            debug!(voice = %voice.name, "selected default voice");
            self.session.voice = Some(voice.to_ref());
        }
    }

    /// Adopt stored preferences without touching a running utterance.
    pub fn apply_preferences(&mut self, prefs: &Preferences) {
        if let Some(rate) = self.config.sanitize_rate(prefs.speech_rate) {
            self.session.rate = rate;
        }
        if let Some(pitch) = self.config.sanitize_pitch(prefs.speech_pitch) {
            self.session.pitch = pitch;
        }
        if let Some(name) = prefs.voice_name.as_deref() {
            self.select_voice(name);
        }
    }

    /// Current rate, pitch and voice as storable preferences.
    #[must_use]
    pub fn preferences(&self, autoplay: bool) -> Preferences {
        Preferences {
            voice_name: self.session.voice.as_ref().map(|v| v.name.clone()),
            speech_rate: self.session.rate,
            speech_pitch: self.session.pitch,
            autoplay,
        }
    }

    /// Start reading `text`, stopping any session first.
    ///
    /// Words are located on `page` once, up front.
    pub fn start(
        &mut self,
        text: &str,
        page: &DomSnapshot,
        layout: &impl LayoutOracle,
    ) -> Result<(), StartError> {
        if self.state() != PlaybackState::Idle {
            self.stop();
        }
        let speech = SpeechText::segment(text);
        if speech.is_empty() {
            warn!("no readable text, not starting");
            return Err(StartError::NoContent);
        }
        let positions = locate_words(speech.words(), page, layout);
        let generation = self.bump_generation();
        info!(
            %generation,
            words = speech.len(),
            located = positions.located(),
            "starting session"
        );
        let spoken = speech.text().to_owned();
        self.session.begin(text.to_owned(), speech, positions, generation);
        self.surface.set_controls_visible(true);
        refresh_highlight(&mut self.surface, self.session.positions(), 0);
        self.speak(generation, spoken).map_err(StartError::from)
    }

    /// `Speaking → Paused`. Returns whether the transition happened.
    pub fn pause(&mut self) -> bool {
        if self.state() != PlaybackState::Speaking {
            return false;
        }
        self.engine.pause();
        self.session.set_state(PlaybackState::Paused);
        debug!(generation = %self.session.generation(), "paused");
        true
    }

    /// `Paused → Speaking`. Returns whether the transition happened.
    pub fn resume(&mut self) -> bool {
        if self.state() != PlaybackState::Paused {
            return false;
        }
        self.engine.resume();
        self.session.set_state(PlaybackState::Speaking);
        debug!(generation = %self.session.generation(), "resumed");
        true
    }

    /// Pause when speaking, otherwise resume. Returns whether the state
    /// changed.
    pub fn toggle(&mut self) -> bool {
        if self.state() == PlaybackState::Speaking {
            self.pause()
        } else {
            self.resume()
        }
    }

    /// Cancel everything and return to `Idle`. Valid from any state.
    pub fn stop(&mut self) {
        let was = self.state();
        self.engine.cancel();
        self.teardown();
        if was != PlaybackState::Idle {
            info!(generation = %self.session.generation(), from = ?was, "stopped");
        }
    }

    /// Change the rate; a speaking session restarts at the current word.
    ///
    /// Returns `false` for non-finite values, and when the engine refused
    /// the restarted utterance and the session was torn down.
    pub fn set_rate(&mut self, rate: f32) -> bool {
        let Some(rate) = self.config.sanitize_rate(rate) else {
            return false;
        };
        self.session.rate = rate;
        if self.state() == PlaybackState::Speaking {
            return self.restart("rate");
        }
        true
    }

    /// Change the pitch, live if the engine can, else by restarting.
    ///
    /// Returns `false` under the same conditions as [`Self::set_rate`].
    pub fn set_pitch(&mut self, pitch: f32) -> bool {
        let Some(pitch) = self.config.sanitize_pitch(pitch) else {
            return false;
        };
        self.session.pitch = pitch;
        if self.state() == PlaybackState::Speaking && !self.engine.apply_live_pitch(pitch) {
            return self.restart("pitch");
        }
        true
    }

    /// Select a voice by exact name. A miss keeps the previous voice.
    ///
    /// The new voice is used from the next utterance on; a running one keeps
    /// its voice.
    pub fn set_voice(&mut self, name: &str) -> bool {
        self.select_voice(name)
    }

    /// Feed one engine callback through the state machine.
    pub fn handle_event(&mut self, event: EngineEvent) -> EventOutcome {
        let live = self.session.generation();
        if event.generation() != live || !self.state().is_active() {
            trace!(event = %event.generation(), %live, "discarding stale engine event");
            return EventOutcome::Stale;
        }
        match event {
            EngineEvent::Boundary(boundary) => {
                let offset = self.session.base_offset().saturating_add(boundary.offset);
                let Some(index) = word_index_at(self.session.words(), offset) else {
                    debug!(offset, "boundary outside every word");
                    return EventOutcome::Unmapped;
                };
                self.session.set_current_index(index);
                let highlight =
                    refresh_highlight(&mut self.surface, self.session.positions(), index);
                debug!(offset, index, ?highlight, "boundary");
                EventOutcome::Moved { index, highlight }
            }
            EngineEvent::End { .. } => {
                self.session.set_state(PlaybackState::Ended);
                self.hide_at = Some(self.now.saturating_add(self.config.end_grace));
                info!(generation = %live, "session ended");
                EventOutcome::Ended
            }
            EngineEvent::Error { message, .. } => {
                warn!(generation = %live, %message, "speech engine error");
                self.teardown();
                EventOutcome::Failed
            }
        }
    }

    /// Advance the host clock; finishes the end grace delay once it elapses.
    ///
    /// Returns `true` when the session went idle on this tick.
    pub fn tick(&mut self, now: Duration) -> bool {
        self.now = now;
        match self.hide_at {
            Some(deadline) if now >= deadline && self.state() == PlaybackState::Ended => {
                self.teardown();
                debug!("end grace elapsed");
                true
            }
            _ => false,
        }
    }

    fn select_voice(&mut self, name: &str) -> bool {
        if resolve_voice(&self.voices, name).is_none() {
            self.voices = self.engine.voices();
        }
        match resolve_voice(&self.voices, name) {
            Some(voice) => {
                self.session.voice = Some(voice.to_ref());
                true
            }
            None => {
                debug!(name, "voice not in catalog, keeping previous");
                false
            }
        }
    }

    fn bump_generation(&mut self) -> Generation {
        let generation = self.next_generation;
        self.next_generation = generation.next();
        generation
    }

    fn speak(&mut self, generation: Generation, text: String) -> Result<(), EngineError> {
        let request = UtteranceRequest {
            generation,
            text,
            rate: self.session.rate,
            pitch: self.session.pitch,
            voice: self.session.voice.clone(),
        };
        if let Err(err) = self.engine.speak(request) {
            warn!(%generation, error = %err, "engine refused utterance");
            self.teardown();
            return Err(err);
        }
        Ok(())
    }

    /// Returns `false` when the session did not survive the restart.
    fn restart(&mut self, reason: &'static str) -> bool {
        self.engine.cancel();
        let generation = self.bump_generation();
        let Some(text) = self.session.restart_from_current(generation) else {
            return false;
        };
        info!(
            %generation,
            reason,
            from_word = self.session.current_index(),
            "restarting utterance"
        );
        self.speak(generation, text).is_ok()
    }

    fn teardown(&mut self) {
        self.hide_at = None;
        self.surface.hide_highlight();
        self.surface.set_controls_visible(false);
        self.session.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BoundaryEvent;
    use readalong_dom::geometry::{FixedAdvanceLayout, Rect, Viewport};
    use readalong_dom::node::ElementData;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Speak(Generation, String, f32, f32),
        Pause,
        Resume,
        Cancel,
        LivePitch(f32),
    }

    #[derive(Debug, Default)]
    struct FakeEngine {
        calls: Vec<Call>,
        voices: Vec<Voice>,
        live_pitch: bool,
        refuse: bool,
    }

    impl FakeEngine {
        fn speaks(&self) -> Vec<(Generation, String)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Speak(g, t, ..) => Some((*g, t.clone())),
                    _ => None,
                })
                .collect()
        }
    }

    impl SpeechEngine for FakeEngine {
        fn speak(&mut self, request: UtteranceRequest) -> Result<(), EngineError> {
            if self.refuse {
                return Err(EngineError::Rejected("not-allowed".into()));
            }
            self.calls.push(Call::Speak(
                request.generation,
                request.text,
                request.rate,
                request.pitch,
            ));
            Ok(())
        }
        fn pause(&mut self) {
            self.calls.push(Call::Pause);
        }
        fn resume(&mut self) {
            self.calls.push(Call::Resume);
        }
        fn cancel(&mut self) {
            self.calls.push(Call::Cancel);
        }
        fn voices(&self) -> Vec<Voice> {
            self.voices.clone()
        }
        fn apply_live_pitch(&mut self, pitch: f32) -> bool {
            if self.live_pitch {
                self.calls.push(Call::LivePitch(pitch));
            }
            self.live_pitch
        }
    }

    #[derive(Debug, Default)]
    struct FakeSurface {
        highlight: Option<Rect>,
        controls: bool,
        scrolls: Vec<f64>,
    }

    impl HighlightSurface for FakeSurface {
        fn show_highlight(&mut self, rect: Rect) {
            self.highlight = Some(rect);
        }
        fn hide_highlight(&mut self) {
            self.highlight = None;
        }
        fn viewport(&self) -> Viewport {
            Viewport::new(0.0, 0.0, 1024.0, 768.0)
        }
        fn scroll_to(&mut self, top: f64) {
            self.scrolls.push(top);
        }
        fn set_controls_visible(&mut self, visible: bool) {
            self.controls = visible;
        }
    }

    type Controller = PlaybackController<FakeEngine, FakeSurface>;

    fn page(text: &str) -> (DomSnapshot, FixedAdvanceLayout) {
        let mut b = DomSnapshot::builder();
        b.open(ElementData::new("p"));
        let node = b.text(text);
        b.close();
        let mut layout = FixedAdvanceLayout::new();
        layout.place(node, 0.0, 10.0);
        (b.finish(), layout)
    }

    fn controller() -> Controller {
        let engine = FakeEngine {
            voices: vec![Voice::new("Anna", "de-DE"), Voice::new("Samantha", "en-US")],
            ..FakeEngine::default()
        };
        PlaybackController::new(engine, FakeSurface::default(), PlaybackConfig::default())
    }

    fn started(text: &str) -> Controller {
        let mut c = controller();
        let (snapshot, layout) = page(text);
        c.start(text, &snapshot, &layout).expect("start succeeds");
        c
    }

    fn boundary(generation: Generation, offset: u32) -> EngineEvent {
        EngineEvent::Boundary(BoundaryEvent {
            generation,
            offset,
            length: None,
        })
    }

    #[test]
    fn start_speaks_whole_text() {
        let c = started("alpha beta gamma");
        assert_eq!(c.state(), PlaybackState::Speaking);
        assert!(c.surface().controls);
        assert_eq!(
            c.engine().speaks(),
            vec![(Generation(1), "alpha beta gamma".to_owned())]
        );
        assert_eq!(c.session().positions().located(), 3);
    }

    #[test]
    fn start_highlights_first_word() {
        let c = started("alpha beta gamma");
        assert_eq!(c.session().current_index(), 0);
        assert_eq!(c.surface().highlight, Some(Rect::new(10.0, 0.0, 40.0, 16.0)));
    }

    #[test]
    fn default_voice_is_english() {
        let c = controller();
        assert_eq!(c.session().voice.as_ref().map(|v| v.name.as_str()), Some("Samantha"));
    }

    #[test]
    fn empty_text_is_no_content() {
        let mut c = controller();
        let (snapshot, layout) = page("");
        assert_eq!(c.start("  \n ", &snapshot, &layout), Err(StartError::NoContent));
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(c.engine().speaks().is_empty());
    }

    #[test]
    fn boundary_events_move_highlight() {
        let mut c = started("alpha beta gamma");
        let g = c.session().generation();
        for (offset, expected) in [(0, 0), (6, 1), (11, 2)] {
            let outcome = c.handle_event(boundary(g, offset));
            assert!(
                matches!(outcome, EventOutcome::Moved { index, .. } if index == expected),
                "offset {offset} gave {outcome:?}"
            );
            assert_eq!(c.session().current_index(), expected);
        }
        assert_eq!(c.surface().highlight, Some(Rect::new(10.0, 88.0, 40.0, 16.0)));
        assert_eq!(c.handle_event(boundary(g, 99)), EventOutcome::Unmapped);
        assert_eq!(c.session().current_index(), 2);
    }

    #[test]
    fn start_while_speaking_replaces_session() {
        let mut c = started("alpha beta gamma");
        let first = c.session().generation();
        c.handle_event(boundary(first, 11));
        let (snapshot, layout) = page("delta epsilon");
        c.start("delta epsilon", &snapshot, &layout).expect("restart");
        assert_eq!(c.state(), PlaybackState::Speaking);
        assert_eq!(c.session().current_index(), 0);
        assert_eq!(c.surface().highlight, Some(Rect::new(10.0, 0.0, 40.0, 16.0)));
        assert_ne!(c.session().generation(), first);
        assert!(c.engine().calls.contains(&Call::Cancel));
        assert_eq!(c.handle_event(boundary(first, 0)), EventOutcome::Stale);
    }

    #[test]
    fn start_while_paused_replaces_session() {
        let mut c = started("alpha beta");
        assert!(c.pause());
        let (snapshot, layout) = page("gamma");
        c.start("gamma", &snapshot, &layout).expect("restart");
        assert_eq!(c.state(), PlaybackState::Speaking);
        assert_eq!(c.session().words().len(), 1);
        let tail: Vec<_> = c.engine().calls.iter().skip(1).cloned().collect();
        assert_eq!(
            tail,
            vec![
                Call::Pause,
                Call::Cancel,
                Call::Speak(Generation(2), "gamma".into(), 1.0, 1.0),
            ]
        );
    }

    #[test]
    fn events_after_stop_are_discarded() {
        let mut c = started("alpha beta gamma");
        let g = c.session().generation();
        c.handle_event(boundary(g, 6));
        c.stop();
        assert_eq!(c.state(), PlaybackState::Idle);
        assert_eq!(c.surface().highlight, None);
        assert!(!c.surface().controls);
        assert_eq!(c.handle_event(boundary(g, 11)), EventOutcome::Stale);
        assert_eq!(c.handle_event(EngineEvent::End { generation: g }), EventOutcome::Stale);
        assert_eq!(c.session().current_index(), 0);
        assert_eq!(c.surface().highlight, None);
        assert!(!c.surface().controls);
    }

    #[test]
    fn pause_and_resume_are_guarded() {
        let mut c = controller();
        assert!(!c.pause());
        assert!(!c.resume());
        let mut c = started("one two");
        assert!(!c.resume());
        assert!(c.pause());
        assert!(!c.pause());
        assert_eq!(c.state(), PlaybackState::Paused);
        assert!(c.resume());
        assert_eq!(c.state(), PlaybackState::Speaking);
        let tail: Vec<_> = c.engine().calls.iter().skip(1).cloned().collect();
        assert_eq!(tail, vec![Call::Pause, Call::Resume]);
    }

    #[test]
    fn toggle_flips_between_speaking_and_paused() {
        let mut c = controller();
        assert!(!c.toggle());
        let mut c = started("one two");
        assert!(c.toggle());
        assert_eq!(c.state(), PlaybackState::Paused);
        assert!(c.toggle());
        assert_eq!(c.state(), PlaybackState::Speaking);
        let g = c.session().generation();
        c.handle_event(EngineEvent::End { generation: g });
        assert!(!c.toggle());
        assert_eq!(c.state(), PlaybackState::Ended);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut c = controller();
        c.stop();
        c.stop();
        assert_eq!(c.state(), PlaybackState::Idle);
    }

    #[test]
    fn rate_change_restarts_from_current_word() {
        let mut c = started("alpha beta gamma");
        let g = c.session().generation();
        c.handle_event(boundary(g, 6));
        assert!(c.set_rate(1.5));
        let speaks = c.engine().speaks();
        assert_eq!(speaks.len(), 2);
        let (restart_gen, text) = &speaks[1];
        assert_eq!(text, "beta gamma");
        assert_eq!(c.session().base_offset(), 6);
        // Offsets of the restarted utterance are relative to its own text.
        let outcome = c.handle_event(boundary(*restart_gen, 5));
        assert!(matches!(outcome, EventOutcome::Moved { index: 2, .. }));
        assert_eq!(c.handle_event(boundary(g, 0)), EventOutcome::Stale);
    }

    #[test]
    fn refused_restart_reports_teardown() {
        let mut c = started("alpha beta gamma");
        c.engine_mut().refuse = true;
        assert!(!c.set_rate(1.5));
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(!c.surface().controls);
        assert_eq!(c.session().rate, 1.5);
    }

    #[test]
    fn rate_change_while_idle_only_stores() {
        let mut c = controller();
        assert!(c.set_rate(20.0));
        assert_eq!(c.session().rate, 10.0);
        assert!(!c.set_rate(f32::NAN));
        assert!(c.engine().speaks().is_empty());
    }

    #[test]
    fn rate_change_while_paused_does_not_restart() {
        let mut c = started("alpha beta");
        c.pause();
        c.set_rate(2.0);
        assert_eq!(c.engine().speaks().len(), 1);
        assert_eq!(c.state(), PlaybackState::Paused);
    }

    #[test]
    fn pitch_applies_live_when_supported() {
        let mut c = started("alpha beta");
        c.engine_mut().live_pitch = true;
        assert!(c.set_pitch(1.4));
        assert_eq!(c.engine().speaks().len(), 1);
        assert!(c.engine().calls.contains(&Call::LivePitch(1.4)));
    }

    #[test]
    fn pitch_restarts_otherwise() {
        let mut c = started("alpha beta");
        assert!(c.set_pitch(0.5));
        assert_eq!(c.engine().speaks().len(), 2);
        assert_eq!(c.session().pitch, 0.5);
    }

    #[test]
    fn unknown_voice_keeps_previous() {
        let mut c = controller();
        assert!(!c.set_voice("Nobody"));
        assert_eq!(c.session().voice.as_ref().map(|v| v.name.as_str()), Some("Samantha"));
        assert!(c.set_voice("Anna"));
        assert_eq!(c.session().voice.as_ref().map(|v| v.name.as_str()), Some("Anna"));
    }

    #[test]
    fn voice_change_waits_for_next_utterance() {
        let mut c = started("alpha beta");
        assert!(c.set_voice("Anna"));
        assert_eq!(c.engine().speaks().len(), 1);
        c.set_rate(1.25);
        assert_eq!(c.engine().speaks().len(), 2);
    }

    #[test]
    fn voice_loaded_later_is_found() {
        let mut c = controller();
        c.engine_mut().voices.push(Voice::new("Late", "fr-FR"));
        assert!(c.set_voice("Late"));
        assert_eq!(c.voices().len(), 3);
    }

    #[test]
    fn natural_end_waits_for_grace() {
        let mut c = started("alpha beta");
        let g = c.session().generation();
        c.tick(Duration::from_millis(500));
        c.handle_event(boundary(g, 0));
        assert_eq!(c.handle_event(EngineEvent::End { generation: g }), EventOutcome::Ended);
        assert_eq!(c.state(), PlaybackState::Ended);
        assert!(!c.is_playing());
        assert!(!c.tick(Duration::from_millis(2400)));
        assert!(c.surface().controls);
        assert!(c.surface().highlight.is_some());
        assert!(c.tick(Duration::from_millis(2500)));
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(!c.surface().controls);
        assert_eq!(c.surface().highlight, None);
    }

    #[test]
    fn restart_during_grace_keeps_controls() {
        let mut c = started("alpha beta");
        let g = c.session().generation();
        c.handle_event(EngineEvent::End { generation: g });
        let (snapshot, layout) = page("again");
        c.start("again", &snapshot, &layout).expect("restart");
        assert!(!c.tick(Duration::from_secs(10)));
        assert_eq!(c.state(), PlaybackState::Speaking);
        assert!(c.surface().controls);
    }

    #[test]
    fn engine_error_returns_to_idle() {
        let mut c = started("alpha beta");
        let g = c.session().generation();
        let outcome = c.handle_event(EngineEvent::Error {
            generation: g,
            message: "synthesis-failed".into(),
        });
        assert_eq!(outcome, EventOutcome::Failed);
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(!c.surface().controls);
    }

    #[test]
    fn refused_speak_fails_start() {
        let mut c = controller();
        c.engine_mut().refuse = true;
        let (snapshot, layout) = page("alpha");
        let err = c.start("alpha", &snapshot, &layout).expect_err("engine refuses");
        assert!(matches!(err, StartError::Engine(EngineError::Rejected(_))));
        assert_eq!(c.state(), PlaybackState::Idle);
    }

    #[test]
    fn preferences_apply_without_restart() {
        let mut c = started("alpha beta");
        c.apply_preferences(&Preferences {
            voice_name: Some("Anna".into()),
            speech_rate: 1.75,
            speech_pitch: 0.8,
            autoplay: false,
        });
        assert_eq!(c.engine().speaks().len(), 1);
        let prefs = c.preferences(true);
        assert_eq!(prefs.voice_name.as_deref(), Some("Anna"));
        assert_eq!(prefs.speech_rate, 1.75);
        assert_eq!(prefs.speech_pitch, 0.8);
        assert!(prefs.autoplay);
    }

    #[test]
    fn start_error_messages() {
        assert_eq!(StartError::NoContent.to_string(), "No text found to read.");
        let err = StartError::from(EngineError::Unavailable);
        assert!(std::error::Error::source(&err).is_some());
    }
}
