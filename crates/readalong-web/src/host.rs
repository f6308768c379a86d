#![forbid(unsafe_code)]

//! Content-script host: ties the page, the preference store and the
//! playback controller to the command surface.
//!
//! Everything browser-specific sits behind [`Page`], [`SpeechEngine`] and
//! [`HighlightSurface`], so the full command flow runs natively in tests.

use std::time::Duration;

use readalong_dom::extract::extract_readable_text;
use readalong_dom::geometry::LayoutOracle;
use readalong_dom::pdf::{extract_pdf_text, is_pdf_document};
use readalong_dom::snapshot::DomSnapshot;
use readalong_runtime::config::{PlaybackConfig, Preferences, PreferencesError};
use readalong_runtime::controller::{EventOutcome, PlaybackController, StartError};
use readalong_runtime::engine::{EngineEvent, SpeechEngine};
use readalong_runtime::sync::HighlightSurface;
use tracing::{debug, info, warn};

use crate::command::{Ack, Command, CommandParseError, Response, StateSnapshot};

/// A captured page plus the geometry to go with it.
#[derive(Debug, Clone)]
pub struct PageCapture<L> {
    pub snapshot: DomSnapshot,
    pub layout: L,
}

/// The document the content script runs in.
pub trait Page {
    type Layout: LayoutOracle;

    /// Snapshot the DOM and its current layout.
    fn capture(&self) -> PageCapture<Self::Layout>;

    /// Current user selection, empty when nothing is selected.
    fn selected_text(&self) -> String;

    /// `location.pathname` of the document.
    fn location_path(&self) -> String;
}

/// Persistent storage for [`Preferences`].
pub trait PreferenceStore {
    fn load(&self) -> Result<Preferences, PreferencesError>;

    fn save(&mut self, prefs: &Preferences) -> Result<(), PreferencesError>;
}

/// Store keeping the serialized preferences in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    json: Option<String>,
}

impl MemoryPreferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with raw stored JSON.
    #[must_use]
    pub fn with_json(json: impl Into<String>) -> Self {
        Self {
            json: Some(json.into()),
        }
    }

    #[must_use]
    pub fn json(&self) -> Option<&str> {
        self.json.as_deref()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Preferences, PreferencesError> {
        match &self.json {
            Some(json) => Preferences::from_json(json),
            None => Ok(Preferences::default()),
        }
    }

    fn save(&mut self, prefs: &Preferences) -> Result<(), PreferencesError> {
        self.json = Some(prefs.to_json()?);
        Ok(())
    }
}

/// Where the text of a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Explicit,
    Selection,
    PdfTextLayer,
    PageExtraction,
}

/// Convert a host timestamp in milliseconds to a clock value.
///
/// Non-finite or negative timestamps keep `previous`.
#[must_use]
pub fn clock_from_millis(now_ms: f64, previous: Duration) -> Duration {
    Duration::try_from_secs_f64(now_ms / 1000.0).unwrap_or(previous)
}

/// Input from the on-page control bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    /// Play/pause button.
    TogglePlayback,
    Stop,
    /// Speed selector; values come from [`RATE_PRESETS`].
    ///
    /// [`RATE_PRESETS`]: readalong_runtime::config::RATE_PRESETS
    SetRate(f32),
}

/// The content script.
pub struct ContentHost<P, E, S, St> {
    page: P,
    store: St,
    controller: PlaybackController<E, S>,
    autoplay: bool,
}

impl<P, E, S, St> ContentHost<P, E, S, St>
where
    P: Page,
    E: SpeechEngine,
    S: HighlightSurface,
    St: PreferenceStore,
{
    /// Build the host and apply stored preferences.
    pub fn new(page: P, engine: E, surface: S, store: St, config: PlaybackConfig) -> Self {
        let mut controller = PlaybackController::new(engine, surface, config);
        let prefs = store.load().unwrap_or_else(|err| {
            warn!(error = %err, "ignoring stored preferences");
            Preferences::default()
        });
        controller.apply_preferences(&prefs);
        Self {
            page,
            store,
            controller,
            autoplay: prefs.autoplay,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &PlaybackController<E, S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<E, S> {
        &mut self.controller
    }

    #[must_use]
    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    #[must_use]
    pub fn store(&self) -> &St {
        &self.store
    }

    /// Called once the document has loaded. Starts reading when autoplay is
    /// on; returns `None` otherwise.
    pub fn page_ready(&mut self) -> Option<Result<TextSource, StartError>> {
        if !self.autoplay {
            return None;
        }
        info!("autoplay enabled, reading page");
        Some(self.start_reading(None))
    }

    /// Parse and run one JSON request. `Ok(None)` means no reply is due.
    pub fn dispatch_json(&mut self, json: &str) -> Result<Option<String>, CommandParseError> {
        let command = Command::from_json(json)?;
        Ok(self.dispatch(command).to_json())
    }

    /// Run one command.
    pub fn dispatch(&mut self, command: Command) -> Response {
        debug!(?command, "dispatch");
        match command {
            Command::GetState => Response::State(self.state_snapshot()),
            Command::GetVoices => {
                self.controller.refresh_voices();
                Response::Voices {
                    voices: self.controller.voices().to_vec(),
                }
            }
            Command::Start { text } => match self.start_reading(text.as_deref()) {
                Ok(_) => Response::Ack(Ack::ok()),
                Err(err) => Response::Ack(Ack::failed(err.to_string())),
            },
            Command::Stop => {
                self.controller.stop();
                Response::Ack(Ack::ok())
            }
            Command::Pause => Response::Ack(Ack::from_bool(self.controller.pause())),
            Command::Resume => Response::Ack(Ack::from_bool(self.controller.resume())),
            Command::SetVoice { voice_name } => {
                self.controller.set_voice(&voice_name);
                self.save_preferences();
                Response::Ack(Ack::ok())
            }
            Command::SetRate { rate } => {
                self.controller.set_rate(rate);
                self.save_preferences();
                Response::Ack(Ack::ok())
            }
            Command::SetPitch { pitch } => {
                self.controller.set_pitch(pitch);
                self.save_preferences();
                Response::Ack(Ack::ok())
            }
            Command::ReadSelectedText { selected_text } => {
                match selected_text.as_deref().filter(|t| !t.trim().is_empty()) {
                    Some(text) => {
                        if let Err(err) = self.start_reading(Some(text)) {
                            warn!(error = %err, "could not read selection");
                        }
                    }
                    None => debug!("readSelectedText without text"),
                }
                Response::None
            }
        }
    }

    /// Apply one control-bar input.
    pub fn control(&mut self, action: ControlAction) {
        debug!(?action, "control bar");
        match action {
            ControlAction::TogglePlayback => {
                self.controller.toggle();
            }
            ControlAction::Stop => self.controller.stop(),
            ControlAction::SetRate(rate) => {
                self.controller.set_rate(rate);
                self.save_preferences();
            }
        }
    }

    /// Advance the clock to `now`, then apply queued engine callbacks.
    ///
    /// An end event applied here starts its grace delay at `now`. Returns
    /// `true` when the session went idle on this step.
    pub fn step(&mut self, now: Duration, events: impl IntoIterator<Item = EngineEvent>) -> bool {
        let idle = self.controller.tick(now);
        for event in events {
            self.controller.handle_event(event);
        }
        idle
    }

    /// Forward an engine callback.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> EventOutcome {
        self.controller.handle_event(event)
    }

    /// Advance the host clock.
    pub fn tick(&mut self, now: Duration) -> bool {
        self.controller.tick(now)
    }

    #[must_use]
    pub fn state_snapshot(&self) -> StateSnapshot {
        let session = self.controller.session();
        StateSnapshot {
            is_playing: self.controller.is_playing(),
            speech_rate: session.rate,
            speech_pitch: session.pitch,
            selected_voice_name: session.voice.as_ref().map(|v| v.name.clone()),
        }
    }

    /// Resolve the text to read and start a session with it.
    ///
    /// Order: explicit text, the current selection, the PDF text layers on a
    /// PDF viewer, then the page's readable text.
    pub fn start_reading(&mut self, explicit: Option<&str>) -> Result<TextSource, StartError> {
        let capture = self.page.capture();
        let (text, source) = self.resolve_text(explicit, &capture.snapshot);
        debug!(?source, len = text.len(), "resolved text to read");
        self.controller.start(&text, &capture.snapshot, &capture.layout)?;
        Ok(source)
    }

    fn resolve_text(&self, explicit: Option<&str>, snapshot: &DomSnapshot) -> (String, TextSource) {
        if let Some(text) = explicit.filter(|t| !t.trim().is_empty()) {
            return (text.to_owned(), TextSource::Explicit);
        }
        let selection = self.page.selected_text();
        if !selection.trim().is_empty() {
            return (selection, TextSource::Selection);
        }
        if is_pdf_document(&self.page.location_path(), snapshot) {
            return (extract_pdf_text(snapshot), TextSource::PdfTextLayer);
        }
        (extract_readable_text(snapshot).text, TextSource::PageExtraction)
    }

    fn save_preferences(&mut self) {
        let prefs = self.controller.preferences(self.autoplay);
        if let Err(err) = self.store.save(&prefs) {
            warn!(error = %err, "could not save preferences");
        }
    }
}
