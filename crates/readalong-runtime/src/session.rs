#![forbid(unsafe_code)]

//! The single playback session owned by the controller.

use readalong_text::locate::PositionTable;
use readalong_text::segment::{SpeechText, Word};

use crate::engine::Generation;
use crate::voice::VoiceRef;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
    Paused,
    /// Finished naturally; waiting out the grace delay before going idle.
    Ended,
}

impl PlaybackState {
    /// Speaking or paused: an engine request is live.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Speaking | Self::Paused)
    }
}

/// Text, word table, positions and speech parameters of one play-through.
///
/// Speech parameters survive [`reset`](Self::reset); everything else is
/// cleared.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    source_text: String,
    speech: SpeechText,
    positions: PositionTable,
    current_index: usize,
    state: PlaybackState,
    generation: Generation,
    base_offset: u32,
    pub rate: f32,
    pub pitch: f32,
    pub voice: Option<VoiceRef>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            source_text: String::new(),
            speech: SpeechText::default(),
            positions: PositionTable::default(),
            current_index: 0,
            state: PlaybackState::Idle,
            generation: Generation::default(),
            base_offset: 0,
            rate: 1.0,
            pitch: 1.0,
            voice: None,
        }
    }
}

impl PlaybackSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install fresh content and enter `Speaking` under `generation`.
    pub(crate) fn begin(
        &mut self,
        source_text: String,
        speech: SpeechText,
        positions: PositionTable,
        generation: Generation,
    ) {
        self.source_text = source_text;
        self.speech = speech;
        self.positions = positions;
        self.current_index = 0;
        self.base_offset = 0;
        self.generation = generation;
        self.state = PlaybackState::Speaking;
    }

    /// Clear content and position; keep rate, pitch, voice and generation.
    pub(crate) fn reset(&mut self) {
        self.source_text.clear();
        self.speech = SpeechText::default();
        self.positions = PositionTable::default();
        self.current_index = 0;
        self.base_offset = 0;
        self.state = PlaybackState::Idle;
    }

    /// Re-issue the utterance from the current word under `generation`.
    ///
    /// Returns the text to speak, or `None` when there is nothing left.
    pub(crate) fn restart_from_current(&mut self, generation: Generation) -> Option<String> {
        let word = self.speech.word(self.current_index)?;
        let base = word.char_start;
        let text = self.speech.suffix_from(self.current_index)?.to_owned();
        self.base_offset = base;
        self.generation = generation;
        self.state = PlaybackState::Speaking;
        Some(text)
    }

    pub(crate) fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
    }

    pub(crate) fn set_current_index(&mut self, index: usize) {
        self.current_index = index;
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Generation of the live (or last) engine request.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// UTF-16 offset in the spoken text at which the live request starts.
    #[must_use]
    pub const fn base_offset(&self) -> u32 {
        self.base_offset
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Text the session was started with, before segmentation.
    #[must_use]
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    #[must_use]
    pub fn speech(&self) -> &SpeechText {
        &self.speech
    }

    #[must_use]
    pub fn words(&self) -> &[Word] {
        self.speech.words()
    }

    #[must_use]
    pub fn positions(&self) -> &PositionTable {
        &self.positions
    }
}
