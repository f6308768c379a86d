#![forbid(unsafe_code)]

//! `wasm-bindgen` export of the content script.
//!
//! JS creates one [`ReadAlong`] per page, forwards popup/background messages
//! to `dispatch`, and calls `step(performance.now())` from an animation frame
//! loop. Speech callbacks and control-bar clicks are queued by their closures
//! and only applied inside `step`, so no handler ever runs re-entrantly.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;

use js_sys::{Array, Reflect};
use readalong_dom::geometry::{LayoutOracle, Rect, Viewport};
use readalong_dom::node::{ComputedStyle, ElementData, NodeId};
use readalong_dom::snapshot::SnapshotBuilder;
use readalong_runtime::config::{PlaybackConfig, Preferences, PreferencesError, RATE_PRESETS};
use readalong_runtime::engine::{
    BoundaryEvent, EngineError, EngineEvent, Generation, SpeechEngine, UtteranceRequest,
};
use readalong_runtime::session::PlaybackState;
use readalong_runtime::sync::HighlightSurface;
use readalong_runtime::voice::Voice;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, HtmlElement, HtmlSelectElement, Node, ScrollBehavior,
    ScrollToOptions, SpeechSynthesis, SpeechSynthesisEvent, SpeechSynthesisUtterance, Window,
};

use crate::host::{
    ContentHost, ControlAction, Page, PageCapture, PreferenceStore, clock_from_millis,
};

const HIGHLIGHT_ID: &str = "readalong-highlight";
const CONTROLS_ID: &str = "readalong-controls";
const STORAGE_KEY: &str = "readalong.preferences";
/// Attributes copied into the snapshot.
const CAPTURED_ATTRS: &[&str] = &["id", "class", "role", "type", "src"];
/// Callback sets kept alive after their utterance was replaced; cancelled
/// utterances still fire `onerror`/`onend` shortly afterwards.
const RETAINED_CALLBACK_SETS: usize = 4;
const BUTTON_CSS: &str = "background:none;border:none;font-size:24px;cursor:pointer;\
                          margin-right:10px;width:40px;height:40px;";
const PLAY_LABEL: &str = "\u{25b6}\u{fe0f}";
const PAUSE_LABEL: &str = "\u{23f8}\u{fe0f}";
const STOP_LABEL: &str = "\u{23f9}\u{fe0f}";

static PANIC_HOOK: Once = Once::new();

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            web_sys::console::error_1(&JsValue::from_str(&info.to_string()));
        }));
    });
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))
}

// ---------------------------------------------------------------------------
// Page capture
// ---------------------------------------------------------------------------

/// Layout answered by live DOM ranges.
pub struct BrowserLayout {
    document: Document,
    window: Window,
    nodes: Vec<Option<Node>>,
}

impl LayoutOracle for BrowserLayout {
    fn text_rect(&self, node: NodeId, range: Range<u32>) -> Option<Rect> {
        let node = self.nodes.get(node.index())?.as_ref()?;
        let dom_range = self.document.create_range().ok()?;
        dom_range.set_start(node, range.start).ok()?;
        dom_range.set_end(node, range.end).ok()?;
        let r = dom_range.get_bounding_client_rect();
        (r.width() > 0.0 || r.height() > 0.0)
            .then(|| Rect::new(r.top(), r.left(), r.width(), r.height()))
    }

    fn viewport(&self) -> Viewport {
        let num = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Viewport::new(
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
            num(self.window.inner_width()),
            num(self.window.inner_height()),
        )
    }
}

/// The live document.
pub struct BrowserPage {
    window: Window,
    document: Document,
}

impl BrowserPage {
    fn new() -> Result<Self, JsValue> {
        Ok(Self {
            window: window()?,
            document: document()?,
        })
    }

    fn element_data(&self, el: &Element) -> ElementData {
        let mut data = ElementData::new(el.tag_name());
        for name in CAPTURED_ATTRS {
            if let Some(value) = el.get_attribute(name) {
                data.set_attr(*name, value);
            }
        }
        let style = self
            .window
            .get_computed_style(el)
            .ok()
            .flatten()
            .map_or(ComputedStyle::VISIBLE, |css| {
                ComputedStyle::from_properties(
                    &css.get_property_value("display").unwrap_or_default(),
                    &css.get_property_value("visibility").unwrap_or_default(),
                )
            });
        data.with_style(style)
    }
}

fn is_own_overlay(el: &Element) -> bool {
    let id = el.id();
    id == HIGHLIGHT_ID || id == CONTROLS_ID
}

impl Page for BrowserPage {
    type Layout = BrowserLayout;

    fn capture(&self) -> PageCapture<BrowserLayout> {
        let mut builder = SnapshotBuilder::default();
        let mut nodes: Vec<Option<Node>> = Vec::new();
        let body = self.document.body();
        nodes.push(body.clone().map(Node::from));

        let mut stack: Vec<(Node, NodeId)> = Vec::new();
        if let Some(body) = body {
            let mut child = body.last_child();
            while let Some(node) = child {
                child = node.previous_sibling();
                stack.push((node, builder.root()));
            }
        }
        while let Some((node, parent)) = stack.pop() {
            match node.node_type() {
                Node::ELEMENT_NODE => {
                    let Some(el) = node.dyn_ref::<Element>() else {
                        continue;
                    };
                    if is_own_overlay(el) {
                        continue;
                    }
                    let id = builder.append_element(parent, self.element_data(el));
                    nodes.push(Some(node.clone()));
                    let mut child = node.last_child();
                    while let Some(c) = child {
                        child = c.previous_sibling();
                        stack.push((c, id));
                    }
                }
                Node::TEXT_NODE => {
                    builder.append_text(parent, node.node_value().unwrap_or_default());
                    nodes.push(Some(node));
                }
                _ => {}
            }
        }
        debug!(nodes = nodes.len(), "captured page");
        PageCapture {
            snapshot: builder.finish(),
            layout: BrowserLayout {
                document: self.document.clone(),
                window: self.window.clone(),
                nodes,
            },
        }
    }

    fn selected_text(&self) -> String {
        self.window
            .get_selection()
            .ok()
            .flatten()
            .map(|s| String::from(s.to_string()).trim().to_owned())
            .unwrap_or_default()
    }

    fn location_path(&self) -> String {
        self.window.location().pathname().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Speech engine
// ---------------------------------------------------------------------------

type EventQueue = Rc<RefCell<VecDeque<EngineEvent>>>;
type SpeechCallback = Closure<dyn FnMut(SpeechSynthesisEvent)>;

/// `window.speechSynthesis` with callbacks routed into a queue.
pub struct WebSpeechEngine {
    synth: SpeechSynthesis,
    queue: EventQueue,
    callbacks: VecDeque<[SpeechCallback; 3]>,
}

impl WebSpeechEngine {
    fn new(queue: EventQueue) -> Result<Self, JsValue> {
        Ok(Self {
            synth: window()?.speech_synthesis()?,
            queue,
            callbacks: VecDeque::new(),
        })
    }

    fn callback(
        &self,
        generation: Generation,
        map: fn(Generation, &SpeechSynthesisEvent) -> Option<EngineEvent>,
    ) -> SpeechCallback {
        let queue = Rc::clone(&self.queue);
        Closure::new(move |event: SpeechSynthesisEvent| {
            if let Some(ev) = map(generation, &event) {
                queue.borrow_mut().push_back(ev);
            }
        })
    }
}

fn boundary_event(generation: Generation, event: &SpeechSynthesisEvent) -> Option<EngineEvent> {
    if event.name() != "word" {
        return None;
    }
    let length = Reflect::get(event, &JsValue::from_str("charLength"))
        .ok()
        .and_then(|v| v.as_f64())
        .map(|n| n as u32);
    Some(EngineEvent::Boundary(BoundaryEvent {
        generation,
        offset: event.char_index(),
        length,
    }))
}

fn end_event(generation: Generation, _event: &SpeechSynthesisEvent) -> Option<EngineEvent> {
    Some(EngineEvent::End { generation })
}

fn error_event(generation: Generation, event: &SpeechSynthesisEvent) -> Option<EngineEvent> {
    let message = Reflect::get(event, &JsValue::from_str("error"))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_else(|| "unknown".to_owned());
    // Reported for utterances we cancelled ourselves.
    if message == "interrupted" || message == "canceled" {
        return None;
    }
    Some(EngineEvent::Error {
        generation,
        message,
    })
}

impl SpeechEngine for WebSpeechEngine {
    fn speak(&mut self, request: UtteranceRequest) -> Result<(), EngineError> {
        let utterance = SpeechSynthesisUtterance::new_with_text(&request.text)
            .map_err(|e| EngineError::Rejected(format!("{e:?}")))?;
        utterance.set_rate(request.rate);
        utterance.set_pitch(request.pitch);
        if let Some(voice) = &request.voice {
            let native = self
                .synth
                .get_voices()
                .iter()
                .filter_map(|v| v.dyn_into::<web_sys::SpeechSynthesisVoice>().ok())
                .find(|v| v.name() == voice.name);
            utterance.set_voice(native.as_ref());
        }
        let boundary = self.callback(request.generation, boundary_event);
        let end = self.callback(request.generation, end_event);
        let error = self.callback(request.generation, error_event);
        utterance.set_onboundary(Some(boundary.as_ref().unchecked_ref()));
        utterance.set_onend(Some(end.as_ref().unchecked_ref()));
        utterance.set_onerror(Some(error.as_ref().unchecked_ref()));
        self.cancel();
        self.synth.speak(&utterance);
        if self.callbacks.len() >= RETAINED_CALLBACK_SETS {
            self.callbacks.pop_front();
        }
        self.callbacks.push_back([boundary, end, error]);
        Ok(())
    }

    fn pause(&mut self) {
        self.synth.pause();
    }

    fn resume(&mut self) {
        self.synth.resume();
    }

    fn cancel(&mut self) {
        self.synth.cancel();
        // Chromium keeps a paused synth paused across cancel().
        self.synth.resume();
    }

    fn voices(&self) -> Vec<Voice> {
        self.synth
            .get_voices()
            .iter()
            .filter_map(|v| v.dyn_into::<web_sys::SpeechSynthesisVoice>().ok())
            .map(|v| Voice {
                name: v.name(),
                lang: v.lang(),
                default: v.default(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

type ControlQueue = Rc<RefCell<VecDeque<ControlAction>>>;
type DomListener = Closure<dyn FnMut(Event)>;

/// Absolutely positioned highlight box plus the floating control bar.
pub struct OverlaySurface {
    window: Window,
    highlight: HtmlElement,
    controls: HtmlElement,
    toggle: HtmlElement,
    speed: HtmlSelectElement,
    /// Click and change handlers; dropping them detaches the control bar.
    _listeners: Vec<DomListener>,
    /// Last `(paused, rate)` written to the control bar.
    rendered: Option<(bool, f32)>,
}

fn overlay_element(document: &Document, id: &str, css: &str) -> Result<HtmlElement, JsValue> {
    let el: HtmlElement = document.create_element("div")?.dyn_into()?;
    el.set_id(id);
    el.set_attribute("style", css)?;
    document
        .body()
        .ok_or_else(|| JsValue::from_str("no body"))?
        .append_child(&el)?;
    Ok(el)
}

fn control_button(document: &Document, label: &str) -> Result<HtmlElement, JsValue> {
    let button: HtmlElement = document.create_element("button")?.dyn_into()?;
    button.set_text_content(Some(label));
    button.set_attribute("style", BUTTON_CSS)?;
    Ok(button)
}

fn speed_selector(document: &Document) -> Result<HtmlSelectElement, JsValue> {
    let select: HtmlSelectElement = document.create_element("select")?.dyn_into()?;
    select.set_attribute(
        "style",
        "margin:0 10px;padding:5px;border-radius:3px;border:1px solid #ccc;",
    )?;
    for rate in RATE_PRESETS {
        let option = document.create_element("option")?;
        option.set_attribute("value", &rate.to_string())?;
        option.set_text_content(Some(&format!("{rate}x")));
        select.append_child(&option)?;
    }
    select.set_value("1");
    Ok(select)
}

fn push_action(queue: &ControlQueue, action: ControlAction) -> DomListener {
    let queue = Rc::clone(queue);
    Closure::new(move |_event: Event| queue.borrow_mut().push_back(action))
}

fn speed_listener(queue: &ControlQueue) -> DomListener {
    let queue = Rc::clone(queue);
    Closure::new(move |event: Event| {
        let rate = event
            .target()
            .and_then(|target| target.dyn_into::<HtmlSelectElement>().ok())
            .and_then(|select| select.value().parse::<f32>().ok());
        if let Some(rate) = rate {
            queue.borrow_mut().push_back(ControlAction::SetRate(rate));
        }
    })
}

impl OverlaySurface {
    fn new(actions: &ControlQueue) -> Result<Self, JsValue> {
        let document = document()?;
        let highlight = overlay_element(
            &document,
            HIGHLIGHT_ID,
            "position:absolute;display:none;pointer-events:none;z-index:2147483646;\
             background:rgba(255,213,79,0.45);border-radius:3px;transition:all 80ms linear;",
        )?;
        let controls = overlay_element(
            &document,
            CONTROLS_ID,
            "position:fixed;display:none;bottom:20px;left:50%;transform:translateX(-50%);\
             align-items:center;padding:10px 20px;border-radius:30px;background:#fff;\
             box-shadow:0 4px 12px rgba(0,0,0,0.15);z-index:2147483647;",
        )?;

        let toggle = control_button(&document, PAUSE_LABEL)?;
        let stop = control_button(&document, STOP_LABEL)?;
        let speed = speed_selector(&document)?;
        let on_toggle = push_action(actions, ControlAction::TogglePlayback);
        let on_stop = push_action(actions, ControlAction::Stop);
        let on_speed = speed_listener(actions);
        toggle.set_onclick(Some(on_toggle.as_ref().unchecked_ref()));
        stop.set_onclick(Some(on_stop.as_ref().unchecked_ref()));
        speed.set_onchange(Some(on_speed.as_ref().unchecked_ref()));
        controls.append_child(&toggle)?;
        controls.append_child(&stop)?;
        controls.append_child(&speed)?;

        Ok(Self {
            window: window()?,
            highlight,
            controls,
            toggle,
            speed,
            _listeners: vec![on_toggle, on_stop, on_speed],
            rendered: None,
        })
    }

    /// Sync the play/pause label and the speed selector with the session.
    fn render_controls(&mut self, paused: bool, rate: f32) {
        if self.rendered == Some((paused, rate)) {
            return;
        }
        self.rendered = Some((paused, rate));
        self.toggle
            .set_text_content(Some(if paused { PLAY_LABEL } else { PAUSE_LABEL }));
        self.speed.set_value(&rate.to_string());
    }

    fn set_style(el: &HtmlElement, property: &str, value: &str) {
        if let Err(err) = el.style().set_property(property, value) {
            warn!(property, ?err, "could not set overlay style");
        }
    }
}

impl HighlightSurface for OverlaySurface {
    fn show_highlight(&mut self, rect: Rect) {
        let px = |v: f64| format!("{v}px");
        Self::set_style(&self.highlight, "top", &px(rect.top));
        Self::set_style(&self.highlight, "left", &px(rect.left));
        Self::set_style(&self.highlight, "width", &px(rect.width));
        Self::set_style(&self.highlight, "height", &px(rect.height));
        Self::set_style(&self.highlight, "display", "block");
    }

    fn hide_highlight(&mut self) {
        Self::set_style(&self.highlight, "display", "none");
    }

    fn viewport(&self) -> Viewport {
        let num = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Viewport::new(
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
            num(self.window.inner_width()),
            num(self.window.inner_height()),
        )
    }

    fn scroll_to(&mut self, top: f64) {
        let options = ScrollToOptions::new();
        options.set_top(top);
        options.set_behavior(ScrollBehavior::Smooth);
        self.window.scroll_to_with_scroll_to_options(&options);
    }

    fn set_controls_visible(&mut self, visible: bool) {
        Self::set_style(&self.controls, "display", if visible { "flex" } else { "none" });
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Preferences kept in `window.localStorage`.
pub struct LocalStoragePreferences {
    window: Window,
}

impl LocalStoragePreferences {
    fn storage(&self) -> Result<web_sys::Storage, PreferencesError> {
        self.window
            .local_storage()
            .ok()
            .flatten()
            .ok_or_else(|| PreferencesError::Storage("localStorage unavailable".into()))
    }
}

impl PreferenceStore for LocalStoragePreferences {
    fn load(&self) -> Result<Preferences, PreferencesError> {
        let stored = self
            .storage()?
            .get_item(STORAGE_KEY)
            .map_err(|e| PreferencesError::Storage(format!("{e:?}")))?;
        match stored {
            Some(json) => Preferences::from_json(&json),
            None => Ok(Preferences::default()),
        }
    }

    fn save(&mut self, prefs: &Preferences) -> Result<(), PreferencesError> {
        let json = prefs.to_json()?;
        self.storage()?
            .set_item(STORAGE_KEY, &json)
            .map_err(|e| PreferencesError::Storage(format!("{e:?}")))
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

type BrowserHost = ContentHost<BrowserPage, WebSpeechEngine, OverlaySurface, LocalStoragePreferences>;

/// Content-script instance exported to JS.
#[wasm_bindgen]
pub struct ReadAlong {
    host: BrowserHost,
    queue: EventQueue,
    actions: ControlQueue,
    last_now: Duration,
}

#[wasm_bindgen]
impl ReadAlong {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ReadAlong, JsValue> {
        install_panic_hook();
        let queue: EventQueue = Rc::new(RefCell::new(VecDeque::new()));
        let actions: ControlQueue = Rc::new(RefCell::new(VecDeque::new()));
        let host = ContentHost::new(
            BrowserPage::new()?,
            WebSpeechEngine::new(Rc::clone(&queue))?,
            OverlaySurface::new(&actions)?,
            LocalStoragePreferences { window: window()? },
            PlaybackConfig::default(),
        );
        Ok(Self {
            host,
            queue,
            actions,
            last_now: Duration::ZERO,
        })
    }

    /// Handle one JSON message; returns the JSON reply, if any.
    pub fn dispatch(&mut self, message: &str) -> Result<Option<String>, JsValue> {
        self.host
            .dispatch_json(message)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Start reading if autoplay is enabled. Returns whether reading started.
    #[wasm_bindgen(js_name = pageReady)]
    pub fn page_ready(&mut self) -> bool {
        matches!(self.host.page_ready(), Some(Ok(_)))
    }

    /// Re-read the voice catalog (`speechSynthesis.onvoiceschanged`).
    #[wasm_bindgen(js_name = voicesChanged)]
    pub fn voices_changed(&mut self) {
        self.host.controller_mut().refresh_voices();
    }

    /// Advance the clock, then apply queued control-bar clicks and speech
    /// callbacks.
    ///
    /// Non-finite or negative timestamps keep the previous clock value.
    /// Returns the number of speech callbacks applied.
    pub fn step(&mut self, now_ms: f64) -> u32 {
        let now = clock_from_millis(now_ms, self.last_now);
        self.last_now = now;
        let actions: Vec<ControlAction> = self.actions.borrow_mut().drain(..).collect();
        for action in actions {
            self.host.control(action);
        }
        let pending: Vec<EngineEvent> = self.queue.borrow_mut().drain(..).collect();
        let applied = u32::try_from(pending.len()).unwrap_or(u32::MAX);
        self.host.step(now, pending);

        let controller = self.host.controller_mut();
        let paused = controller.state() == PlaybackState::Paused;
        let rate = controller.session().rate;
        controller.surface_mut().render_controls(paused, rate);
        applied
    }

    /// Current state as the `getState` JSON reply.
    pub fn state(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.host.state_snapshot())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Voice names, in catalog order.
    #[wasm_bindgen(js_name = voiceNames)]
    pub fn voice_names(&self) -> Array {
        self.host
            .controller()
            .voices()
            .iter()
            .map(|v| JsValue::from_str(&v.name))
            .collect()
    }
}
