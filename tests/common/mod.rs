#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use image::{Rgba, RgbaImage};

use tapsense::bridge::{
    OcrLabel, OcrResult, OcrService, PatternHit, PatternMatcher, RegionDetector, ScreenCapture, Screenshot,
    TouchDriver, UnimplementedPatternMatcher, UnimplementedRegionDetector,
};
use tapsense::journal::{JournalEntry, RunJournal};
use tapsense::perception::{BoundingBox, Point};
use tapsense::settings::AgentSettings;
use tapsense::templates::Template;
use tapsense::AgentServices;

pub const SCREEN_WIDTH: u32 = 360;
pub const SCREEN_HEIGHT: u32 = 640;

/// One screen of the fake app: OCR labels with bounds, and which label
/// leads to which screen when tapped.
#[derive(Debug, Clone)]
pub struct FakeScreen {
    pub name: String,
    pub labels: Vec<(String, BoundingBox)>,
    pub transitions: HashMap<String, String>,
    pub shade: u8,
}

impl FakeScreen {
    pub fn new(name: &str, shade: u8) -> Self {
        Self {
            name: name.to_string(),
            labels: Vec::new(),
            transitions: HashMap::new(),
            shade,
        }
    }

    pub fn label(mut self, text: &str, x: i32, y: i32, width: i32, height: i32) -> Self {
        let bounds = BoundingBox::new(x, y, width, height).unwrap();
        self.labels.push((text.to_string(), bounds));
        self
    }

    pub fn leads_to(mut self, label: &str, screen: &str) -> Self {
        self.transitions.insert(label.to_string(), screen.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Tap(Point),
    Press(Point),
    Move(Point, u64),
    Release(Point),
    Text(String),
}

#[derive(Default)]
struct DeviceState {
    current: String,
    gestures: Vec<Gesture>,
    fail_touch: bool,
    touch_delay: Option<Duration>,
    capture_delay: Option<Duration>,
    fail_ocr: bool,
}

/// Screen, touch and OCR of a scripted app, all backed by one state.
pub struct FakeDevice {
    screens: HashMap<String, FakeScreen>,
    state: Mutex<DeviceState>,
}

impl FakeDevice {
    pub fn new(screens: Vec<FakeScreen>, start: &str) -> Arc<Self> {
        Arc::new(Self {
            screens: screens.into_iter().map(|s| (s.name.clone(), s)).collect(),
            state: Mutex::new(DeviceState {
                current: start.to_string(),
                ..DeviceState::default()
            }),
        })
    }

    pub fn current_screen(&self) -> String {
        self.state.lock().unwrap().current.clone()
    }

    pub fn gestures(&self) -> Vec<Gesture> {
        self.state.lock().unwrap().gestures.clone()
    }

    pub fn taps(&self) -> Vec<Point> {
        self.gestures()
            .into_iter()
            .filter_map(|g| match g {
                Gesture::Tap(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn fail_touch(&self) {
        self.state.lock().unwrap().fail_touch = true;
    }

    pub fn slow_touch(&self, delay: Duration) {
        self.state.lock().unwrap().touch_delay = Some(delay);
    }

    pub fn slow_capture(&self, delay: Duration) {
        self.state.lock().unwrap().capture_delay = Some(delay);
    }

    pub fn fail_ocr(&self) {
        self.state.lock().unwrap().fail_ocr = true;
    }

    pub fn services(self: &Arc<Self>) -> AgentServices {
        self.services_with(Arc::new(UnimplementedPatternMatcher), Arc::new(UnimplementedRegionDetector))
    }

    pub fn services_with(
        self: &Arc<Self>,
        matcher: Arc<dyn PatternMatcher>,
        regions: Arc<dyn RegionDetector>,
    ) -> AgentServices {
        AgentServices {
            capture: self.clone(),
            touch: self.clone(),
            ocr: self.clone(),
            matcher,
            regions,
        }
    }

    fn screen(&self) -> FakeScreen {
        let current = self.current_screen();
        self.screens[&current].clone()
    }

    fn touch(&self, gesture: Gesture) -> Result<()> {
        let delay = {
            let state = self.state.lock().unwrap();
            if state.fail_touch {
                bail!("device transport disconnected");
            }
            state.touch_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock().unwrap();
        if let Gesture::Tap(point) = &gesture {
            let screen = &self.screens[&state.current];
            let next = screen
                .labels
                .iter()
                .find(|(_, bounds)| bounds.contains(*point))
                .and_then(|(text, _)| screen.transitions.get(text))
                .cloned();
            if let Some(next) = next {
                state.current = next;
            }
        }
        state.gestures.push(gesture);
        Ok(())
    }
}

impl ScreenCapture for FakeDevice {
    fn capture(&self) -> Result<Screenshot> {
        let delay = self.state.lock().unwrap().capture_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let shade = self.screen().shade;
        let image = RgbaImage::from_pixel(SCREEN_WIDTH, SCREEN_HEIGHT, Rgba([shade, shade, shade, 255]));
        Screenshot::new(image, Utc::now())
    }
}

impl TouchDriver for FakeDevice {
    fn tap(&self, point: Point) -> Result<()> {
        self.touch(Gesture::Tap(point))
    }

    fn press(&self, point: Point) -> Result<()> {
        self.touch(Gesture::Press(point))
    }

    fn move_to(&self, point: Point, duration_ms: u64) -> Result<()> {
        self.touch(Gesture::Move(point, duration_ms))
    }

    fn release(&self, point: Point) -> Result<()> {
        self.touch(Gesture::Release(point))
    }

    fn input_text(&self, text: &str) -> Result<()> {
        self.touch(Gesture::Text(text.to_string()))
    }
}

impl OcrService for FakeDevice {
    fn recognize(&self, _image: &RgbaImage) -> Result<OcrResult> {
        if self.state.lock().unwrap().fail_ocr {
            bail!("ocr engine crashed");
        }
        let screen = self.screen();
        let mut lines = vec![screen.name.clone()];
        lines.extend(screen.labels.iter().map(|(text, _)| text.clone()));
        let text = lines.join("\n");
        Ok(OcrResult {
            word_count: text.split_whitespace().count() as u64,
            confidence: 0.95,
            labels: screen
                .labels
                .iter()
                .map(|(text, bounds)| OcrLabel::with_bounds(text.clone(), *bounds))
                .collect(),
            text,
        })
    }
}

/// Reports a fixed hit for templates whose name is in the table.
#[derive(Default)]
pub struct ScriptedMatcher {
    hits: HashMap<String, PatternHit>,
}

impl ScriptedMatcher {
    pub fn hit(mut self, template: &str, bounds: BoundingBox, score: f64) -> Self {
        self.hits.insert(template.to_string(), PatternHit { bounds, score });
        self
    }
}

impl PatternMatcher for ScriptedMatcher {
    fn match_template(&self, _screenshot: &RgbaImage, template: &Template) -> Result<Option<PatternHit>> {
        Ok(self.hits.get(&template.name).copied())
    }
}

pub struct FailingMatcher;

impl PatternMatcher for FailingMatcher {
    fn match_template(&self, _screenshot: &RgbaImage, _template: &Template) -> Result<Option<PatternHit>> {
        bail!("matcher backend unavailable")
    }
}

/// Proposes the same regions on every screenshot.
pub struct FixedRegions(pub Vec<BoundingBox>);

impl RegionDetector for FixedRegions {
    fn detect(&self, _screenshot: &RgbaImage) -> Result<Vec<BoundingBox>> {
        Ok(self.0.clone())
    }
}

pub struct FailingRegions;

impl RegionDetector for FailingRegions {
    fn detect(&self, _screenshot: &RgbaImage) -> Result<Vec<BoundingBox>> {
        bail!("detector model missing")
    }
}

/// Journal that keeps everything in memory for assertions.
#[derive(Default)]
pub struct MemoryJournal {
    pub lines: Mutex<Vec<String>>,
    pub entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl RunJournal for MemoryJournal {
    fn narrative(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn record(&self, entry: JournalEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

/// Settings with no settle delay and no reference templates on disk.
pub fn fast_settings() -> AgentSettings {
    AgentSettings {
        reference_template_dir: "does-not-exist".into(),
        settle_delay_ms: 0,
        transport_timeout_secs: 1,
        max_iterations: 10,
        stuck_threshold: 3,
        ..AgentSettings::default()
    }
}

/// Welcome -> Login -> Home.
pub fn login_app() -> Arc<FakeDevice> {
    FakeDevice::new(
        vec![
            FakeScreen::new("Welcome", 20)
                .label("Sign In", 100, 100, 40, 40)
                .label("Create account", 100, 200, 160, 40)
                .leads_to("Sign In", "Login"),
            FakeScreen::new("Login", 120)
                .label("Email", 40, 200, 80, 24)
                .label("Password", 40, 300, 100, 24)
                .label("Log In", 120, 420, 120, 48)
                .leads_to("Log In", "Home"),
            FakeScreen::new("Home", 220)
                .label("Item 1", 40, 100, 80, 30)
                .label("Item 5", 40, 500, 80, 30),
        ],
        "Welcome",
    )
}
