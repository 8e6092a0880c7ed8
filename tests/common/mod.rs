#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use centering_guide::{
    DetectionOptions, DetectorError, FaceBox, FaceDetection, FeedFrame, GuideSurface,
    Instruction, InstructionLabel, ModelLoader,
};
use tokio::sync::Notify;

pub type TestFrame = &'static str;

/// Surface held entirely in memory.
#[derive(Default)]
pub struct MemorySurface {
    frame: Mutex<Option<FeedFrame<TestFrame>>>,
    label: InstructionLabel,
    feed_shown: AtomicBool,
    start: Notify,
}

impl MemorySurface {
    pub fn with_frame(width: u32) -> Self {
        let surface = Self::default();
        surface.load_frame(width);
        surface
    }

    pub fn load_frame(&self, width: u32) {
        *self.frame.lock().unwrap() = Some(FeedFrame::loaded("frame", width));
    }

    pub fn set_frame(&self, frame: FeedFrame<TestFrame>) {
        *self.frame.lock().unwrap() = Some(frame);
    }

    pub fn press_start(&self) {
        self.start.notify_one();
    }

    pub fn feed_shown(&self) -> bool {
        self.feed_shown.load(Ordering::SeqCst)
    }

    pub fn instruction(&self) -> Option<Instruction> {
        self.label.current()
    }
}

impl GuideSurface for MemorySurface {
    type Frame = TestFrame;

    async fn wait_for_start(&self) -> anyhow::Result<()> {
        self.start.notified().await;
        Ok(())
    }

    async fn show_feed(&self) -> anyhow::Result<()> {
        self.feed_shown.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read_feed_frame(&self) -> FeedFrame<TestFrame> {
        self.frame
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(FeedFrame::not_loaded)
    }

    fn set_instruction(&self, instruction: Instruction) {
        self.label.set(instruction);
    }
}

enum Step {
    Face(Option<FaceBox>, Duration),
    Fail(Duration),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    calls: usize,
}

/// Detector answering from a queue of canned results. Once the queue runs dry it
/// finds no face.
#[derive(Clone, Default)]
pub struct ScriptedDetector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDetector {
    pub fn respond(&self, face: Option<FaceBox>, after: Duration) -> &Self {
        self.script
            .lock()
            .unwrap()
            .steps
            .push_back(Step::Face(face, after));
        self
    }

    pub fn fail(&self, after: Duration) -> &Self {
        self.script.lock().unwrap().steps.push_back(Step::Fail(after));
        self
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().calls
    }
}

impl FaceDetection for ScriptedDetector {
    type Frame = TestFrame;

    async fn detect_single_face(
        &self,
        _frame: TestFrame,
        _options: DetectionOptions,
    ) -> Result<Option<FaceBox>, DetectorError> {
        let step = {
            let mut script = self.script.lock().unwrap();
            script.calls += 1;
            script.steps.pop_front()
        };
        match step {
            Some(Step::Face(face, after)) => {
                tokio::time::sleep(after).await;
                Ok(face)
            }
            Some(Step::Fail(after)) => {
                tokio::time::sleep(after).await;
                Err(anyhow::anyhow!("malformed frame").into())
            }
            None => Ok(None),
        }
    }
}

pub struct ScriptedLoader {
    pub detector: ScriptedDetector,
    pub load_time: Duration,
    pub fails: bool,
    pub loaded_from: Mutex<Option<String>>,
}

impl ScriptedLoader {
    pub fn new(detector: ScriptedDetector) -> Self {
        Self {
            detector,
            load_time: Duration::ZERO,
            fails: false,
            loaded_from: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fails: true,
            ..Self::new(ScriptedDetector::default())
        }
    }
}

impl ModelLoader for ScriptedLoader {
    type Detector = ScriptedDetector;

    async fn load(&self, model_path: &str) -> Result<ScriptedDetector, DetectorError> {
        if !self.load_time.is_zero() {
            tokio::time::sleep(self.load_time).await;
        }
        *self.loaded_from.lock().unwrap() = Some(model_path.to_owned());
        if self.fails {
            return Err(DetectorError::ModelLoad {
                path: model_path.to_owned(),
                reason: "not found".to_owned(),
            });
        }
        Ok(self.detector.clone())
    }
}

pub fn face_at(x: f64, width: f64) -> Option<FaceBox> {
    Some(FaceBox::new(x, 0.0, width, width))
}
