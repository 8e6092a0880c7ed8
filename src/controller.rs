use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{debug, error, info, warn};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::detector::{
    DetectionOptions, DetectorError, FaceDetection, ModelLoader, DEFAULT_CASCADE_PATH,
};
use crate::instruction::{Instruction, CENTERING_TOLERANCE};
use crate::surface::GuideSurface;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct GuideConfig {
    pub model_path: String,
    pub tick_interval: Duration,
    /// Dead zone half-width in pixels.
    pub tolerance: f64,
    pub detection: DetectionOptions,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_CASCADE_PATH.to_owned(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            tolerance: CENTERING_TOLERANCE,
            detection: DetectionOptions::default(),
        }
    }
}

/// Result of a single detection tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Feed image was not ready, nothing was touched.
    Skipped,
    Updated(Instruction),
    /// Detector failed or had no free worker, the label keeps its previous value.
    Failed,
}

/// Guides the user towards the horizontal center of the feed.
pub struct CenteringGuide<S> {
    surface: Arc<S>,
    config: GuideConfig,
}

impl<S: GuideSurface> CenteringGuide<S> {
    pub fn new(surface: S, config: GuideConfig) -> Self {
        Self {
            surface: Arc::new(surface),
            config,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Waits for the start trigger, then activates.
    pub async fn run<L>(&self, loader: &L) -> anyhow::Result<PollingHandle>
    where
        L: ModelLoader,
        L::Detector: FaceDetection<Frame = S::Frame>,
    {
        self.surface
            .wait_for_start()
            .await
            .context("Waiting for start")?;
        info!("Start requested");
        self.activate(loader).await
    }

    /// Shows the feed, loads the model and starts polling.
    ///
    /// Polling only starts once the model is loaded. A load failure is returned
    /// and nothing is polled.
    pub async fn activate<L>(&self, loader: &L) -> anyhow::Result<PollingHandle>
    where
        L: ModelLoader,
        L::Detector: FaceDetection<Frame = S::Frame>,
    {
        anyhow::ensure!(
            !self.config.tick_interval.is_zero(),
            "Tick interval must be longer than zero"
        );
        self.surface.show_feed().await.context("Showing feed")?;

        let detector = loader
            .load(&self.config.model_path)
            .await
            .with_context(|| format!("Loading face model {}", self.config.model_path))?;
        info!("Face model loaded from {}", self.config.model_path);

        let (stop_sender, stop_receiver) = oneshot::channel();
        let task = tokio::spawn(poll_feed(
            self.surface.clone(),
            Arc::new(detector),
            self.config.clone(),
            stop_receiver,
        ));
        info!(
            "Polling feed every {} ms",
            self.config.tick_interval.as_millis()
        );

        Ok(PollingHandle {
            stop: Some(stop_sender),
            task: Some(task),
        })
    }
}

/// Owns the polling loop. Dropping it cancels polling and any in flight ticks.
pub struct PollingHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollingHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops polling and waits for the loop to wind down.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if err.is_panic() {
                    error!("Polling loop panicked {:?}", err);
                }
            }
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_feed<S, D>(
    surface: Arc<S>,
    detector: Arc<D>,
    config: GuideConfig,
    mut stop: oneshot::Receiver<()>,
) where
    S: GuideSurface,
    D: FaceDetection<Frame = S::Frame>,
{
    let mut ticker = time::interval_at(Instant::now() + config.tick_interval, config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // ticks run side by side, the label keeps whichever resolves last
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                in_flight.spawn(detection_tick(
                    surface.clone(),
                    detector.clone(),
                    config.detection,
                    config.tolerance,
                ));
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        error!("Detection tick panicked {:?}", err);
                    }
                }
            }
        }
    }

    in_flight.shutdown().await;
    info!("Stopped polling feed");
}

/// One poll of the feed: check readiness, detect, update the label.
pub async fn detection_tick<S, D>(
    surface: Arc<S>,
    detector: Arc<D>,
    options: DetectionOptions,
    tolerance: f64,
) -> TickOutcome
where
    S: GuideSurface,
    D: FaceDetection<Frame = S::Frame>,
{
    let Some((content, image_width)) = surface.read_feed_frame().into_ready() else {
        return TickOutcome::Skipped;
    };

    match detector.detect_single_face(content, options).await {
        Ok(face) => {
            let instruction = Instruction::for_face(face, image_width, tolerance);
            debug!("Face {:?} in {} px frame: {}", face, image_width, instruction);
            surface.set_instruction(instruction);
            TickOutcome::Updated(instruction)
        }
        Err(DetectorError::Busy) => {
            debug!("Dropping tick, all detection workers are busy");
            TickOutcome::Failed
        }
        Err(err) => {
            warn!("Face detection failed {}", err);
            TickOutcome::Failed
        }
    }
}
