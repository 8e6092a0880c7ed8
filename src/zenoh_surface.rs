use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use opencv::prelude::*;
use tokio::task::JoinHandle;
use zenoh::prelude::r#async::*;

use crate::frame::jpeg_to_mat;
use crate::instruction::Instruction;
use crate::surface::{FeedFrame, GuideSurface, InstructionLabel};
use crate::transport::{
    ErrorWrapper, DEFAULT_FEED_KEY, DEFAULT_INSTRUCTION_KEY, DEFAULT_START_KEY,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceKeys {
    pub feed: String,
    pub instruction: String,
    pub start: String,
}

impl Default for SurfaceKeys {
    fn default() -> Self {
        Self {
            feed: DEFAULT_FEED_KEY.to_owned(),
            instruction: DEFAULT_INSTRUCTION_KEY.to_owned(),
            start: DEFAULT_START_KEY.to_owned(),
        }
    }
}

/// Latest frame received on the feed key.
#[derive(Default)]
pub struct FrameSlot {
    frame: Option<Mat>,
    complete: bool,
}

impl FrameSlot {
    /// Replaces the held frame with a JPEG payload.
    ///
    /// A payload that does not decode leaves the slot incomplete until the next good frame.
    pub fn accept(&mut self, payload: &[u8]) {
        match jpeg_to_mat(payload) {
            Ok(frame) => {
                self.frame = Some(frame);
                self.complete = true;
            }
            Err(err) => {
                debug!("Dropping feed frame {}", err);
                self.frame = None;
                self.complete = false;
            }
        }
    }

    pub fn snapshot(&self) -> FeedFrame<Mat> {
        let Some(frame) = self.frame.as_ref().filter(|_| self.complete) else {
            return FeedFrame::not_loaded();
        };
        match frame.try_clone() {
            Ok(content) => {
                let width = u32::try_from(content.cols()).unwrap_or_default();
                FeedFrame::loaded(content, width)
            }
            Err(err) => {
                warn!("Failed to copy feed frame {}", err);
                FeedFrame::not_loaded()
            }
        }
    }
}

/// Guide surface speaking zenoh: JPEG frames in, instruction text out.
pub struct ZenohSurface {
    session: Arc<Session>,
    keys: SurfaceKeys,
    auto_start: bool,
    feed: Arc<Mutex<FrameSlot>>,
    label: InstructionLabel,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ZenohSurface {
    pub async fn open(
        session: Arc<Session>,
        keys: SurfaceKeys,
        auto_start: bool,
    ) -> anyhow::Result<Self> {
        let publisher = session
            .declare_publisher(keys.instruction.clone())
            .congestion_control(CongestionControl::Drop)
            .priority(Priority::InteractiveHigh)
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;

        let label = InstructionLabel::new();
        let mut updates = label.subscribe();
        let forwarder = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let latest = *updates.borrow_and_update();
                let Some(instruction) = latest else {
                    continue;
                };
                if let Err(err) = publisher.put(instruction.to_string()).res().await {
                    warn!("Failed to publish instruction {:?}", err);
                }
            }
        });

        Ok(Self {
            session,
            keys,
            auto_start,
            feed: Default::default(),
            label,
            tasks: Mutex::new(vec![forwarder]),
        })
    }

    pub fn label(&self) -> &InstructionLabel {
        &self.label
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GuideSurface for ZenohSurface {
    type Frame = Mat;

    async fn wait_for_start(&self) -> anyhow::Result<()> {
        if self.auto_start {
            return Ok(());
        }
        let subscriber = self
            .session
            .declare_subscriber(self.keys.start.clone())
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;
        info!("Waiting for start on {}", self.keys.start);
        let sample = subscriber.recv_async().await?;
        debug!("Start sample on {}", sample.key_expr);
        Ok(())
    }

    async fn show_feed(&self) -> anyhow::Result<()> {
        let subscriber = self
            .session
            .declare_subscriber(self.keys.feed.clone())
            .best_effort()
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;
        info!("Showing feed from {}", self.keys.feed);

        let feed = self.feed.clone();
        let receiver = tokio::spawn(async move {
            while let Ok(sample) = subscriber.recv_async().await {
                let payload: Vec<u8> = match sample.value.try_into() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!("Unreadable feed payload {:?}", err);
                        continue;
                    }
                };
                feed.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .accept(&payload);
            }
        });
        self.tasks().push(receiver);
        Ok(())
    }

    fn read_feed_frame(&self) -> FeedFrame<Mat> {
        self.feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    fn set_instruction(&self, instruction: Instruction) {
        self.label.set(instruction);
    }
}

impl Drop for ZenohSurface {
    fn drop(&mut self) {
        for task in self.tasks().drain(..) {
            task.abort();
        }
    }
}
