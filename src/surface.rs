use std::future::Future;
use tokio::sync::watch;

use crate::instruction::Instruction;

/// The four touchpoints the guide needs from whatever shows the feed to the user.
pub trait GuideSurface: Send + Sync + 'static {
    /// Pixel content handed to the detector.
    type Frame: Send + 'static;

    /// Resolves once the user asks to start.
    fn wait_for_start(&self) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Makes the feed visible.
    fn show_feed(&self) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Current state of the feed image.
    fn read_feed_frame(&self) -> FeedFrame<Self::Frame>;

    /// Overwrites the instruction shown to the user.
    fn set_instruction(&self, instruction: Instruction);
}

/// Snapshot of the feed image at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedFrame<F> {
    pub complete: bool,
    pub natural_width: u32,
    pub content: Option<F>,
}

impl<F> FeedFrame<F> {
    /// Nothing has finished loading yet.
    pub fn not_loaded() -> Self {
        Self {
            complete: false,
            natural_width: 0,
            content: None,
        }
    }

    pub fn loaded(content: F, natural_width: u32) -> Self {
        Self {
            complete: true,
            natural_width,
            content: Some(content),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.complete && self.natural_width > 0 && self.content.is_some()
    }

    /// Content and width, only when the frame is ready for detection.
    pub fn into_ready(self) -> Option<(F, u32)> {
        if !self.is_ready() {
            return None;
        }
        let width = self.natural_width;
        self.content.map(|content| (content, width))
    }
}

/// The single instruction text shown to the user.
///
/// Every write replaces the previous value, observers only ever see the latest one.
#[derive(Debug, Clone)]
pub struct InstructionLabel {
    sender: watch::Sender<Option<Instruction>>,
}

impl Default for InstructionLabel {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionLabel {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn set(&self, instruction: Instruction) {
        self.sender.send_replace(Some(instruction));
    }

    pub fn current(&self) -> Option<Instruction> {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Instruction>> {
        self.sender.subscribe()
    }
}
