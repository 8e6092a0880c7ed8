pub mod controller;
pub mod detector;
pub mod frame;
pub mod instruction;
pub mod pool;
pub mod surface;
pub mod transport;
pub mod zenoh_surface;

pub use controller::{CenteringGuide, GuideConfig, PollingHandle, TickOutcome};
pub use detector::{
    CascadeFaceDetector, CascadeModel, DetectionOptions, DetectorError, FaceDetection, ModelLoader,
};
pub use frame::{convert_to_grayscale, encode_jpeg, jpeg_to_mat, CameraSource};
pub use instruction::{FaceBox, Instruction, CENTERING_TOLERANCE};
pub use pool::WorkerPool;
pub use surface::{FeedFrame, GuideSurface, InstructionLabel};
pub use transport::{ErrorWrapper, TransportArgs};
pub use zenoh_surface::{SurfaceKeys, ZenohSurface};
