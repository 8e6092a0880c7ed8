use std::future::Future;
use std::sync::Arc;

use opencv::core::Vector;
use opencv::prelude::*;
use opencv::types::VectorOfRect;
use opencv::{core, objdetect, types};
use thiserror::Error;

use crate::frame::convert_to_grayscale;
use crate::instruction::FaceBox;
use crate::pool::{WorkerPool, DEFAULT_DETECTOR_WORKERS};

pub const DEFAULT_CASCADE_PATH: &str = "haarcascades/haarcascade_frontalface_alt.xml";

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Failed to load face model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("OpenCV error {0:?}")]
    OpenCv(#[from] opencv::Error),
    #[error("Frame preparation failed {0}")]
    Frame(#[from] anyhow::Error),
    #[error("Detection worker failed {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("All detection workers are busy")]
    Busy,
}

/// Parameters for single face detection mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionOptions {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    /// Smallest face side considered, in pixels.
    pub min_face_size: i32,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 2,
            min_face_size: 30,
        }
    }
}

/// Finds at most one face in a frame.
pub trait FaceDetection: Send + Sync + 'static {
    type Frame: Send + 'static;

    fn detect_single_face(
        &self,
        frame: Self::Frame,
        options: DetectionOptions,
    ) -> impl Future<Output = Result<Option<FaceBox>, DetectorError>> + Send;
}

/// Produces a ready detector from a model resource.
pub trait ModelLoader: Send + Sync {
    type Detector: FaceDetection;

    fn load(
        &self,
        model_path: &str,
    ) -> impl Future<Output = Result<Self::Detector, DetectorError>> + Send;
}

/// Loads Haar cascades through OpenCV's data search path.
#[derive(Debug, Clone, Copy)]
pub struct CascadeModel {
    /// Detections allowed to run at the same time, each on its own classifier.
    pub workers: usize,
}

impl Default for CascadeModel {
    fn default() -> Self {
        Self {
            workers: DEFAULT_DETECTOR_WORKERS,
        }
    }
}

impl ModelLoader for CascadeModel {
    type Detector = CascadeFaceDetector;

    async fn load(&self, model_path: &str) -> Result<CascadeFaceDetector, DetectorError> {
        let path = model_path.to_owned();
        let workers = self.workers;
        tokio::task::spawn_blocking(move || CascadeFaceDetector::new(&path, workers)).await?
    }
}

/// Haar cascade detector. Overlapping detections each get their own classifier,
/// up to the worker count; past that a detection is refused, never queued.
pub struct CascadeFaceDetector {
    classifiers: Arc<WorkerPool<objdetect::CascadeClassifier>>,
}

impl CascadeFaceDetector {
    pub fn new(model_path: &str, workers: usize) -> Result<Self, DetectorError> {
        let xml = resolve_cascade(model_path)?;
        let first = load_cascade(model_path, &xml)?;
        let model_path = model_path.to_owned();
        let classifiers = WorkerPool::with_worker(workers, first, move || {
            load_cascade(&model_path, &xml)
        });
        Ok(Self {
            classifiers: Arc::new(classifiers),
        })
    }
}

fn model_load_error(path: &str, reason: String) -> DetectorError {
    DetectorError::ModelLoad {
        path: path.to_owned(),
        reason,
    }
}

fn resolve_cascade(model_path: &str) -> Result<String, DetectorError> {
    core::find_file_def(model_path).map_err(|e| model_load_error(model_path, e.message))
}

fn load_cascade(model_path: &str, xml: &str) -> Result<objdetect::CascadeClassifier, DetectorError> {
    let classifier =
        objdetect::CascadeClassifier::new(xml).map_err(|e| model_load_error(model_path, e.message))?;
    if classifier.empty()? {
        return Err(model_load_error(model_path, "cascade is empty".to_owned()));
    }
    Ok(classifier)
}

impl FaceDetection for CascadeFaceDetector {
    type Frame = Mat;

    async fn detect_single_face(
        &self,
        frame: Mat,
        options: DetectionOptions,
    ) -> Result<Option<FaceBox>, DetectorError> {
        self.classifiers
            .run(move |classifier| {
                let frame_grayscale = convert_to_grayscale(&frame)?;
                let faces = detect_faces(classifier, &frame_grayscale, &options)?;
                Ok(find_largest_face(&faces).map(FaceBox::from))
            })
            .await
    }
}

fn detect_faces(
    classifier: &mut objdetect::CascadeClassifier,
    image: &Mat,
    options: &DetectionOptions,
) -> Result<VectorOfRect, DetectorError> {
    let mut faces = types::VectorOfRect::new();

    classifier.detect_multi_scale(
        image,
        &mut faces,
        options.scale_factor,
        options.min_neighbors,
        objdetect::CASCADE_SCALE_IMAGE,
        core::Size {
            width: options.min_face_size,
            height: options.min_face_size,
        },
        core::Size {
            width: 0,
            height: 0,
        },
    )?;
    Ok(faces)
}

pub fn find_largest_face(faces: &Vector<core::Rect>) -> Option<core::Rect> {
    faces
        .into_iter()
        .max_by(|a, b| (a.height * a.width).cmp(&(b.height * b.width)))
}
