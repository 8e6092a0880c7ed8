use std::fmt;

/// Half-width of the dead zone around the image center, in pixels.
pub const CENTERING_TOLERANCE: f64 = 30.0;

/// Bounding box of a detected face in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn horizontal_center(&self) -> f64 {
        self.x + self.width / 2.0
    }
}

impl From<opencv::core::Rect> for FaceBox {
    fn from(rect: opencv::core::Rect) -> Self {
        Self::new(
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        )
    }
}

/// What the user is told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    MoveRight,
    MoveLeft,
    Centered,
    NoFaceDetected,
}

impl Instruction {
    /// Decides the instruction for one detection result.
    ///
    /// Comparisons are strict, so a face center sitting exactly on either edge
    /// of the dead zone counts as centered.
    pub fn for_face(face: Option<FaceBox>, image_width: u32, tolerance: f64) -> Self {
        let Some(face) = face else {
            return Instruction::NoFaceDetected;
        };
        let face_center = face.horizontal_center();
        let image_center = image_width as f64 / 2.0;

        if face_center < image_center - tolerance {
            Instruction::MoveRight
        } else if face_center > image_center + tolerance {
            Instruction::MoveLeft
        } else {
            Instruction::Centered
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Instruction::MoveRight => "Move Right",
            Instruction::MoveLeft => "Move Left",
            Instruction::Centered => "Centered",
            Instruction::NoFaceDetected => "No face detected",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
