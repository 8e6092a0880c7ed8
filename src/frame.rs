use opencv::prelude::*;
use opencv::{core, imgcodecs, imgproc, videoio};

/// Capture device producing the live feed.
pub struct CameraSource {
    capture: videoio::VideoCapture,
}

impl CameraSource {
    pub fn new(index: i32) -> anyhow::Result<Self> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        if !videoio::VideoCapture::is_opened(&capture)? {
            anyhow::bail!("Unable to open camera {}", index);
        }
        Ok(Self { capture })
    }

    /// Next captured frame, `None` when the device handed back an empty read.
    pub fn next_frame(&mut self) -> anyhow::Result<Option<Mat>> {
        let mut frame = Mat::default();
        self.capture.read(&mut frame)?;
        if frame.size()?.width == 0 {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

pub fn encode_jpeg(frame: &Mat) -> anyhow::Result<Vec<u8>> {
    let mut buffer: core::Vector<u8> = Default::default();
    imgcodecs::imencode_def(".jpg", frame, &mut buffer)?;
    Ok(buffer.to_vec())
}

pub fn jpeg_to_mat(data: &[u8]) -> anyhow::Result<Mat> {
    let buffer = core::Vector::<u8>::from_slice(data);
    let frame = imgcodecs::imdecode(&buffer, imgcodecs::IMREAD_COLOR)?;
    if frame.empty() {
        anyhow::bail!("Failed to decode {} byte frame", data.len());
    }
    Ok(frame)
}

pub fn convert_to_grayscale(image: &Mat) -> anyhow::Result<Mat> {
    let mut gray: Mat = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}
