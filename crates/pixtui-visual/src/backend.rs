#![forbid(unsafe_code)]

//! Decode backends.
//!
//! A backend turns files into [`Visual`]s, advances multi-frame media, and
//! resamples frames. Backends are chosen at start-up and used as trait
//! objects. [`NoBackend`] is always available: it cannot open anything and
//! resizes with the non-interpolative resampler. With the `image` feature,
//! `ImageBackend` decodes PNG, JPEG and GIF through the `image` crate.

use std::path::Path;

use crate::error::BackendError;
use crate::pixels::PixelBuffer;
use crate::transform::resample_nearest;
use crate::visual::Visual;

/// Result of advancing to the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A new frame replaced the visual's buffer.
    Frame,
    /// No frames remain; the visual is unchanged.
    EndOfStream,
}

/// Pluggable media decoder.
pub trait VisualBackend: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// True if [`from_file`](Self::from_file) can open still images.
    fn can_open_images(&self) -> bool;

    /// True if [`decode`](Self::decode) can advance multi-frame media.
    fn can_open_videos(&self) -> bool;

    /// Open and decode the first frame of `path`.
    fn from_file(&self, path: &Path) -> Result<Visual, BackendError>;

    /// Advance `visual` to its next frame.
    fn decode(&self, visual: &mut Visual) -> Result<DecodeStatus, BackendError>;

    /// Make sure the frame is RGBA before it is transformed in place.
    fn ensure_rgba(&self, _visual: &mut Visual) -> Result<(), BackendError> {
        Ok(())
    }

    /// Resynchronize backend state after the frame was replaced.
    fn seed(&self, _visual: &mut Visual) {}

    /// Resample `frame` to `rows × cols`.
    fn resize(&self, frame: &PixelBuffer, rows: u32, cols: u32) -> Result<PixelBuffer, BackendError>;
}

/// Backend used when no decoder is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackend;

impl VisualBackend for NoBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn can_open_images(&self) -> bool {
        false
    }

    fn can_open_videos(&self) -> bool {
        false
    }

    fn from_file(&self, _path: &Path) -> Result<Visual, BackendError> {
        Err(BackendError::CapabilityAbsent("open media files"))
    }

    fn decode(&self, _visual: &mut Visual) -> Result<DecodeStatus, BackendError> {
        Err(BackendError::CapabilityAbsent("decode frames"))
    }

    fn resize(&self, frame: &PixelBuffer, rows: u32, cols: u32) -> Result<PixelBuffer, BackendError> {
        Ok(resample_nearest(frame, rows, cols))
    }
}

/// The best backend compiled into this build.
pub fn default_backend() -> Box<dyn VisualBackend> {
    #[cfg(feature = "image")]
    {
        Box::new(image_backend::ImageBackend)
    }
    #[cfg(not(feature = "image"))]
    {
        Box::new(NoBackend)
    }
}

#[cfg(feature = "image")]
pub use image_backend::{ImageBackend, ImageDetails};

#[cfg(feature = "image")]
mod image_backend {
    use std::collections::VecDeque;
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;

    use image::codecs::gif::GifDecoder;
    use image::imageops::{self, FilterType};
    use image::{AnimationDecoder, RgbaImage};

    use super::{DecodeStatus, VisualBackend};
    use crate::error::BackendError;
    use crate::pixels::PixelBuffer;
    use crate::visual::Visual;

    /// Frames not yet shown, kept in the visual's details.
    #[derive(Debug, Default)]
    pub struct ImageDetails {
        pending: VecDeque<RgbaImage>,
    }

    impl ImageDetails {
        /// Frames left to decode.
        pub fn remaining(&self) -> usize {
            self.pending.len()
        }
    }

    fn to_buffer(img: RgbaImage) -> Result<PixelBuffer, BackendError> {
        let (cols, rows) = img.dimensions();
        PixelBuffer::from_owned(img.into_raw(), rows, cols, cols as usize * 4)
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn is_gif(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gif"))
    }

    /// Backend built on the `image` crate.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ImageBackend;

    impl VisualBackend for ImageBackend {
        fn name(&self) -> &'static str {
            "image"
        }

        fn can_open_images(&self) -> bool {
            true
        }

        fn can_open_videos(&self) -> bool {
            true
        }

        fn from_file(&self, path: &Path) -> Result<Visual, BackendError> {
            if is_gif(path) {
                let reader = BufReader::new(File::open(path)?);
                let decoder =
                    GifDecoder::new(reader).map_err(|e| BackendError::Decode(e.to_string()))?;
                let mut pending: VecDeque<RgbaImage> = decoder
                    .into_frames()
                    .collect_frames()
                    .map_err(|e| BackendError::Decode(e.to_string()))?
                    .into_iter()
                    .map(image::Frame::into_buffer)
                    .collect();
                let first = pending
                    .pop_front()
                    .ok_or_else(|| BackendError::Decode("GIF has no frames".into()))?;
                let mut visual = Visual::from_buffer(to_buffer(first)?);
                visual.set_details(Box::new(ImageDetails { pending }));
                return Ok(visual);
            }
            let img = image::open(path).map_err(|e| BackendError::Decode(e.to_string()))?;
            Ok(Visual::from_buffer(to_buffer(img.to_rgba8())?))
        }

        fn decode(&self, visual: &mut Visual) -> Result<DecodeStatus, BackendError> {
            let next = visual
                .details_mut()
                .and_then(|d| d.downcast_mut::<ImageDetails>())
                .and_then(|d| d.pending.pop_front());
            match next {
                Some(img) => {
                    visual.replace_frame(to_buffer(img)?);
                    Ok(DecodeStatus::Frame)
                }
                None => Ok(DecodeStatus::EndOfStream),
            }
        }

        fn resize(
            &self,
            frame: &PixelBuffer,
            rows: u32,
            cols: u32,
        ) -> Result<PixelBuffer, BackendError> {
            let tight = frame.crop(pixtui_core::geometry::Window::full(frame.dims()));
            let img = RgbaImage::from_raw(frame.cols(), frame.rows(), tight.as_bytes().to_vec())
                .ok_or_else(|| BackendError::Resize("frame does not match its geometry".into()))?;
            let out = imageops::resize(&img, cols, rows, FilterType::Triangle);
            to_buffer(out).map_err(|e| BackendError::Resize(e.to_string()))
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_backend_reports_capability_absent() {
        let b = NoBackend;
        assert!(!b.can_open_images());
        assert!(!b.can_open_videos());
        assert!(matches!(
            b.from_file(Path::new("cat.png")),
            Err(BackendError::CapabilityAbsent(_))
        ));
        let mut v = Visual::from_buffer(PixelBuffer::new(1, 1));
        assert!(matches!(
            b.decode(&mut v),
            Err(BackendError::CapabilityAbsent(_))
        ));
    }

    #[test]
    fn no_backend_resizes_without_interpolation() {
        let mut frame = PixelBuffer::new(1, 2);
        frame.set_pixel(0, 0, [255, 0, 0, 255]);
        frame.set_pixel(0, 1, [0, 0, 255, 255]);
        let out = NoBackend.resize(&frame, 2, 4).unwrap();
        assert_eq!(out.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(out.pixel(1, 2), Some([0, 0, 255, 255]));
    }

    #[test]
    fn default_backend_has_a_name() {
        assert!(!default_backend().name().is_empty());
    }
}
