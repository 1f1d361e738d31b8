use super::pgm;
use crate::config::SnapshotFormat;
use crate::error::ArchiveError;
use crate::frame::Frame;
use crate::region::Mask;
use std::path::Path;
use tracing::trace;

/// Save one frame as a standalone image file
///
/// PNG output can carry an outline of the mask; PGM output is always the
/// bare raster.
pub fn save_frame(
    frame: &Frame,
    path: &Path,
    format: SnapshotFormat,
    overlay: Option<&Mask>,
) -> Result<(), ArchiveError> {
    trace!("Saving frame {} to {}", frame.sequence, path.display());
    match format {
        SnapshotFormat::Pgm => pgm::write_pgm(path, frame),
        SnapshotFormat::Png => save_png(frame, path, overlay),
    }
}

#[cfg(feature = "imaging")]
fn save_png(frame: &Frame, path: &Path, overlay: Option<&Mask>) -> Result<(), ArchiveError> {
    use image::{DynamicImage, GrayImage, Rgb};
    use imageproc::drawing::draw_hollow_rect_mut;
    use imageproc::rect::Rect;

    let encode_error = |details: String| ArchiveError::Encode {
        path: path.to_path_buf(),
        details,
    };

    let gray = GrayImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
        .ok_or_else(|| encode_error("pixel buffer does not match frame size".to_string()))?;

    let result = match overlay {
        Some(mask) => {
            let mut rgb = DynamicImage::ImageLuma8(gray).to_rgb8();
            let outline = Rect::at(mask.col1 as i32, mask.row1 as i32)
                .of_size(mask.width(), mask.height());
            draw_hollow_rect_mut(&mut rgb, outline, Rgb([255u8, 0, 0]));
            rgb.save(path)
        }
        None => gray.save(path),
    };

    result.map_err(|e| encode_error(e.to_string()))
}

#[cfg(not(feature = "imaging"))]
fn save_png(_frame: &Frame, path: &Path, _overlay: Option<&Mask>) -> Result<(), ArchiveError> {
    Err(ArchiveError::Encode {
        path: path.to_path_buf(),
        details: "PNG snapshots require the `imaging` feature".to_string(),
    })
}

#[cfg(all(test, feature = "imaging"))]
mod tests {
    use super::*;

    #[test]
    fn test_png_snapshot_roundtrips_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot_0.png");
        let frame = Frame::from_pixels(3, 2, vec![0, 50, 100, 150, 200, 250]).unwrap();

        save_frame(&frame, &path, SnapshotFormat::Png, None).unwrap();

        let decoded = image::open(&path).unwrap().into_luma8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.into_raw(), frame.pixels());
    }

    #[test]
    fn test_overlay_outlines_mask() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot_1.png");
        let frame = Frame::filled(10, 8, 0);
        let mask = Mask::new(2, 3, 5, 7).unwrap();

        save_frame(&frame, &path, SnapshotFormat::Png, Some(&mask)).unwrap();

        let decoded = image::open(&path).unwrap().into_rgb8();
        assert_eq!(decoded.get_pixel(3, 2).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(7, 5).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(5, 4).0, [0, 0, 0]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0]);
    }
}
