use std::fs;
use std::path::{Path, PathBuf};

use crate::media::domain::frame_source::{AcquisitionError, FrameSource};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

enum Mode {
    /// A single file that an external capture process keeps overwriting.
    Snapshot(PathBuf),
    /// A directory of frames replayed in name order, looping at the end.
    Sequence { files: Vec<PathBuf>, next: usize },
}

/// Adapts image files on disk to the [`FrameSource`] interface.
///
/// A file that is missing or only partially written decodes to a zero-size
/// frame, which the sampling loop treats as "not ready yet".
pub struct SnapshotFileSource {
    path: PathBuf,
    mode: Option<Mode>,
    captured: usize,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: None,
            captured: 0,
        }
    }

    fn next_path(&mut self) -> Option<PathBuf> {
        match self.mode.as_mut()? {
            Mode::Snapshot(path) => Some(path.clone()),
            Mode::Sequence { files, next } => {
                let path = files.get(*next)?.clone();
                *next = (*next + 1) % files.len();
                Some(path)
            }
        }
    }
}

impl FrameSource for SnapshotFileSource {
    fn open(&mut self) -> Result<(), AcquisitionError> {
        if self.path.is_dir() {
            let files = list_images(&self.path)
                .map_err(|e| AcquisitionError::Open(format!("{}: {e}", self.path.display())))?;
            if files.is_empty() {
                return Err(AcquisitionError::Unavailable(format!(
                    "no image files in {}",
                    self.path.display()
                )));
            }
            log::info!(
                "Replaying {} frames from {}",
                files.len(),
                self.path.display()
            );
            self.mode = Some(Mode::Sequence { files, next: 0 });
        } else if self.path.exists() || parent_is_dir(&self.path) {
            // The snapshot file itself may not exist yet; the capture process
            // creates it once the camera is producing frames.
            self.mode = Some(Mode::Snapshot(self.path.clone()));
        } else {
            return Err(AcquisitionError::Unavailable(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        let path = self.next_path().ok_or("SnapshotFileSource: not opened")?;
        let index = self.captured;
        self.captured += 1;

        match decode_rgb(&path, index) {
            Some(frame) => Ok(frame),
            None => {
                log::debug!("{} is not decodable yet", path.display());
                Ok(Frame::empty(index))
            }
        }
    }

    fn close(&mut self) {
        self.mode = None;
    }
}

fn decode_rgb(path: &Path, index: usize) -> Option<Frame> {
    let bytes = fs::read(path).ok()?;
    let rgb = image::load_from_memory(&bytes).ok()?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Some(Frame::new(rgb.into_raw(), width, height, 3, index))
}

/// A bare file name counts as living in the current directory.
fn parent_is_dir(path: &Path) -> bool {
    path.parent()
        .is_some_and(|p| p.as_os_str().is_empty() || p.is_dir())
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_image(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb(rgb);
        }
        img.save(path).unwrap();
    }

    #[test]
    fn test_snapshot_capture_reads_current_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.png");
        write_test_image(&path, 8, 6, [50, 100, 200]);

        let mut source = SnapshotFileSource::new(&path);
        source.open().unwrap();
        let first = source.capture().unwrap();
        assert!(first.is_decodable());
        assert_eq!((first.width(), first.height()), (8, 6));
        assert_eq!(&first.data()[..3], &[50, 100, 200]);

        write_test_image(&path, 8, 6, [1, 2, 3]);
        let second = source.capture().unwrap();
        assert_eq!(&second.data()[..3], &[1, 2, 3]);
        assert_eq!(second.index(), 1);
    }

    #[test]
    fn test_missing_snapshot_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = SnapshotFileSource::new(dir.path().join("not-yet.png"));
        source.open().unwrap();

        let frame = source.capture().unwrap();
        assert!(!frame.is_decodable());
    }

    #[test]
    fn test_truncated_snapshot_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.png");
        fs::write(&path, b"\x89PNG\r\n").unwrap();

        let mut source = SnapshotFileSource::new(&path);
        source.open().unwrap();
        assert!(!source.capture().unwrap().is_decodable());
    }

    #[test]
    fn test_open_fails_for_missing_parent() {
        let mut source = SnapshotFileSource::new("/nonexistent/dir/latest.png");
        let err = source.open().unwrap_err();
        assert!(matches!(err, AcquisitionError::Unavailable(_)));
    }

    #[test]
    fn test_sequence_replays_in_name_order_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_test_image(&dir.path().join("b.png"), 4, 4, [2, 2, 2]);
        write_test_image(&dir.path().join("a.png"), 4, 4, [1, 1, 1]);
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = SnapshotFileSource::new(dir.path());
        source.open().unwrap();

        let firsts: Vec<u8> = (0..3)
            .map(|_| source.capture().unwrap().data()[0])
            .collect();
        assert_eq!(firsts, vec![1, 2, 1]);
    }

    #[test]
    fn test_empty_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = SnapshotFileSource::new(dir.path());
        assert!(matches!(
            source.open(),
            Err(AcquisitionError::Unavailable(_))
        ));
    }

    #[test]
    fn test_capture_without_open_errors() {
        let mut source = SnapshotFileSource::new("frame.png");
        assert!(source.capture().is_err());
    }
}
