use thiserror::Error;

use crate::shared::frame::Frame;

/// The live media source could not be acquired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
    #[error("failed to open frame source: {0}")]
    Open(String),
}

/// A pollable live frame source.
///
/// `capture` returns the most recent picture. Before the source produces
/// decodable pixels it may return a zero-size frame (see
/// [`Frame::is_decodable`]); that is not an error.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), AcquisitionError>;

    fn capture(&mut self) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Releases any resources held by the source.
    fn close(&mut self) {}
}
