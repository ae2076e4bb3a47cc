use std::path::PathBuf;

use ffmpeg_next as ffmpeg;
use thiserror::Error;

mod boundary;
mod muxer;
mod recorder;
mod source;

pub use recorder::{RecordOptions, Recorder};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to initialize multimedia library: {0}")]
    Init(ffmpeg::Error),
    #[error("failed to open stream: {0}")]
    Open(ffmpeg::Error),
    #[error("no video stream in source")]
    NoVideoStream,
    #[error("failed to read from stream: {0}")]
    Read(ffmpeg::Error),
    #[error("failed to create segment {}: {source}", .path.display())]
    SegmentCreate { path: PathBuf, source: ffmpeg::Error },
    #[error("failed to write to segment {}: {source}", .path.display())]
    SegmentWrite { path: PathBuf, source: ffmpeg::Error },
    #[error("failed to finalize segment {}: {source}", .path.display())]
    SegmentFinish { path: PathBuf, source: ffmpeg::Error },
}
