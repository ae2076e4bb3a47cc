use ffmpeg_next as ffmpeg;

use ffmpeg::{format, media};

use crate::config::TransportConfig;

use super::IngestError;

/// Outcome of one blocking read from the demuxer.
pub enum Read {
    Packet,
    EndOfStream,
}

/// Open input connection for the live stream plus its demuxing state:
/// the elementary stream layout and the primary video stream driving
/// segmentation.
pub struct StreamSource {
    input: format::context::Input,
    video_stream_index: usize,
    video_time_base: ffmpeg::Rational,
}

impl StreamSource {
    /// Open and probe the stream. Reload attempts and the socket read
    /// timeout are bounded up front so a stalled upstream can neither
    /// block forever nor retry forever; the read loop itself never
    /// retries. Any failure here is fatal to the run.
    pub fn open(
        url: &str,
        auth_header: &str,
        transport: &TransportConfig,
    ) -> Result<Self, IngestError> {
        let mut options = ffmpeg::Dictionary::new();
        options.set("headers", auth_header);
        options.set("max_reload", &transport.max_reload.to_string());
        options.set("rw_timeout", &transport.read_timeout_us.to_string());

        let input = format::input_with_dictionary(&url, options).map_err(IngestError::Open)?;

        let (video_stream_index, video_time_base) = {
            let video = input
                .streams()
                .best(media::Type::Video)
                .ok_or(IngestError::NoVideoStream)?;
            (video.index(), video.time_base())
        };

        Ok(Self {
            input,
            video_stream_index,
            video_time_base,
        })
    }

    pub fn video_stream_index(&self) -> usize {
        self.video_stream_index
    }

    pub fn video_time_base(&self) -> ffmpeg::Rational {
        self.video_time_base
    }

    pub(super) fn streams(&self) -> impl Iterator<Item = ffmpeg::Stream<'_>> + '_ {
        self.input.streams()
    }

    /// Blocking read of the next packet in arrival order across all
    /// elementary streams. Transport errors surface here after the
    /// configured reload attempts are exhausted.
    pub fn read(&mut self, packet: &mut ffmpeg::Packet) -> Result<Read, IngestError> {
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Read::Packet),
            Err(ffmpeg::Error::Eof) => Ok(Read::EndOfStream),
            Err(e) => Err(IngestError::Read(e)),
        }
    }

    /// Dump the demuxer's view of the stream layout to stderr.
    pub fn dump_layout(&self, url: &str) {
        format::context::input::dump(&self.input, 0, Some(url));
    }
}
