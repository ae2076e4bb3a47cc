use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use ffmpeg_next as ffmpeg;

use crate::config::TransportConfig;

use super::boundary::CutPolicy;
use super::muxer::SegmentWriter;
use super::source::{Read, StreamSource};
use super::IngestError;

const SEGMENT_TIME_FORMAT: &str = "%Y-%m-%d %H_%M_%S";

/// Everything the pump needs, resolved before any resource is acquired.
pub struct RecordOptions {
    pub url: String,
    pub auth_header: String,
    pub output_dir: PathBuf,
    pub split_duration: f64,
    pub max_overrun_secs: Option<f64>,
    pub transport: TransportConfig,
    pub verbosity: u8,
}

/// Single-threaded ingest pump. Reads packets from the live stream and
/// remuxes them into fixed-duration MP4 segments cut on keyframes, one
/// segment open at a time. Shutdown is cooperative: the flag is checked
/// once per packet and the segment in progress is always finalized.
pub struct Recorder {
    source: StreamSource,
    policy: CutPolicy,
    split_ticks: i64,
    output_dir: PathBuf,
    dump_layout: bool,
    shutdown: Arc<AtomicBool>,
}

impl Recorder {
    /// Open the stream and resolve segmentation parameters. Open, probe,
    /// or video stream selection failure is fatal: an unreachable or
    /// malformed source cannot be partially recovered from.
    pub fn open(options: RecordOptions, shutdown: Arc<AtomicBool>) -> Result<Self, IngestError> {
        ffmpeg::init().map_err(IngestError::Init)?;
        ffmpeg::log::set_level(demuxer_log_level(options.verbosity));

        let source = StreamSource::open(&options.url, &options.auth_header, &options.transport)?;
        if options.verbosity >= 1 {
            source.dump_layout(&options.url);
        }

        let time_base = source.video_time_base();
        let split_ticks = seconds_to_ticks(options.split_duration, time_base);
        let max_overrun = options
            .max_overrun_secs
            .map(|secs| seconds_to_ticks(secs, time_base));
        let policy = CutPolicy::new(source.video_stream_index(), max_overrun);

        Ok(Self {
            source,
            policy,
            split_ticks,
            output_dir: options.output_dir,
            dump_layout: options.verbosity >= 1,
            shutdown,
        })
    }

    /// Run the pump until end of stream, a fatal error, or shutdown.
    /// Returns the number of finalized segments. Every segment opened
    /// here is finalized exactly once, on every exit path.
    pub fn run(mut self) -> Result<u64, IngestError> {
        let mut packet = ffmpeg::Packet::empty();
        let mut segments = 0u64;

        // prime the pump; the first packet anchors the first segment
        match self.source.read(&mut packet)? {
            Read::Packet => {}
            Read::EndOfStream => return Ok(segments),
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            // the held packet opens this segment: its original timestamp
            // becomes the offset every later packet is rebased against
            let offset = packet.pts().or_else(|| packet.dts()).unwrap_or(0);
            let cutoff = offset + self.split_ticks;

            let path = next_segment_path(&self.output_dir, Local::now());
            tracing::info!(path = %path.display(), "writing segment");

            let mut segment =
                SegmentWriter::create(&path, &self.source, offset, self.dump_layout)?;
            segment.write(&mut packet)?;

            loop {
                // cooperative cancellation, checked once per packet
                if self.shutdown.load(Ordering::Relaxed) {
                    break;
                }

                match self.source.read(&mut packet) {
                    Ok(Read::Packet) => {}
                    Ok(Read::EndOfStream) => {
                        segment.finish()?;
                        segments += 1;
                        tracing::info!(segments, "stream ended");
                        return Ok(segments);
                    }
                    Err(e) => {
                        // the open segment still gets its trailer
                        if let Err(finish_err) = segment.finish() {
                            tracing::warn!(
                                error = %finish_err,
                                "failed to finalize segment during error cleanup"
                            );
                        }
                        return Err(e);
                    }
                }

                if self.policy.should_cut(&packet, cutoff) {
                    // the cut packet is not written here; it opens the
                    // next segment on the next outer iteration
                    break;
                }

                segment.write(&mut packet)?;
            }

            segment.finish()?;
            segments += 1;
        }

        Ok(segments)
    }
}

/// Wall-clock derived segment path. A counter suffix is appended when a
/// segment from the same second already exists, so back-to-back cuts
/// cannot overwrite each other.
fn next_segment_path(output_dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format(SEGMENT_TIME_FORMAT).to_string();
    let mut path = output_dir.join(format!("{stamp}.mp4"));
    let mut counter = 1u32;
    while path.exists() {
        path = output_dir.join(format!("{stamp} ({counter}).mp4"));
        counter += 1;
    }
    path
}

fn seconds_to_ticks(seconds: f64, time_base: ffmpeg::Rational) -> i64 {
    (seconds * f64::from(time_base.denominator()) / f64::from(time_base.numerator())) as i64
}

fn demuxer_log_level(verbosity: u8) -> ffmpeg::log::Level {
    match verbosity {
        0 => ffmpeg::log::Level::Warning,
        1 => ffmpeg::log::Level::Info,
        2 => ffmpeg::log::Level::Verbose,
        _ => ffmpeg::log::Level::Debug,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
    }

    #[test]
    fn tick_conversion_mpegts() {
        let time_base = ffmpeg::Rational::new(1, 90_000);
        assert_eq!(seconds_to_ticks(5.0, time_base), 450_000);
        assert_eq!(seconds_to_ticks(60.0, time_base), 5_400_000);
    }

    #[test]
    fn tick_conversion_millisecond_base() {
        let time_base = ffmpeg::Rational::new(1, 1_000);
        assert_eq!(seconds_to_ticks(2.5, time_base), 2_500);
    }

    #[test]
    fn segment_path_uses_wall_clock_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let path = next_segment_path(dir.path(), fixed_time());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2024-03-01 12_30_05.mp4"
        );
    }

    #[test]
    fn segment_path_avoids_same_second_collisions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2024-03-01 12_30_05.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("2024-03-01 12_30_05 (1).mp4"), b"").unwrap();

        let path = next_segment_path(dir.path(), fixed_time());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2024-03-01 12_30_05 (2).mp4"
        );
    }

    #[test]
    fn verbosity_maps_onto_demuxer_log_levels() {
        assert!(matches!(demuxer_log_level(0), ffmpeg::log::Level::Warning));
        assert!(matches!(demuxer_log_level(1), ffmpeg::log::Level::Info));
        assert!(matches!(demuxer_log_level(4), ffmpeg::log::Level::Debug));
    }
}
