use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use ffmpeg::format;

use super::source::StreamSource;
use super::IngestError;

/// One open output container. Declares one output stream per input stream
/// with codec parameters copied verbatim (no re-encoding), rebases packets
/// onto the segment-local timeline as they are written, and finalizes the
/// file with `finish`. A writer that is dropped without `finish` (an error
/// path) still writes its trailer, so no exit path leaves a truncated
/// file behind.
pub struct SegmentWriter {
    output: format::context::Output,
    path: PathBuf,
    pts_offset: i64,
    time_bases: Vec<(ffmpeg::Rational, ffmpeg::Rational)>,
    finalized: bool,
}

impl SegmentWriter {
    /// Create the output container and write its header. `pts_offset` is
    /// the first packet's original timestamp; it anchors the segment so
    /// playback starts at time zero.
    pub fn create(
        path: &Path,
        source: &StreamSource,
        pts_offset: i64,
        dump_layout: bool,
    ) -> Result<Self, IngestError> {
        let create_err = |source: ffmpeg::Error| IngestError::SegmentCreate {
            path: path.to_path_buf(),
            source,
        };

        let mut output = format::output(&path).map_err(create_err)?;

        for stream in source.streams() {
            let mut ost = output
                .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
                .map_err(create_err)?;
            ost.set_parameters(stream.parameters());
            // the source container's codec tag does not carry over to mp4
            unsafe {
                (*ost.parameters().as_mut_ptr()).codec_tag = 0;
            }
        }

        if dump_layout {
            format::context::output::dump(&output, 0, path.to_str());
        }

        output.write_header().map_err(create_err)?;

        // output time bases are only final once the header is written
        let time_bases = source
            .streams()
            .zip(output.streams())
            .map(|(ist, ost)| (ist.time_base(), ost.time_base()))
            .collect();

        Ok(Self {
            output,
            path: path.to_path_buf(),
            pts_offset,
            time_bases,
            finalized: false,
        })
    }

    /// Rebase the packet onto the segment-local timeline, rescale it into
    /// the output stream's time base (preserving presentation time, not
    /// tick count), and hand it to the interleaved container writer.
    pub fn write(&mut self, packet: &mut ffmpeg::Packet) -> Result<(), IngestError> {
        let (src_time_base, dst_time_base) = self.time_bases[packet.stream()];

        packet.set_pts(rebase(packet.pts(), self.pts_offset));
        packet.set_dts(rebase(packet.dts(), self.pts_offset));
        packet.rescale_ts(src_time_base, dst_time_base);
        // byte position in the source container is meaningless here
        packet.set_position(-1);

        packet
            .write_interleaved(&mut self.output)
            .map_err(|source| IngestError::SegmentWrite {
                path: self.path.clone(),
                source,
            })
    }

    /// Write the trailer and close the file. Mandatory: without the
    /// trailer the output is not a valid, playable container.
    pub fn finish(mut self) -> Result<(), IngestError> {
        self.finalized = true;
        self.output
            .write_trailer()
            .map_err(|source| IngestError::SegmentFinish {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.output.write_trailer() {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to finalize abandoned segment"
                );
            }
        }
    }
}

fn rebase(timestamp: Option<i64>, offset: i64) -> Option<i64> {
    timestamp.map(|timestamp| timestamp - offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg::Rescale;

    #[test]
    fn first_packet_rebases_to_zero() {
        assert_eq!(rebase(Some(123_456), 123_456), Some(0));
    }

    #[test]
    fn rebase_keeps_missing_timestamps_missing() {
        assert_eq!(rebase(None, 123_456), None);
    }

    #[test]
    fn rebase_preserves_pts_dts_distance() {
        let pts = rebase(Some(900_000), 450_000);
        let dts = rebase(Some(897_000), 450_000);
        assert_eq!(pts, Some(450_000));
        assert_eq!(dts, Some(447_000));
    }

    #[test]
    fn rescale_round_trips_within_one_coarse_tick() {
        let fine = ffmpeg::Rational::new(1, 90_000);
        let coarse = ffmpeg::Rational::new(1, 1_000);
        // one coarse tick expressed in fine ticks
        let tolerance = i64::from(fine.denominator() / coarse.denominator());

        for ts in [0i64, 1, 89_999, 90_000, 123_456_789] {
            let there = ts.rescale(fine, coarse);
            let back = there.rescale(coarse, fine);
            assert!(
                (ts - back).abs() <= tolerance,
                "{ts} -> {there} -> {back} drifted more than {tolerance}"
            );
        }
    }

    #[test]
    fn rescale_preserves_presentation_time() {
        let fine = ffmpeg::Rational::new(1, 90_000);
        let coarse = ffmpeg::Rational::new(1, 1_000);
        // 5 seconds is 450_000 fine ticks and 5_000 coarse ticks
        assert_eq!(450_000i64.rescale(fine, coarse), 5_000);
    }
}
