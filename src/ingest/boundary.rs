use ffmpeg_next as ffmpeg;

/// Decides whether a packet is a valid point to cut the stream.
///
/// A valid cut is a keyframe on the primary video stream at or past the
/// cutoff; cutting anywhere else would start the next segment on a frame
/// that cannot be decoded on its own. Waiting for the keyframe may push a
/// segment past its target duration. `max_overrun` optionally bounds that
/// growth by accepting any primary-video packet once the allowance is
/// spent.
pub struct CutPolicy {
    video_stream_index: usize,
    max_overrun: Option<i64>,
}

impl CutPolicy {
    pub fn new(video_stream_index: usize, max_overrun: Option<i64>) -> Self {
        Self {
            video_stream_index,
            max_overrun,
        }
    }

    /// True when `packet` should open the next segment. `cutoff` is in
    /// primary-video-stream ticks and compared against the packet's
    /// pre-rebase timestamp; the comparison is inclusive. Pure: all
    /// segment state lives with the caller.
    pub fn should_cut(&self, packet: &ffmpeg::Packet, cutoff: i64) -> bool {
        if packet.stream() != self.video_stream_index {
            return false;
        }
        let Some(pts) = packet.pts() else {
            return false;
        };
        if packet.is_key() && pts >= cutoff {
            return true;
        }
        match self.max_overrun {
            Some(overrun) => pts >= cutoff + overrun,
            None => false,
        }
    }
}
