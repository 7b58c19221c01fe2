//! In-memory audio decoding via Symphonia.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Channels kept after decoding; anything wider is folded down.
pub const MAX_CHANNELS: usize = 2;

/// A fully decoded clip, interleaved f32.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedClip {
    #[inline]
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode a whole file held in memory (WAV, Ogg Vorbis, FLAC, MP3).
pub fn decode_clip(bytes: Vec<u8>) -> Result<DecodedClip> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(&Hint::new(), mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("unrecognised audio format: {e}")))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("no audio track".into()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("codec init failed: {e}")))?;

    let mut sample_rate = params.sample_rate.unwrap_or(0);
    let mut source_channels = params.channels.map(|c| c.count()).unwrap_or(0);
    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                warn!(error = %msg, "skipping corrupted packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if decoded.frames() == 0 {
            continue;
        }

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        source_channels = spec.channels.count();

        let needed = decoded.capacity() * source_channels;
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    if interleaved.is_empty() || source_channels == 0 || sample_rate == 0 {
        return Err(Error::Decode("clip contains no audio".into()));
    }

    let clip = fold_channels(interleaved, source_channels, sample_rate);
    debug!(
        sample_rate = clip.sample_rate,
        channels = clip.channels,
        frames = clip.frames(),
        "decoded clip"
    );
    Ok(clip)
}

/// Keep mono and stereo as they are, fold wider layouts to stereo by
/// averaging odd and even channels.
fn fold_channels(samples: Vec<f32>, channels: usize, sample_rate: u32) -> DecodedClip {
    if channels <= MAX_CHANNELS {
        return DecodedClip { samples, channels, sample_rate };
    }

    let folded = samples
        .chunks_exact(channels)
        .flat_map(|frame| {
            let (mut l, mut r, mut nl, mut nr) = (0.0f32, 0.0f32, 0usize, 0usize);
            for (ch, s) in frame.iter().enumerate() {
                if ch % 2 == 0 {
                    l += s;
                    nl += 1;
                } else {
                    r += s;
                    nr += 1;
                }
            }
            [l / nl as f32, r / nr.max(1) as f32]
        })
        .collect();

    DecodedClip {
        samples: folded,
        channels: MAX_CHANNELS,
        sample_rate,
    }
}
