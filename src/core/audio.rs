//! Audio frame type shared by the room transport, recognizer and synthesizer.
//!
//! All audio inside the agent is PCM 16-bit signed, interleaved by channel.

/// Duration of one outbound frame produced by the synthesizer adapters.
pub const FRAME_DURATION_MS: u32 = 20;

/// A block of interleaved PCM samples.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioFrame {
    /// Interleaved 16-bit samples
    pub data: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub num_channels: u32,
}

impl AudioFrame {
    pub fn new(data: Vec<i16>, sample_rate: u32, num_channels: u32) -> Self {
        Self {
            data,
            sample_rate,
            num_channels,
        }
    }

    /// Build a frame from little-endian PCM bytes. A trailing odd byte is ignored.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32, num_channels: u32) -> Self {
        let data = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(data, sample_rate, num_channels)
    }

    /// Serialize samples as little-endian PCM bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 2);
        for sample in &self.data {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn samples_per_channel(&self) -> u32 {
        if self.num_channels == 0 {
            return 0;
        }
        self.data.len() as u32 / self.num_channels
    }

    /// Duration of the frame in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        u64::from(self.samples_per_channel()) * 1000 / u64::from(self.sample_rate)
    }

    /// Root-mean-square energy normalized to 0.0..=1.0.
    pub fn rms_energy(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum_squares: f32 = self
            .data
            .iter()
            .map(|s| {
                let v = f32::from(*s) / 32768.0;
                v * v
            })
            .sum();
        (sum_squares / self.data.len() as f32).sqrt()
    }
}

/// Number of interleaved samples in one [`FRAME_DURATION_MS`] frame.
pub fn samples_per_frame(sample_rate: u32, num_channels: u32) -> usize {
    (sample_rate as usize * FRAME_DURATION_MS as usize / 1000) * num_channels as usize
}
