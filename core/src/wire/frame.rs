use ndarray::Array2;
use num_complex::Complex64;

/// Bytes taken by the ADC start/stop timestamps at the end of a frame.
pub const TRAILER_LEN: usize = 16;
/// Planar blocks of samples in a frame: I0, Q0, Q1, I1.
pub const BLOCKS: usize = 4;
const WORD: usize = 2;

/// One decoded binary ingest frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    /// Complex samples of both receive channels, equal length.
    pub channels: [Vec<Complex64>; 2],
    pub adc_start_us: i64,
    pub adc_stop_us: i64,
}

impl SampleFrame {
    /// Decodes a frame, or returns `None` when it cannot hold the timestamp
    /// trailer plus one sample of every block.
    ///
    /// The payload before the trailer is big-endian `u16` words laid out as
    /// four consecutive blocks of equal length. Words past the last complete
    /// group are ignored.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        if frame.len() < TRAILER_LEN {
            return None;
        }
        let (payload, trailer) = frame.split_at(frame.len() - TRAILER_LEN);
        let per_block = payload.len() / (BLOCKS * WORD);
        if per_block == 0 {
            return None;
        }

        let words: Vec<f64> = payload
            .chunks_exact(WORD)
            .take(per_block * BLOCKS)
            .map(|word| u16::from_be_bytes([word[0], word[1]]) as f64)
            .collect();
        let blocks = Array2::from_shape_vec((BLOCKS, per_block), words).ok()?;

        let pair = |i: usize, q: usize| -> Vec<Complex64> {
            blocks
                .row(i)
                .iter()
                .zip(blocks.row(q).iter())
                .map(|(&re, &im)| Complex64::new(re, im))
                .collect()
        };

        Some(Self {
            channels: [pair(0, 1), pair(3, 2)],
            adc_start_us: read_i64(&trailer[..8]),
            adc_stop_us: read_i64(&trailer[8..]),
        })
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time the ADC spent capturing this frame, in microseconds.
    pub fn adc_duration_us(&self) -> i64 {
        self.adc_stop_us - self.adc_start_us
    }
}

/// Packs four equally long blocks and the timestamp trailer the way the
/// sensor firmware does.
pub fn encode_frame(blocks: [&[u16]; BLOCKS], adc_start_us: i64, adc_stop_us: i64) -> Vec<u8> {
    let mut frame = Vec::with_capacity(blocks.iter().map(|b| b.len() * WORD).sum::<usize>() + TRAILER_LEN);
    for block in blocks {
        for word in block {
            frame.extend_from_slice(&word.to_be_bytes());
        }
    }
    frame.extend_from_slice(&adc_start_us.to_be_bytes());
    frame.extend_from_slice(&adc_stop_us.to_be_bytes());
    frame
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    i64::from_be_bytes(raw)
}
