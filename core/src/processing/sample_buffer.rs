use crate::prelude::{StageError, StageResult};
use crate::wire::SampleFrame;
use num_complex::Complex64;
use std::collections::VecDeque;

/// Bounded FIFO of raw I/Q samples for both receive channels.
///
/// Both channels always hold the same number of samples so they stay time
/// aligned; the oldest samples are dropped once `capacity` is exceeded.
pub struct RawSampleBuffer {
    channels: [VecDeque<Complex64>; 2],
    capacity: usize,
}

impl RawSampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: [
                VecDeque::with_capacity(capacity),
                VecDeque::with_capacity(capacity),
            ],
            capacity,
        }
    }

    /// Appends a decoded frame, trimming from the front past capacity.
    pub fn push(&mut self, frame: &SampleFrame) {
        self.extend(&frame.channels[0], &frame.channels[1]);
    }

    pub fn extend(&mut self, first: &[Complex64], second: &[Complex64]) {
        let count = first.len().min(second.len());
        self.channels[0].extend(&first[..count]);
        self.channels[1].extend(&second[..count]);
        for channel in self.channels.iter_mut() {
            let excess = channel.len().saturating_sub(self.capacity);
            channel.drain(..excess);
        }
    }

    /// Samples held per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len().min(self.channels[1].len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies out the most recent `capacity` samples of each channel.
    pub fn snapshot(&self) -> StageResult<[Vec<Complex64>; 2]> {
        if self.capacity == 0 || !self.is_full() {
            return Err(StageError::InsufficientData {
                have: self.len(),
                need: self.capacity,
            });
        }
        let copy = |channel: &VecDeque<Complex64>| -> Vec<Complex64> {
            channel
                .iter()
                .skip(channel.len() - self.capacity)
                .copied()
                .collect()
        };
        Ok([copy(&self.channels[0]), copy(&self.channels[1])])
    }

    pub fn clear(&mut self) {
        self.channels.iter_mut().for_each(VecDeque::clear);
    }
}
