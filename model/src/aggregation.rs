use crate::SensorSample;

/// Fixed-capacity accumulator that reduces a batch of samples to one average.
///
/// The buffer never holds more than `capacity` samples: the push that fills it
/// returns the average of the batch and leaves the buffer empty again.
#[derive(Clone, Debug)]
pub struct AggregationBuffer {
    samples: Vec<SensorSample>,
    capacity: usize,
}

impl AggregationBuffer {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Adds `sample`, returning the batch average once the buffer is full.
    pub fn push(&mut self, sample: SensorSample) -> Option<SensorSample> {
        self.samples.push(sample);
        if self.samples.len() < self.capacity {
            return None;
        }

        let average = self.average();
        self.samples.clear();
        Some(average)
    }

    /// Arithmetic mean of the buffered samples; both fields are 0.0 when empty.
    pub fn average(&self) -> SensorSample {
        if self.samples.is_empty() {
            return SensorSample::default();
        }

        let count = self.samples.len() as f64;
        let (temperature, pressure) = self
            .samples
            .iter()
            .fold((0.0f64, 0.0f64), |(t, p), sample| {
                (t + f64::from(sample.temperature), p + f64::from(sample.pressure))
            });

        SensorSample::new((temperature / count) as f32, (pressure / count) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_full_buffer_emits_mean_and_resets() {
        for capacity in [1usize, 2, 7, 30, 60] {
            let mut buffer = AggregationBuffer::new(capacity);
            let samples: Vec<_> = (0..capacity)
                .map(|i| SensorSample::new(15.0 + i as f32 * 0.25, 1000.0 + i as f32))
                .collect();

            let mut emitted = None;
            for (i, sample) in samples.iter().enumerate() {
                emitted = buffer.push(*sample);
                if i + 1 < capacity {
                    assert!(emitted.is_none());
                    assert_eq!(buffer.len(), i + 1);
                }
            }

            let expected_t = samples.iter().map(|s| s.temperature).sum::<f32>() / capacity as f32;
            let expected_p = samples.iter().map(|s| s.pressure).sum::<f32>() / capacity as f32;
            let average = emitted.expect("full buffer must emit an average");

            assert!(close(average.temperature, expected_t), "capacity {capacity}");
            assert!(close(average.pressure, expected_p), "capacity {capacity}");
            assert_eq!(buffer.len(), 0);
        }
    }

    #[test]
    fn test_empty_average_is_zero() {
        let buffer = AggregationBuffer::new(30);
        assert!(buffer.is_empty());
        assert_eq!(buffer.average(), SensorSample::new(0.0, 0.0));
    }

    #[test]
    fn test_second_batch_ignores_first() {
        let mut buffer = AggregationBuffer::new(2);
        buffer.push(SensorSample::new(100.0, 100.0));
        buffer.push(SensorSample::new(100.0, 100.0));

        assert!(buffer.push(SensorSample::new(10.0, 1000.0)).is_none());
        let average = buffer.push(SensorSample::new(20.0, 1010.0)).unwrap();
        assert_eq!(average, SensorSample::new(15.0, 1005.0));
    }

    #[test]
    fn test_zero_capacity_behaves_as_one() {
        let mut buffer = AggregationBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(
            buffer.push(SensorSample::new(3.0, 4.0)),
            Some(SensorSample::new(3.0, 4.0))
        );
    }
}
