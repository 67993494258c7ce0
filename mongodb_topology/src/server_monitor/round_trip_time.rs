use std::time::Duration;

/// Weight of the newest sample in the moving average.
pub const ROUND_TRIP_TIME_ALPHA: f64 = 0.2;

/// Exponentially weighted moving average of heartbeat round trip times.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundTripTime {
    average: Option<Duration>,
}

impl RoundTripTime {
    /// Folds in a new sample and returns the updated average. The first sample is taken as is.
    pub fn add_sample(&mut self, sample: Duration) -> Duration {
        let average = match self.average {
            Some(average) => {
                average.mul_f64(1.0 - ROUND_TRIP_TIME_ALPHA) + sample.mul_f64(ROUND_TRIP_TIME_ALPHA)
            }
            None => sample,
        };
        self.average = Some(average);
        average
    }

    pub fn average(&self) -> Duration {
        self.average.unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.average = None;
    }
}
