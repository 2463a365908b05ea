use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford's algorithm).
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}
