//! Synthetic sensor stream for demos and tests
//!
//! Random walk over CO2, temperature and humidity with physical bounds, plus
//! an AQI proxy derived from CO2 and temperature.

use super::row::FeatureRow;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Standard normal sample via Box-Muller
pub fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-10);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Seeded random-walk generator
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    seed: u64,
    start: DateTime<Utc>,
    interval: Duration,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            interval: Duration::minutes(5),
        }
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Generate `n` chronologically ordered rows
    pub fn generate(&self, n: usize) -> Vec<FeatureRow> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut co2 = 400.0_f64;
        let mut temp = 25.0_f64;
        let mut hum = 50.0_f64;

        (0..n)
            .map(|i| {
                co2 = (co2 + 5.0 * gaussian(&mut rng)).clamp(400.0, 2000.0);
                temp = (temp + 0.1 * gaussian(&mut rng)).clamp(15.0, 35.0);
                hum = (hum + 0.5 * gaussian(&mut rng)).clamp(30.0, 90.0);
                let aqi = (co2 - 400.0) / 10.0 + (temp - 25.0) * 2.0;

                FeatureRow::new(self.start + self.interval * i as i32)
                    .with("co2_ppm", co2)
                    .with("temperature", temp)
                    .with("humidity", hum)
                    .with("aqi", aqi)
            })
            .collect()
    }
}
