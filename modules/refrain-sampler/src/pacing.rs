use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed delay inserted after every upstream request.
///
/// With a seed, up to 20% extra jitter is drawn from a seeded generator so that
/// runs are reproducible. Without one the delay is exact.
pub struct Pacer {
    delay: Duration,
    jitter: Option<Mutex<StdRng>>,
}

impl Pacer {
    pub fn new(delay: Duration, seed: Option<u64>) -> Self {
        Self {
            delay,
            jitter: seed.map(|s| Mutex::new(StdRng::seed_from_u64(s))),
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, None)
    }

    pub fn next_delay(&self) -> Duration {
        let max_extra = self.delay.as_millis() as u64 / 5;
        let extra = match &self.jitter {
            Some(rng) if max_extra > 0 => {
                let mut rng = rng.lock().unwrap_or_else(|e| e.into_inner());
                rng.random_range(0..=max_extra)
            }
            _ => 0,
        };
        self.delay + Duration::from_millis(extra)
    }

    pub async fn pause(&self) {
        let d = self.next_delay();
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseeded_delay_is_exact() {
        let p = Pacer::new(Duration::from_millis(300), None);
        assert_eq!(p.next_delay(), Duration::from_millis(300));
    }

    #[test]
    fn seeded_jitter_is_bounded_and_reproducible() {
        let a = Pacer::new(Duration::from_millis(500), Some(7));
        let b = Pacer::new(Duration::from_millis(500), Some(7));
        for _ in 0..20 {
            let da = a.next_delay();
            assert_eq!(da, b.next_delay());
            assert!(da >= Duration::from_millis(500));
            assert!(da <= Duration::from_millis(600));
        }
    }
}
