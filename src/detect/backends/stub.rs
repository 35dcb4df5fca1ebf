use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::{DetectorBackend, ModelInput};
use crate::detect::result::Detection;

/// Occupancy levels the default demo script walks through.
const DEMO_LEVELS: [usize; 10] = [0, 1, 2, 1, 0, 0, 3, 7, 4, 0];
/// Frames each demo level is held for.
const DEMO_HOLD_FRAMES: usize = 20;
const DEMO_SEED: u64 = 0x5eed;
const PERSON_LABEL: u32 = 1;

/// Stub backend for testing and `stub://` demo runs.
///
/// Replays a fixed script of per-frame detections, cycling when it reaches the
/// end. The frame content is ignored.
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    position: usize,
}

impl StubBackend {
    /// Demo script: people arrive and leave in steps, with occasional
    /// low-confidence distractors that the filter must drop.
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(DEMO_SEED);
        let mut script = Vec::with_capacity(DEMO_LEVELS.len() * DEMO_HOLD_FRAMES);
        for &level in &DEMO_LEVELS {
            for _ in 0..DEMO_HOLD_FRAMES {
                let mut frame: Vec<Detection> = (0..level)
                    .map(|slot| person_box(slot, rng.gen_range(0.6..0.99)))
                    .collect();
                if rng.gen_bool(0.2) {
                    frame.push(person_box(level, rng.gen_range(0.05..0.5)));
                }
                script.push(frame);
            }
        }
        Self::with_script(script)
    }

    pub fn with_script(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script,
            position: 0,
        }
    }

    /// Script with `counts[i]` confident people on frame `i`.
    pub fn from_counts(counts: &[usize], confidence: f32) -> Self {
        let script = counts
            .iter()
            .map(|&count| (0..count).map(|slot| person_box(slot, confidence)).collect())
            .collect();
        Self::with_script(script)
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _input: &ModelInput) -> Result<Vec<Detection>> {
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let detections = self.script[self.position % self.script.len()].clone();
        self.position += 1;
        Ok(detections)
    }
}

fn person_box(slot: usize, confidence: f32) -> Detection {
    // Lay people out left to right, wrapping after eight.
    let x = 0.02 + (slot % 8) as f32 * 0.12;
    Detection::new(PERSON_LABEL, confidence, x, 0.2, x + 0.1, 0.9)
}
