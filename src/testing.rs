//! テスト用のハードウェア代替

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::encoder::{AngleSensor, PhaseDuty};
use crate::peripherals::PhaseDriver;

/// Returns queued counts in order, then keeps repeating the last one
pub struct FakeSensor {
    queue: VecDeque<u16>,
    current: u16,
}

impl FakeSensor {
    pub fn new(counts: impl IntoIterator<Item = u16>) -> Self {
        Self {
            queue: counts.into_iter().collect(),
            current: 0,
        }
    }

    pub fn set(&mut self, counts: u16) {
        self.queue.clear();
        self.current = counts;
    }
}

impl AngleSensor for FakeSensor {
    fn read_counts(&mut self) -> u16 {
        if let Some(next) = self.queue.pop_front() {
            self.current = next;
        }
        self.current
    }
}

/// Records every duty request and applied duty
#[derive(Default)]
pub struct FakeDriver {
    pub commands: RefCell<Vec<(f32, f32, f32)>>,
    pub applied: Vec<PhaseDuty>,
    pub released: usize,
}

impl FakeDriver {
    /// d/q を区別できる適当な値
    pub fn duty_for(angle: f32, d: f32, q: f32) -> PhaseDuty {
        PhaseDuty {
            u: (1000.0 + d * 1000.0) as u16,
            v: (1000.0 + q * 1000.0) as u16,
            w: (1000.0 - d * 500.0 + angle) as u16,
        }
    }
}

impl PhaseDriver for FakeDriver {
    fn duty_cycle(&self, angle: f32, d: f32, q: f32) -> PhaseDuty {
        self.commands.borrow_mut().push((angle, d, q));
        Self::duty_for(angle, d, q)
    }

    fn apply(&mut self, duty: PhaseDuty) {
        self.applied.push(duty);
    }

    fn release(&mut self) {
        self.released += 1;
    }
}

/// Zero-cost delay that accumulates the requested time
#[derive(Default)]
pub struct FakeDelay {
    elapsed_ns: u64,
}

impl FakeDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl embedded_hal_async::delay::DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}
