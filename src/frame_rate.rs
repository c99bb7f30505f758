//! Rolling frame-rate average for the FPS overlay.

use std::collections::VecDeque;
use std::time::Duration;

/// Number of frames the average is taken over.
const WINDOW: usize = 60;

#[derive(Debug, Default)]
pub struct FrameRate {
    frame_times: VecDeque<Duration>,
    total: Duration,
}

impl FrameRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the duration of the frame that just finished.
    pub fn record(&mut self, frame_time: Duration) {
        if self.frame_times.len() == WINDOW {
            if let Some(oldest) = self.frame_times.pop_front() {
                self.total -= oldest;
            }
        }
        self.frame_times.push_back(frame_time);
        self.total += frame_time;
    }

    /// Mean frame time over the window.
    pub fn average_frame_time(&self) -> Duration {
        if self.frame_times.is_empty() {
            return Duration::ZERO;
        }
        self.total / self.frame_times.len() as u32
    }

    pub fn fps(&self) -> f32 {
        let seconds = self.average_frame_time().as_secs_f32();
        if seconds > 0.0 { 1.0 / seconds } else { 0.0 }
    }

    pub fn message(&self) -> String {
        format!(
            "{:.1} FPS ({:.2} ms)",
            self.fps(),
            self.average_frame_time().as_secs_f64() * 1000.0
        )
    }
}
