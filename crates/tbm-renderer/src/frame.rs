use crate::camera::Camera;
use crate::math;
use glam::Mat4;
use std::time::{Duration, Instant};
use tbm_imu::types::OrientationSample;

/// Render loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ShuttingDown,
}

impl LoopState {
    /// Quit signal. Idempotent; returns whether this call caused the transition.
    pub fn request_quit(&mut self) -> bool {
        let was_running = *self == LoopState::Running;
        *self = LoopState::ShuttingDown;
        was_running
    }

    pub fn is_running(self) -> bool {
        self == LoopState::Running
    }
}

/// Matrices for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameTransforms {
    pub projection: Mat4,
    pub view: Mat4,
    pub model: Mat4,
    pub mvp: Mat4,
}

impl FrameTransforms {
    pub fn compute(sample: &OrientationSample, camera: &Camera) -> Self {
        let q = sample.quaternion;
        let projection = camera.projection_matrix();
        let view = camera.view_matrix();
        let model = math::quaternion_to_matrix(q.w, q.x, q.y, q.z);
        Self {
            projection,
            view,
            model,
            mvp: math::compose_mvp(projection, view, model),
        }
    }
}

/// Roll / pitch / yaw readout strings for the HUD.
#[derive(Debug, Clone, PartialEq)]
pub struct HudReadout {
    pub roll: String,
    pub pitch: String,
    pub yaw: String,
}

impl HudReadout {
    pub fn from_sample(sample: &OrientationSample) -> Self {
        let e = sample.euler;
        Self {
            roll: format!("Roll   {:+7.1}\u{00b0}", e.roll),
            pitch: format!("Pitch  {:+7.1}\u{00b0}", e.pitch),
            yaw: format!("Yaw    {:+7.1}\u{00b0}", e.yaw),
        }
    }

    pub fn lines(&self) -> [&str; 3] {
        [self.roll.as_str(), self.pitch.as_str(), self.yaw.as_str()]
    }
}

/// Everything the GPU side needs for one frame, derived from a single snapshot.
#[derive(Debug, Clone)]
pub struct FrameInputs {
    pub sample: OrientationSample,
    pub transforms: FrameTransforms,
    pub readout: HudReadout,
}

impl FrameInputs {
    pub fn prepare(sample: OrientationSample, camera: &Camera) -> Self {
        Self {
            transforms: FrameTransforms::compute(&sample, camera),
            readout: HudReadout::from_sample(&sample),
            sample,
        }
    }
}

/// Frame limiter.
///
/// Schedules the next frame one interval after the previous deadline, or
/// after `now` if the loop fell behind, so a slow frame does not cause a
/// burst of catch-up frames.
pub struct FramePacer {
    interval: Duration,
    next: Instant,
}

impl FramePacer {
    pub fn new(target_fps: u32, now: Instant) -> Self {
        Self {
            interval: Duration::from_nanos(1_000_000_000 / u64::from(target_fps.max(1))),
            next: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next frame should start.
    pub fn deadline(&self) -> Instant {
        self.next
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Record that a frame was presented at `now`.
    pub fn frame_presented(&mut self, now: Instant) {
        let next = self.next + self.interval;
        self.next = if next < now { now } else { next };
    }
}
