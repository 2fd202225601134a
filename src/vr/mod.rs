//! Head-tracking boundary
//!
//! The playback modulation loop only ever sees this trait; wiring an actual
//! VR runtime in means implementing `VrTracker` over its pose API and
//! handing it to the composition root. Tracker initialization is expected
//! to be fire-and-forget: construct disabled, flip enabled once the runtime
//! comes up.

use crate::audio::spatial::{Quat, Vec3};

/// One head-mounted-display pose sample
#[derive(Debug, Clone, Copy, Default)]
pub struct HmdPose {
    pub position: Vec3,
    pub rotation: Quat,
    /// Linear velocity
    pub velocity: Vec3,
    /// Angular velocity
    pub omega: Vec3,
}

/// Source of head poses for audio spatialization
pub trait VrTracker: Send + Sync {
    /// Whether a headset is connected and tracking
    fn is_enabled(&self) -> bool;

    /// Latest head pose; default pose when tracking is unavailable
    fn hmd_pose(&self) -> HmdPose;
}

/// Tracker used when no VR runtime is present
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTracker;

impl VrTracker for DisabledTracker {
    fn is_enabled(&self) -> bool {
        false
    }

    fn hmd_pose(&self) -> HmdPose {
        HmdPose::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_tracker_reports_identity_pose() {
        let tracker = DisabledTracker;
        assert!(!tracker.is_enabled());
        let pose = tracker.hmd_pose();
        assert_eq!(pose.rotation, Quat::IDENTITY);
        assert_eq!(pose.position, Vec3::ZERO);
    }
}
