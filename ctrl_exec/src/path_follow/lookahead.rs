//! # Lookahead path controller
//!
//! Drives towards a goal point a short distance ahead of the robot's closest
//! point on the path. The linear PID acts on the distance to the end of the
//! path and the angular PID on the heading error to the goal point. If the
//! goal is behind the robot it turns on the spot before driving.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::Vector2;
use std::f64::consts::FRAC_PI_2;

use super::{PathFollowParams, PathFollower, PidController};
use crate::loc::Pose;
use comms_if::msg::PathPose;
use util::maths::{get_ang_dist_2pi, wrap_2pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Lookahead path following controller.
#[derive(Debug, Clone)]
pub struct LookaheadCtrl {
    params: PathFollowParams,

    /// Index of the closest path point found so far, never moves backwards
    /// along the path until reset.
    progress_idx: usize,

    lin_ctrl: PidController,
    ang_ctrl: PidController,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LookaheadCtrl {
    pub fn new(params: PathFollowParams) -> Self {
        Self {
            lin_ctrl: PidController::new(params.lin_k_p, params.lin_k_i, params.lin_k_d),
            ang_ctrl: PidController::new(params.ang_k_p, params.ang_k_i, params.ang_k_d),
            progress_idx: 0,
            params,
        }
    }

    /// Index of the path point the robot has progressed to.
    pub fn progress_idx(&self) -> usize {
        self.progress_idx
    }

    /// Find the closest point at or after the progress index, and the goal
    /// point beyond it.
    fn find_goal(&self, path: &[Vector2<f64>], pos: &Vector2<f64>) -> (usize, usize) {
        let start = self.progress_idx.min(path.len() - 1);

        let mut closest = start;
        let mut closest_dist = (path[start] - pos).norm();
        for (i, p) in path.iter().enumerate().skip(start + 1) {
            let d = (p - pos).norm();
            if d < closest_dist {
                closest = i;
                closest_dist = d;
            }
        }

        let goal = path
            .iter()
            .enumerate()
            .skip(closest + 1)
            .find(|(_, p)| (*p - pos).norm() >= self.params.lookahead_distance_m)
            .map(|(i, _)| i)
            .unwrap_or(path.len() - 1);

        (closest, goal)
    }
}

impl PathFollower for LookaheadCtrl {
    fn request_velocity(&mut self, path: &[PathPose], pose: &Pose, time_s: f64) -> (f64, f64) {
        if path.is_empty() {
            return (0.0, 0.0);
        }

        // Path y is the pose's leftward z axis
        let points: Vec<Vector2<f64>> = path.iter().map(|p| Vector2::new(p.x, p.y)).collect();
        let pos = Vector2::new(pose.x, pose.z);

        let (closest, goal) = self.find_goal(&points, &pos);
        self.progress_idx = closest;

        let lin_err_m = (points[points.len() - 1] - pos).norm();

        let to_goal = points[goal] - pos;
        let head_err_rad = if to_goal.norm() > f64::EPSILON {
            get_ang_dist_2pi(pose.yaw, wrap_2pi(to_goal[1].atan2(to_goal[0])))
        } else {
            0.0
        };

        // Turn on the spot towards goals behind the robot
        let lin = if head_err_rad.abs() > FRAC_PI_2 {
            0.0
        } else {
            self.lin_ctrl.get(lin_err_m, time_s)
        };
        let ang = self.ang_ctrl.get(head_err_rad, time_s);

        let max_lin = self.params.max_linear_velocity_mps;
        let max_ang = self.params.max_angular_velocity_radps;

        trace!(
            "LookaheadCtrl: closest {}, goal {}, lin_err {:.3} m, head_err {:.3} rad",
            closest,
            goal,
            lin_err_m,
            head_err_rad
        );

        (lin.clamp(-max_lin, max_lin), ang.clamp(-max_ang, max_ang))
    }

    fn reset_progress(&mut self) {
        self.progress_idx = 0;
        self.lin_ctrl.reset();
        self.ang_ctrl.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn straight_path() -> Vec<PathPose> {
        (0..=10)
            .map(|i| PathPose::new(i as f64 * 0.1, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn test_drives_along_straight_path() {
        let mut ctrl = LookaheadCtrl::new(PathFollowParams::default());

        let (lin, ang) = ctrl.request_velocity(&straight_path(), &Pose::default(), 0.0);

        // 1 m to go at kp 0.4
        assert!((lin - 0.4).abs() < 1e-12);
        assert!(ang.abs() < 1e-12);
    }

    #[test]
    fn test_turns_towards_path() {
        let mut ctrl = LookaheadCtrl::new(PathFollowParams::default());

        // Path off to the left
        let path = vec![PathPose::new(0.0, 0.0, 0.0), PathPose::new(0.0, 1.0, 0.0)];
        let (lin, ang) = ctrl.request_velocity(&path, &Pose::default(), 0.0);
        assert!(ang > 0.0);
        assert!(lin >= 0.0);

        // Path directly behind, turn on the spot
        let path = vec![PathPose::new(0.0, 0.0, 0.0), PathPose::new(-1.0, 0.0, 0.0)];
        let (lin, ang) = ctrl.request_velocity(&path, &Pose::new(0.0, 0.0, 0.0), 0.1);
        assert_eq!(lin, 0.0);
        assert_eq!(ang.abs(), 1.5);
    }

    #[test]
    fn test_progress_forward_only_and_reset() {
        let mut ctrl = LookaheadCtrl::new(PathFollowParams::default());
        let path = straight_path();

        ctrl.request_velocity(&path, &Pose::new(0.52, 0.0, 0.0), 0.0);
        assert_eq!(ctrl.progress_idx(), 5);

        // Moving back along the path does not move progress back
        ctrl.request_velocity(&path, &Pose::new(0.1, 0.0, 0.0), 0.1);
        assert_eq!(ctrl.progress_idx(), 5);

        ctrl.reset_progress();
        assert_eq!(ctrl.progress_idx(), 0);
    }

    #[test]
    fn test_limits() {
        let mut ctrl = LookaheadCtrl::new(PathFollowParams::default());
        let path = vec![PathPose::new(0.0, 0.0, 0.0), PathPose::new(10.0, 0.0, 0.0)];

        let (lin, _) = ctrl.request_velocity(&path, &Pose::default(), 0.0);
        assert_eq!(lin, 0.4);
    }
}
