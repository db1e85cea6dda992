//! Implementations for the VelArb state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use serde::Serialize;

// Internal
use super::{ArbState, CmdSource, Params, VelArbError, VelocityCommand};
use crate::{
    loc::Pose,
    path_follow::PathFollower,
    stop_profile::{self, StoppingProfile},
};
use comms_if::msg::{PathPlanMsg, PathPose, TargetVelMsg};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity arbiter state.
///
/// Owns all state which persists between cycles: the held path plan, the
/// last adopted command and the cached stopping profile.
pub struct VelArb {
    params: Params,

    follower: Box<dyn PathFollower + Send>,

    state: ArbState,

    plan: Option<HeldPlan>,

    last_adopted: Option<VelocityCommand>,

    profile: Option<StoppingProfile>,
}

/// A path plan held by the arbiter.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldPlan {
    pub poses: Vec<PathPose>,

    /// Time the plan was last received, by the arbiter's clock.
    ///
    /// Units: unix seconds
    pub received_at: f64,
}

/// Input data to the arbiter. Messages are only present on the cycle they
/// were received.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Units: unix seconds
    pub time_s: f64,

    pub path_plan: Option<PathPlanMsg>,

    pub target_vel: Option<TargetVelMsg>,

    pub pose: Option<Pose>,
}

/// Status report for one arbitration cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub state: ArbState,

    /// A structurally different plan replaced the held one.
    pub plan_replaced: bool,

    /// An identical plan refreshed the held one.
    pub plan_refreshed: bool,

    /// The held plan was dropped for being stale.
    pub plan_dropped_stale: bool,

    /// A new stopping profile was generated.
    pub profile_generated: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for VelArb {
    type InitData = (Params, Box<dyn PathFollower + Send>);
    type InitError = VelArbError;

    type InputData = InputData;
    type OutputData = VelocityCommand;
    type StatusReport = StatusReport;
    type ProcError = VelArbError;

    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let (params, follower) = init_data;
        Self::new(params, follower)
    }

    /// Select the velocity for this cycle.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let now = input_data.time_s;
        let mut report = StatusReport::default();

        if let Some(ref msg) = input_data.path_plan {
            self.receive_plan(msg, now, &mut report);
        }

        // Plan watchdog
        let plan_stale = match self.plan {
            Some(ref plan) => now - plan.received_at > self.params.plan_staleness_s,
            None => false,
        };
        if plan_stale {
            warn!(
                "Path plan not updated for over {:.1} s, dropping it",
                self.params.plan_staleness_s
            );
            self.plan = None;
            report.plan_dropped_stale = true;
        }

        let (cmd, state) = match (&self.plan, &input_data.pose, &input_data.target_vel) {
            (Some(plan), Some(pose), _) => {
                let (lin, ang) = self.follower.request_velocity(&plan.poses, pose, now);
                let cmd = VelocityCommand {
                    linear_mps: lin,
                    angular_radps: ang,
                    timestamp_s: now,
                    source: CmdSource::Path,
                };
                self.adopt(cmd);
                (cmd, ArbState::Following)
            }
            (_, _, Some(target)) => {
                let cmd = VelocityCommand {
                    linear_mps: target.linear_velocity_mps,
                    angular_radps: target.angular_velocity_radps,
                    timestamp_s: target.timestamp,
                    source: CmdSource::External,
                };
                self.adopt(cmd);
                (cmd, ArbState::ExternalCommand)
            }
            _ => match self.last_adopted {
                Some(last) if last.timestamp_s > now - self.params.cmd_staleness_s => {
                    (self.stopping(last, now, &mut report)?, ArbState::Stopping)
                }
                _ => {
                    self.last_adopted = None;
                    self.profile = None;
                    (VelocityCommand::zero(now), ArbState::Idle)
                }
            },
        };

        if state != self.state {
            info!("VelArb: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
        report.state = state;

        trace!(
            "VelArb output: {:?} ({:.4} m/s, {:.4} rad/s)",
            cmd.source,
            cmd.linear_mps,
            cmd.angular_radps
        );

        Ok((cmd, report))
    }
}

impl VelArb {
    /// Create a new arbiter around the given path follower.
    pub fn new(
        params: Params,
        follower: Box<dyn PathFollower + Send>,
    ) -> Result<Self, VelArbError> {
        let checks = [
            ("plan_staleness_s", params.plan_staleness_s),
            ("cmd_staleness_s", params.cmd_staleness_s),
            ("stop_duration_s", params.stop_duration_s),
            ("stop_resolution_s", params.stop_resolution_s),
        ];
        for &(name, value) in checks.iter() {
            if !(value.is_finite() && value > 0.0) {
                return Err(VelArbError::InvalidParam(name, value));
            }
        }

        Ok(Self {
            params,
            follower,
            state: ArbState::Idle,
            plan: None,
            last_adopted: None,
            profile: None,
        })
    }

    /// The state chosen on the last cycle.
    pub fn state(&self) -> ArbState {
        self.state
    }

    pub fn held_plan(&self) -> Option<&HeldPlan> {
        self.plan.as_ref()
    }

    pub fn last_adopted(&self) -> Option<VelocityCommand> {
        self.last_adopted
    }

    /// The cached stopping profile, present only while stopping.
    pub fn profile(&self) -> Option<&StoppingProfile> {
        self.profile.as_ref()
    }

    /// Hold a newly received plan.
    ///
    /// Plans are compared by their poses only, so a re-publication of the
    /// same path with a new timestamp keeps the follower's progress.
    fn receive_plan(&mut self, msg: &PathPlanMsg, now: f64, report: &mut StatusReport) {
        match self.plan {
            Some(ref mut plan) if plan.poses == msg.path_pose_list => {
                plan.received_at = now;
                report.plan_refreshed = true;
            }
            _ => {
                info!(
                    "New path plan with {} poses received",
                    msg.path_pose_list.len()
                );
                self.plan = Some(HeldPlan {
                    poses: msg.path_pose_list.clone(),
                    received_at: now,
                });
                self.follower.reset_progress();
                report.plan_replaced = true;
            }
        }
    }

    /// Adopt a fresh command, which ends any stop in progress.
    fn adopt(&mut self, cmd: VelocityCommand) {
        self.last_adopted = Some(cmd);
        self.profile = None;
    }

    /// Sample the stopping profile, generating it on the first stopping cycle.
    fn stopping(
        &mut self,
        seed: VelocityCommand,
        now: f64,
        report: &mut StatusReport,
    ) -> Result<VelocityCommand, VelArbError> {
        let profile = match self.profile.take() {
            Some(profile) => profile,
            None => {
                report.profile_generated = true;
                stop_profile::generate_with_resolution(
                    seed.linear_mps,
                    seed.angular_radps,
                    self.params.stop_duration_s,
                    now,
                    self.params.stop_resolution_s,
                )?
            }
        };

        let (lin, ang) = profile.sample(now);
        self.profile = Some(profile);

        Ok(VelocityCommand {
            linear_mps: lin,
            angular_radps: ang,
            timestamp_s: now,
            source: CmdSource::Stopping,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Follower which always requests the same velocity and counts resets.
    struct ConstFollower {
        vel: (f64, f64),
        resets: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl PathFollower for ConstFollower {
        fn request_velocity(&mut self, _: &[PathPose], _: &Pose, _: f64) -> (f64, f64) {
            self.vel
        }

        fn reset_progress(&mut self) {
            self.resets.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn arb() -> VelArb {
        VelArb::new(
            Params::default(),
            Box::new(ConstFollower {
                vel: (0.3, 0.1),
                resets: Default::default(),
            }),
        )
        .unwrap()
    }

    fn plan(t: f64) -> PathPlanMsg {
        PathPlanMsg {
            timestamp: t,
            path_pose_list: vec![PathPose::new(0.0, 0.0, 0.0), PathPose::new(1.0, 0.0, 0.0)],
        }
    }

    fn target(t: f64, lin: f64) -> TargetVelMsg {
        TargetVelMsg {
            timestamp: t,
            linear_velocity_mps: lin,
            angular_velocity_radps: 0.0,
        }
    }

    #[test]
    fn test_idle_by_default() {
        let mut va = arb();
        let (cmd, rpt) = va
            .proc(&InputData {
                time_s: 10.0,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(cmd, VelocityCommand::zero(10.0));
        assert_eq!(rpt.state, ArbState::Idle);
    }

    #[test]
    fn test_plan_needs_pose() {
        let mut va = arb();

        // Without a pose the plan is held but not followed
        let (cmd, rpt) = va
            .proc(&InputData {
                time_s: 10.0,
                path_plan: Some(plan(10.0)),
                ..Default::default()
            })
            .unwrap();
        assert!(rpt.plan_replaced);
        assert_eq!(rpt.state, ArbState::Idle);
        assert_eq!(cmd.source, CmdSource::Zero);
        assert!(va.held_plan().is_some());

        let (cmd, rpt) = va
            .proc(&InputData {
                time_s: 10.1,
                pose: Some(Pose::default()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rpt.state, ArbState::Following);
        assert_eq!((cmd.linear_mps, cmd.angular_radps), (0.3, 0.1));
    }

    #[test]
    fn test_external_then_stop() {
        let mut va = arb();

        let (cmd, rpt) = va
            .proc(&InputData {
                time_s: 20.0,
                target_vel: Some(target(20.0, 1.0)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rpt.state, ArbState::ExternalCommand);
        assert_eq!(cmd.linear_mps, 1.0);

        let (cmd, rpt) = va
            .proc(&InputData {
                time_s: 20.5,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rpt.state, ArbState::Stopping);
        assert!(rpt.profile_generated);
        assert_eq!(cmd.linear_mps, 1.0);
        assert!(va.profile().is_some());

        let (cmd, rpt) = va
            .proc(&InputData {
                time_s: 21.5,
                ..Default::default()
            })
            .unwrap();
        assert!(!rpt.profile_generated);
        assert!((cmd.linear_mps - 0.5).abs() < 1e-9);

        // Command now older than the staleness bound
        let (cmd, rpt) = va
            .proc(&InputData {
                time_s: 22.0,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rpt.state, ArbState::Idle);
        assert_eq!(cmd.linear_mps, 0.0);
        assert!(va.last_adopted().is_none());
        assert!(va.profile().is_none());
    }

    #[test]
    fn test_invalid_params() {
        let res = VelArb::new(
            Params {
                stop_duration_s: 0.0,
                ..Params::default()
            },
            Box::new(ConstFollower {
                vel: (0.0, 0.0),
                resets: Default::default(),
            }),
        );

        assert_eq!(
            res.err(),
            Some(VelArbError::InvalidParam("stop_duration_s", 0.0))
        );
    }
}
