//! Velocity arbitration integration tests

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use comms_if::msg::{PathPlanMsg, PathPose, TargetVelMsg};
use ctrl_lib::{
    loc::Pose,
    path_follow::PathFollower,
    vel_arb::{ArbState, CmdSource, InputData, Params, VelArb, VelocityCommand},
};
use util::module::State;

// ---------------------------------------------------------------------------
// MOCKS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Reset,
    Request,
}

/// Follower which records the calls made to it.
struct RecordingFollower {
    vel: (f64, f64),
    events: Arc<Mutex<Vec<Event>>>,
}

impl PathFollower for RecordingFollower {
    fn request_velocity(&mut self, _path: &[PathPose], _pose: &Pose, _time_s: f64) -> (f64, f64) {
        self.events.lock().unwrap().push(Event::Request);
        self.vel
    }

    fn reset_progress(&mut self) {
        self.events.lock().unwrap().push(Event::Reset);
    }
}

fn arbiter(vel: (f64, f64)) -> (VelArb, Arc<Mutex<Vec<Event>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let follower: Box<dyn PathFollower + Send> = Box::new(RecordingFollower {
        vel,
        events: events.clone(),
    });
    (VelArb::init((Params::default(), follower)).unwrap(), events)
}

fn plan(t: f64, end_x: f64) -> PathPlanMsg {
    PathPlanMsg {
        timestamp: t,
        path_pose_list: vec![
            PathPose::new(0.0, 0.0, 0.0),
            PathPose::new(end_x / 2.0, 0.0, 0.0),
            PathPose::new(end_x, 0.0, 0.0),
        ],
    }
}

fn target(t: f64, lin: f64, ang: f64) -> TargetVelMsg {
    TargetVelMsg {
        timestamp: t,
        linear_velocity_mps: lin,
        angular_velocity_radps: ang,
    }
}

fn tick(va: &mut VelArb, input: InputData) -> (VelocityCommand, ArbState) {
    let (cmd, rpt) = va.proc(&input).unwrap();
    (cmd, rpt.state)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[test]
fn plan_takes_precedence_over_external_command() {
    let (mut va, _) = arbiter((0.25, -0.1));

    let (cmd, state) = tick(
        &mut va,
        InputData {
            time_s: 100.0,
            path_plan: Some(plan(100.0, 1.0)),
            target_vel: Some(target(100.0, 1.0, 0.5)),
            pose: Some(Pose::default()),
        },
    );

    assert_eq!(state, ArbState::Following);
    assert_eq!(cmd.source, CmdSource::Path);
    assert_eq!((cmd.linear_mps, cmd.angular_radps), (0.25, -0.1));
}

#[test]
fn external_command_used_without_pose() {
    let (mut va, events) = arbiter((0.25, 0.0));

    let (cmd, state) = tick(
        &mut va,
        InputData {
            time_s: 100.0,
            path_plan: Some(plan(100.0, 1.0)),
            target_vel: Some(target(99.9, 0.6, 0.2)),
            pose: None,
        },
    );

    assert_eq!(state, ArbState::ExternalCommand);
    assert_eq!(cmd.source, CmdSource::External);
    assert_eq!((cmd.linear_mps, cmd.angular_radps), (0.6, 0.2));
    assert_eq!(cmd.timestamp_s, 99.9);

    // The plan was still taken but never followed
    assert_eq!(*events.lock().unwrap(), vec![Event::Reset]);
}

#[test]
fn stale_plan_is_dropped() {
    let (mut va, _) = arbiter((0.3, 0.0));
    let pose = Some(Pose::default());

    tick(
        &mut va,
        InputData {
            time_s: 1000.0,
            path_plan: Some(plan(1000.0, 2.0)),
            pose,
            ..Default::default()
        },
    );

    // Exactly at the staleness bound the plan is still used
    for i in 1..=5 {
        let (_, state) = tick(
            &mut va,
            InputData {
                time_s: 1000.0 + i as f64,
                pose,
                ..Default::default()
            },
        );
        assert_eq!(state, ArbState::Following);
    }

    let (cmd, rpt) = va
        .proc(&InputData {
            time_s: 1005.5,
            pose,
            ..Default::default()
        })
        .unwrap();

    assert!(rpt.plan_dropped_stale);
    assert!(va.held_plan().is_none());

    // The robot stops from the last path command rather than halting
    assert_eq!(rpt.state, ArbState::Stopping);
    assert_eq!(cmd.source, CmdSource::Stopping);
    assert!((cmd.linear_mps - 0.3).abs() < 1e-9);
}

#[test]
fn graceful_stop_after_external_commands_end() {
    let (mut va, _) = arbiter((0.0, 0.0));
    let t0 = 200.0;
    let rate_hz = 300.0;

    let (cmd, _) = tick(
        &mut va,
        InputData {
            time_s: t0,
            target_vel: Some(target(t0, 1.0, 0.0)),
            ..Default::default()
        },
    );
    assert_eq!(cmd.linear_mps, 1.0);

    let mut prev = cmd.linear_mps;
    for i in 1..=700 {
        let time_s = t0 + i as f64 / rate_hz;
        let (cmd, state) = tick(
            &mut va,
            InputData {
                time_s,
                ..Default::default()
            },
        );

        assert!(cmd.linear_mps <= prev + 1e-12, "increase at {} s", time_s);
        assert!(prev - cmd.linear_mps < 0.01, "jump at {} s", time_s);
        assert_eq!(cmd.angular_radps, 0.0);

        if i < 600 {
            assert_eq!(state, ArbState::Stopping);
        } else {
            assert_eq!(state, ArbState::Idle);
            assert_eq!(cmd.linear_mps, 0.0);
        }

        prev = cmd.linear_mps;
    }
}

#[test]
fn new_command_interrupts_a_stop() {
    let (mut va, _) = arbiter((0.0, 0.0));

    tick(
        &mut va,
        InputData {
            time_s: 10.0,
            target_vel: Some(target(10.0, 0.8, 0.0)),
            ..Default::default()
        },
    );
    let (_, rpt) = va
        .proc(&InputData {
            time_s: 10.5,
            ..Default::default()
        })
        .unwrap();
    assert!(rpt.profile_generated);

    let (_, state) = tick(
        &mut va,
        InputData {
            time_s: 10.6,
            target_vel: Some(target(10.6, -0.4, 0.0)),
            ..Default::default()
        },
    );
    assert_eq!(state, ArbState::ExternalCommand);
    assert!(va.profile().is_none());

    // A fresh profile is seeded from the new command
    let (cmd, rpt) = va
        .proc(&InputData {
            time_s: 10.7,
            ..Default::default()
        })
        .unwrap();
    assert!(rpt.profile_generated);
    assert!((cmd.linear_mps + 0.4).abs() < 1e-9);
}

#[test]
fn plan_replacement_resets_progress_before_request() {
    let (mut va, events) = arbiter((0.1, 0.0));
    let pose = Some(Pose::default());

    tick(
        &mut va,
        InputData {
            time_s: 50.0,
            path_plan: Some(plan(50.0, 1.0)),
            pose,
            ..Default::default()
        },
    );

    // Same poses, new timestamp: refresh only
    let (_, rpt) = va
        .proc(&InputData {
            time_s: 51.0,
            path_plan: Some(plan(51.0, 1.0)),
            pose,
            ..Default::default()
        })
        .unwrap();
    assert!(rpt.plan_refreshed);
    assert!(!rpt.plan_replaced);
    assert_eq!(va.held_plan().unwrap().received_at, 51.0);

    // Different poses: replace
    let (_, rpt) = va
        .proc(&InputData {
            time_s: 52.0,
            path_plan: Some(plan(52.0, 3.0)),
            pose,
            ..Default::default()
        })
        .unwrap();
    assert!(rpt.plan_replaced);

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            Event::Reset,
            Event::Request,
            Event::Request,
            Event::Reset,
            Event::Request
        ]
    );
}
