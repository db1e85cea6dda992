//! Control loop integration tests, driven by the stepped simulator.

#![cfg(feature = "sim")]

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use comms_if::{
    bus::{Bus, Topic},
    msg::{LocInitMsg, PathPlanMsg, PathPose, RobotPoseMsg, TargetVelMsg},
};
use ctrl_lib::{
    actuator::{Actuator, SharedActuator, SimActuator, WheelSide},
    ctrl_loop::{CtrlLoop, LoopControl},
    loc::{LocParams, LocSource, Pose, PoseEstimator, PoseHandle},
    loco_ctrl::{self, LocoCtrl},
    params::CtrlExecParams,
    path_follow::{LookaheadCtrl, PathFollowParams, PathFollower},
    vel_arb::{self, ArbState, VelArb},
};
use util::{archive::Archiver, module::State, session::Session};

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

struct Rig {
    sim: Arc<Mutex<SimActuator>>,
    bus: Bus,
    pose: PoseHandle,
    ctrl: CtrlLoop,
}

fn rig(params: CtrlExecParams) -> Rig {
    let sim = Arc::new(Mutex::new(SimActuator::new_stepped(0.165)));
    let shared: SharedActuator = sim.clone();
    let bus = Bus::new();
    let pose = PoseHandle::new();

    let follower: Box<dyn PathFollower + Send> =
        Box::new(LookaheadCtrl::new(PathFollowParams::default()));
    let vel_arb = VelArb::new(vel_arb::Params::default(), follower).unwrap();
    let loco_ctrl = LocoCtrl::init(loco_ctrl::Params::default()).unwrap();

    let ctrl = CtrlLoop::new(
        params,
        bus.clone(),
        shared,
        pose.clone(),
        vel_arb,
        loco_ctrl,
    )
    .unwrap();

    Rig {
        sim,
        bus,
        pose,
        ctrl,
    }
}

fn straight_plan(t: f64) -> PathPlanMsg {
    PathPlanMsg {
        timestamp: t,
        path_pose_list: (0..=10)
            .map(|i| PathPose::new(i as f64 * 0.1, 0.0, 0.0))
            .collect(),
    }
}

fn loc_initialised(bus: &Bus, t: f64) {
    bus.loc_init.publish(LocInitMsg {
        timestamp: t,
        initialized: true,
    });
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[test]
fn actuation_gated_until_localisation_initialised() {
    let mut r = rig(CtrlExecParams::default());

    r.bus.target_vel.publish(TargetVelMsg {
        timestamp: 10.0,
        linear_velocity_mps: 0.3,
        angular_velocity_radps: 0.0,
    });

    let rpt = r.ctrl.tick(10.0);
    assert!(rpt.gated);
    assert_eq!(rpt.state, ArbState::ExternalCommand);
    assert_eq!(rpt.dems.left_mps, 0.3);

    // Zero is actively commanded while gated
    {
        let sim = r.sim.lock().unwrap();
        assert_eq!(sim.num_demands(WheelSide::Left), 1);
        assert_eq!(sim.demand(WheelSide::Left), 0.0);
        assert_eq!(sim.demand(WheelSide::Right), 0.0);
    }

    r.bus
        .publish_json(Topic::LocInit, r#"{"initialized": true}"#, 10.01)
        .unwrap();
    r.bus
        .publish_json(
            Topic::TargetVel,
            r#"{"data": {"linear_velocity_mps": 0.3, "angular_velocity_radps": 1.0}}"#,
            10.01,
        )
        .unwrap();

    let rpt = r.ctrl.tick(10.01);
    assert!(!rpt.gated);

    {
        let sim = r.sim.lock().unwrap();
        assert!((sim.demand(WheelSide::Left) - 0.0875).abs() < 1e-9);
        assert!((sim.demand(WheelSide::Right) - 0.5125).abs() < 1e-9);
    }

    // Realised velocities are published
    let tm = r.bus.wheel_vels.take().unwrap();
    assert_eq!(tm.timestamp, 10.01);
    assert!((tm.left_vel_mps - 0.0875).abs() < 1e-9);
    assert!((tm.right_vel_mps - 0.5125).abs() < 1e-9);
}

#[test]
fn follows_plan_with_odometry_pose() {
    let mut r = rig(CtrlExecParams::default());
    loc_initialised(&r.bus, 20.0);

    r.pose.set(Pose::default(), 20.0);
    r.bus.path_plan.publish(straight_plan(20.0));

    let rpt = r.ctrl.tick(20.0);
    assert_eq!(rpt.state, ArbState::Following);
    assert!(rpt.cmd.linear_mps > 0.0);
    assert!(rpt.cmd.angular_radps.abs() < 1e-9);
    assert!(r.sim.lock().unwrap().demand(WheelSide::Left) > 0.0);

    // The odometry stops updating, so the pose goes stale and the robot stops
    let rpt = r.ctrl.tick(21.5);
    assert_eq!(rpt.state, ArbState::Stopping);
    assert!(r.ctrl.vel_arb().held_plan().is_some());
}

#[test]
fn bus_pose_source() {
    let mut r = rig(CtrlExecParams {
        loc_source: LocSource::Bus,
        ..CtrlExecParams::default()
    });
    loc_initialised(&r.bus, 30.0);

    // Odometry poses are ignored
    r.pose.set(Pose::default(), 30.0);
    r.bus.path_plan.publish(straight_plan(30.0));
    assert_eq!(r.ctrl.tick(30.0).state, ArbState::Idle);

    r.bus.robot_pose.publish(RobotPoseMsg {
        timestamp: 30.1,
        x_m: 0.0,
        y_m: 0.0,
        theta_rad: 0.0,
    });
    assert_eq!(r.ctrl.tick(30.1).state, ArbState::Following);

    // The last bus pose is reused until it goes stale
    assert_eq!(r.ctrl.tick(30.5).state, ArbState::Following);
    assert_eq!(r.ctrl.tick(31.5).state, ArbState::Stopping);
}

#[test]
fn actuator_errors_are_cleared_periodically() {
    let mut r = rig(CtrlExecParams {
        error_check_period_cycles: 20,
        ..CtrlExecParams::default()
    });

    let mut est = PoseEstimator::new(LocParams::default()).unwrap();
    est.update(1.0, 1.0);
    assert!(est.is_calibrated());

    r.sim
        .lock()
        .unwrap()
        .inject_fault(WheelSide::Left, "overcurrent");

    // The first cycle is a check cycle
    assert!(r.ctrl.tick(40.0).errors_cleared);
    assert!(!r.sim.lock().unwrap().has_errors().unwrap());

    // Odometry is asked to recalibrate
    r.pose.apply_requests(&mut est);
    assert!(!est.is_calibrated());

    r.sim
        .lock()
        .unwrap()
        .inject_fault(WheelSide::Right, "encoder");

    for i in 1..20 {
        assert!(!r.ctrl.tick(40.0 + i as f64 * 0.01).errors_cleared);
    }
    assert!(r.ctrl.tick(40.2).errors_cleared);

    assert_eq!(r.ctrl.data_store().num_error_recoveries, 2);
}

#[test]
fn actuator_failure_does_not_stop_the_loop() {
    let mut r = rig(CtrlExecParams::default());
    loc_initialised(&r.bus, 50.0);

    r.sim.lock().unwrap().set_connected(false);

    let rpt = r.ctrl.tick(50.0);
    assert_eq!(rpt.wheel_vels, None);
    assert!(!rpt.errors_cleared);
    assert_eq!(r.bus.wheel_vels.take(), None);

    r.sim.lock().unwrap().set_connected(true);

    let rpt = r.ctrl.tick(50.01);
    assert!(rpt.wheel_vels.is_some());
    assert_eq!(r.ctrl.data_store().num_cycles, 2);
}

#[test]
fn shutdown_stops_the_wheels() {
    let mut r = rig(CtrlExecParams::default());
    loc_initialised(&r.bus, 60.0);

    r.bus.target_vel.publish(TargetVelMsg {
        timestamp: 60.0,
        linear_velocity_mps: 0.5,
        angular_velocity_radps: 0.0,
    });
    r.ctrl.tick(60.0);
    assert_eq!(r.sim.lock().unwrap().demand(WheelSide::Right), 0.5);

    r.ctrl.shutdown();

    let sim = r.sim.lock().unwrap();
    assert_eq!(sim.demand(WheelSide::Left), 0.0);
    assert_eq!(sim.demand(WheelSide::Right), 0.0);
}

#[test]
fn archives_one_row_per_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::new_in("ctrl_exec", dir.path()).unwrap();

    let mut r = rig(CtrlExecParams::default());
    r.ctrl
        .attach_archive(Archiver::from_path(&session, "ctrl_loop.csv").unwrap());

    r.ctrl.tick(1.0);
    r.ctrl.tick(1.5);

    let contents = std::fs::read_to_string(session.arch_root.join("ctrl_loop.csv")).unwrap();
    let lines: Vec<&str> = contents.lines().collect();

    assert_eq!(
        lines,
        vec![
            "time_s,state,source,linear_mps,angular_radps,left_mps,right_mps,gated",
            "1.0,Idle,Zero,0.0,0.0,0.0,0.0,true",
            "1.5,Idle,Zero,0.0,0.0,0.0,0.0,true",
        ]
    );
}

#[test]
fn run_until_stopped() {
    let mut r = rig(CtrlExecParams::default());
    let mut num_hooks = 0;

    r.ctrl.run(|_, _| {
        num_hooks += 1;
        if num_hooks > 10 {
            LoopControl::Stop
        } else {
            LoopControl::Continue
        }
    });

    assert_eq!(r.ctrl.data_store().num_cycles, 10);
}

#[test]
fn overrunning_cycles_are_counted() {
    let mut r = rig(CtrlExecParams {
        cycle_frequency_hz: 200.0,
        ..CtrlExecParams::default()
    });

    // Every cycle takes four times its period
    let mut num_hooks = 0;
    r.ctrl.run(|_, _| {
        num_hooks += 1;
        if num_hooks > 3 {
            return LoopControl::Stop;
        }
        thread::sleep(Duration::from_millis(20));
        LoopControl::Continue
    });

    let ds = r.ctrl.data_store();
    assert_eq!(ds.num_cycles, 3);
    assert_eq!(ds.num_cycle_overruns, 3);
    assert_eq!(ds.num_consec_cycle_overruns, 3);

    // A cycle inside its period ends the run of overruns
    let mut num_hooks = 0;
    r.ctrl.run(|_, _| {
        num_hooks += 1;
        if num_hooks > 2 {
            LoopControl::Stop
        } else {
            LoopControl::Continue
        }
    });

    let ds = r.ctrl.data_store();
    assert_eq!(ds.num_cycles, 5);
    assert_eq!(ds.num_cycle_overruns, 3);
    assert_eq!(ds.num_consec_cycle_overruns, 0);
}
