//! # Simulated actuator
//!
//! An in-memory two wheel drive. Demanded velocities are reached instantly
//! and integrated into wheel positions against the wall clock, or against a
//! manually stepped clock for tests. Faults and failed reads can be injected.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use std::f64::consts::PI;
use std::time::Instant;

use super::{Actuator, ActuatorError, WheelSide};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Simulated two wheel actuator.
#[derive(Debug)]
pub struct SimActuator {
    /// Units: meters
    wheel_diameter_m: f64,

    left: SimAxis,
    right: SimAxis,

    /// Last wall clock integration, `None` when stepped manually
    last_instant: Option<Instant>,

    /// Number of upcoming position reads which will time out
    failing_reads: u32,

    connected: bool,
}

#[derive(Debug, Default)]
struct SimAxis {
    /// Units: meters/second
    vel_mps: f64,

    /// Units: turns
    pos_turns: f64,

    fault: Option<String>,

    num_demands: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimActuator {
    /// Create a simulator which integrates against the wall clock.
    pub fn new(wheel_diameter_m: f64) -> Self {
        Self {
            last_instant: Some(Instant::now()),
            ..Self::new_stepped(wheel_diameter_m)
        }
    }

    /// Create a simulator which only moves when `step` is called.
    pub fn new_stepped(wheel_diameter_m: f64) -> Self {
        Self {
            wheel_diameter_m,
            left: SimAxis::default(),
            right: SimAxis::default(),
            last_instant: None,
            failing_reads: 0,
            connected: true,
        }
    }

    /// Integrate the wheel velocities over `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        let circ_m = PI * self.wheel_diameter_m;
        for axis in [&mut self.left, &mut self.right].iter_mut() {
            axis.pos_turns += axis.vel_mps * dt_s / circ_m;
        }
    }

    /// Latch a fault on an axis. The axis stops and rejects demands until
    /// its errors are cleared.
    pub fn inject_fault(&mut self, side: WheelSide, reason: &str) {
        warn!("SimActuator: injecting fault on {} axis: {}", side, reason);
        let axis = self.axis_mut(side);
        axis.fault = Some(reason.to_string());
        axis.vel_mps = 0.0;
    }

    /// Make the next `n` position reads time out.
    pub fn fail_next_reads(&mut self, n: u32) {
        self.failing_reads = n;
    }

    /// Simulate losing or regaining the connection to the driver.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// The velocity the axis is currently running at.
    ///
    /// Units: meters/second
    pub fn demand(&self, side: WheelSide) -> f64 {
        self.axis(side).vel_mps
    }

    /// Number of accepted velocity demands on the axis.
    pub fn num_demands(&self, side: WheelSide) -> u64 {
        self.axis(side).num_demands
    }

    fn axis(&self, side: WheelSide) -> &SimAxis {
        match side {
            WheelSide::Left => &self.left,
            WheelSide::Right => &self.right,
        }
    }

    fn axis_mut(&mut self, side: WheelSide) -> &mut SimAxis {
        match side {
            WheelSide::Left => &mut self.left,
            WheelSide::Right => &mut self.right,
        }
    }

    /// Bring the positions up to date with the wall clock and check the
    /// connection.
    fn sync(&mut self) -> Result<(), ActuatorError> {
        if !self.connected {
            return Err(ActuatorError::Disconnected);
        }

        if let Some(last) = self.last_instant {
            let now = Instant::now();
            self.step((now - last).as_secs_f64());
            self.last_instant = Some(now);
        }

        Ok(())
    }
}

impl Actuator for SimActuator {
    fn set_wheel_velocity(&mut self, side: WheelSide, vel_mps: f64) -> Result<(), ActuatorError> {
        self.sync()?;

        if !vel_mps.is_finite() {
            return Err(ActuatorError::InvalidDemand(side, vel_mps));
        }

        let axis = self.axis_mut(side);
        if let Some(ref reason) = axis.fault {
            return Err(ActuatorError::AxisFault(side, reason.clone()));
        }

        axis.vel_mps = vel_mps;
        axis.num_demands += 1;

        Ok(())
    }

    fn get_wheel_position_turns(&mut self, side: WheelSide) -> Result<f64, ActuatorError> {
        self.sync()?;

        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(ActuatorError::Timeout(side));
        }

        Ok(self.axis(side).pos_turns)
    }

    fn get_wheel_velocity(&mut self, side: WheelSide) -> Result<f64, ActuatorError> {
        self.sync()?;
        Ok(self.axis(side).vel_mps)
    }

    fn stop(&mut self, side: WheelSide) -> Result<(), ActuatorError> {
        self.sync()?;
        self.axis_mut(side).vel_mps = 0.0;
        Ok(())
    }

    fn clear_errors(&mut self, side: WheelSide) -> Result<(), ActuatorError> {
        self.sync()?;
        if self.axis_mut(side).fault.take().is_some() {
            debug!("SimActuator: cleared fault on {} axis", side);
        }
        Ok(())
    }

    fn has_errors(&mut self) -> Result<bool, ActuatorError> {
        self.sync()?;
        Ok(self.left.fault.is_some() || self.right.fault.is_some())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stepped_integration() {
        let mut sim = SimActuator::new_stepped(1.0 / PI);

        sim.set_wheel_velocity(WheelSide::Left, 1.0).unwrap();
        sim.set_wheel_velocity(WheelSide::Right, -0.5).unwrap();
        sim.step(2.0);

        // Circumference of 1 m so turns == meters
        assert!((sim.get_wheel_position_turns(WheelSide::Left).unwrap() - 2.0).abs() < 1e-12);
        assert!((sim.get_wheel_position_turns(WheelSide::Right).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(sim.get_wheel_velocity(WheelSide::Right).unwrap(), -0.5);
    }

    #[test]
    fn test_faults() {
        let mut sim = SimActuator::new_stepped(0.165);

        sim.set_wheel_velocity(WheelSide::Left, 0.3).unwrap();
        sim.inject_fault(WheelSide::Left, "overcurrent");

        assert!(sim.has_errors().unwrap());
        assert_eq!(sim.demand(WheelSide::Left), 0.0);
        assert!(matches!(
            sim.set_wheel_velocity(WheelSide::Left, 0.3),
            Err(ActuatorError::AxisFault(WheelSide::Left, _))
        ));

        sim.clear_errors(WheelSide::Left).unwrap();
        assert!(!sim.has_errors().unwrap());
        sim.set_wheel_velocity(WheelSide::Left, 0.3).unwrap();
        assert_eq!(sim.num_demands(WheelSide::Left), 2);
    }

    #[test]
    fn test_failed_reads_and_disconnect() {
        let mut sim = SimActuator::new_stepped(0.165);

        sim.fail_next_reads(1);
        assert_eq!(
            sim.get_wheel_position_turns(WheelSide::Right),
            Err(ActuatorError::Timeout(WheelSide::Right))
        );
        assert_eq!(sim.get_wheel_position_turns(WheelSide::Right), Ok(0.0));

        sim.set_connected(false);
        assert_eq!(sim.stop(WheelSide::Left), Err(ActuatorError::Disconnected));
    }
}
