//! # Odometry worker
//!
//! Background thread which polls the actuator for wheel positions at a fixed
//! period and feeds them through a `PoseEstimator`. The latest estimate is
//! published on a `PoseHandle` for the control loop to read.
//!
//! A failed read is a dropped sample, the estimator only ever integrates the
//! delta between two successful reads. Readings which are not finite numbers
//! count as failed reads.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{PoseEstimator, PoseHandle};
use crate::actuator::{read_wheel_positions, SharedActuator};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of consecutive dropped samples after which a warning is issued.
const DROPPED_SAMPLE_WARN_LIMIT: u64 = 50;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the running odometry thread.
///
/// The thread is stopped and joined when the worker is dropped.
pub struct OdomWorker {
    bg_jh: Option<JoinHandle<PoseEstimator>>,
    bg_run: Arc<AtomicBool>,
    pose: PoseHandle,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OdomWorker {
    /// Start polling the actuator every `period_s` seconds.
    pub fn start(estimator: PoseEstimator, actuator: SharedActuator, period_s: f64) -> Self {
        let bg_run = Arc::new(AtomicBool::new(true));
        let pose = PoseHandle::new();

        let bg_run_clone = bg_run.clone();
        let pose_clone = pose.clone();
        let period = Duration::from_secs_f64(period_s.max(0.0));

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(estimator, actuator, period, bg_run_clone, pose_clone)
        }));

        info!("OdomWorker started with a period of {:.03} s", period_s);

        Self {
            bg_jh,
            bg_run,
            pose,
        }
    }

    /// Get a handle to the pose estimate.
    pub fn pose_handle(&self) -> PoseHandle {
        self.pose.clone()
    }

    /// Stop the thread and return the estimator in its final state.
    pub fn stop(mut self) -> Option<PoseEstimator> {
        self.join()
    }

    fn join(&mut self) -> Option<PoseEstimator> {
        self.bg_run.store(false, Ordering::Relaxed);

        match self.bg_jh.take().map(|jh| jh.join()) {
            Some(Ok(est)) => {
                info!("OdomWorker stopped");
                Some(est)
            }
            Some(Err(_)) => {
                warn!("OdomWorker thread panicked");
                None
            }
            None => None,
        }
    }
}

impl Drop for OdomWorker {
    fn drop(&mut self) {
        self.join();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn bg_thread(
    mut estimator: PoseEstimator,
    actuator: SharedActuator,
    period: Duration,
    run: Arc<AtomicBool>,
    pose: PoseHandle,
) -> PoseEstimator {
    let mut num_consec_dropped: u64 = 0;

    while run.load(Ordering::Relaxed) {
        let start = Instant::now();

        pose.apply_requests(&mut estimator);

        match read_wheel_positions(&actuator) {
            Ok((left, right)) if left.is_finite() && right.is_finite() => {
                let calibrating = !estimator.is_calibrated();
                let p = estimator.update(left, right);
                pose.set(p, util::time::now_unix_s());

                if calibrating {
                    debug!("Odometry calibrated at ({:.3}, {:.3}) turns", left, right);
                }
                num_consec_dropped = 0;
            }
            Ok((left, right)) => dropped_sample(
                &mut num_consec_dropped,
                &format_args!("non-finite wheel positions ({}, {}) turns", left, right),
            ),
            Err(e) => dropped_sample(&mut num_consec_dropped, &e),
        }

        if let Some(d) = period.checked_sub(start.elapsed()) {
            thread::sleep(d);
        }
    }

    estimator
}

fn dropped_sample(num_consec_dropped: &mut u64, reason: &dyn fmt::Display) {
    *num_consec_dropped += 1;
    if *num_consec_dropped == DROPPED_SAMPLE_WARN_LIMIT {
        warn!(
            "{} consecutive odometry samples dropped, last error: {}",
            num_consec_dropped, reason
        );
    } else {
        debug!("Dropped odometry sample: {}", reason);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::actuator::{Actuator, ActuatorError, WheelSide};
    use crate::loc::LocParams;
    use std::f64::consts::PI;
    use std::sync::Mutex;

    /// Encoder which glitches on some reads and otherwise turns both wheels
    /// by 0.01 turns per read.
    struct GlitchingEncoder {
        num_reads: u64,
    }

    impl Actuator for GlitchingEncoder {
        fn set_wheel_velocity(&mut self, _: WheelSide, _: f64) -> Result<(), ActuatorError> {
            Ok(())
        }

        fn get_wheel_position_turns(&mut self, side: WheelSide) -> Result<f64, ActuatorError> {
            if side == WheelSide::Left {
                self.num_reads += 1;
            }

            match self.num_reads {
                5 | 6 => Ok(f64::NAN),
                8 if side == WheelSide::Right => Ok(f64::INFINITY),
                9 => Err(ActuatorError::Timeout(side)),
                n => Ok(n.min(200) as f64 * 0.01),
            }
        }

        fn get_wheel_velocity(&mut self, _: WheelSide) -> Result<f64, ActuatorError> {
            Ok(0.0)
        }

        fn stop(&mut self, _: WheelSide) -> Result<(), ActuatorError> {
            Ok(())
        }

        fn clear_errors(&mut self, _: WheelSide) -> Result<(), ActuatorError> {
            Ok(())
        }

        fn has_errors(&mut self) -> Result<bool, ActuatorError> {
            Ok(false)
        }
    }

    #[test]
    fn test_non_finite_readings_are_dropped() {
        let enc = Arc::new(Mutex::new(GlitchingEncoder { num_reads: 0 }));
        let shared: SharedActuator = enc.clone();

        let est = PoseEstimator::new(LocParams::default()).unwrap();
        let worker = OdomWorker::start(est, shared, 0.001);
        let pose = worker.pose_handle();

        thread::sleep(Duration::from_millis(300));

        let est = worker.stop().unwrap();
        let latest = pose.get().unwrap();
        let num_reads = enc.lock().unwrap().num_reads;

        // Reads 5, 6, 8 and 9 were dropped
        assert!(num_reads > 10);
        assert!(latest.pose.x.is_finite());
        assert!(latest.pose.yaw.is_finite());
        assert_eq!(latest.pose, est.pose());

        // Deltas are taken between good reads, so the glitches lose no travel
        let expected_m = (num_reads.min(200) - 1) as f64 * 0.01 * PI * 0.165;
        assert!(
            (est.pose().x - expected_m).abs() < 1e-9,
            "x = {}",
            est.pose().x
        );
        assert!(est.pose().z.abs() < 1e-12);
    }

    #[cfg(feature = "sim")]
    #[test]
    fn test_worker_integrates_sim() {
        use crate::actuator::SimActuator;

        let sim = Arc::new(Mutex::new(SimActuator::new_stepped(0.165)));
        let shared: SharedActuator = sim.clone();

        let est = PoseEstimator::new(LocParams::default()).unwrap();
        let worker = OdomWorker::start(est, shared, 0.001);
        let pose = worker.pose_handle();

        // Wait for the calibration read
        let deadline = Instant::now() + Duration::from_secs(2);
        while pose.get().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(pose.get().is_some());

        {
            let mut s = sim.lock().unwrap();
            s.set_wheel_velocity(WheelSide::Left, 0.5).unwrap();
            s.set_wheel_velocity(WheelSide::Right, 0.5).unwrap();
            s.step(1.0);
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while pose.get().map(|p| p.pose.x).unwrap_or(0.0) < 0.49 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        let est = worker.stop().unwrap();
        assert!((est.pose().x - 0.5).abs() < 1e-9);
        assert!(est.pose().z.abs() < 1e-9);
    }
}
