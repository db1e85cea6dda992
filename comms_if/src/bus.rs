//! # Latest-value bus
//!
//! Each topic is a single-slot `Mailbox`. Publishing overwrites the slot, and
//! a reader taking from it gets each published value at most once, so a
//! message seen by the control loop is always fresh for that cycle.
//!
//! Raw JSON payloads are parsed into the typed messages and validated here, a
//! payload which fails is rejected and never reaches a mailbox.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

// Internal
use crate::msg::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single-slot, latest-value mailbox shared between publishers and readers.
///
/// Clones refer to the same slot.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    read: bool,
}

/// The set of topics used by the control core.
#[derive(Debug, Clone, Default)]
pub struct Bus {
    /// `/localization/initialized_flag`
    pub loc_init: Mailbox<LocInitMsg>,

    /// `/control/target_velocity`
    pub target_vel: Mailbox<TargetVelMsg>,

    /// `/localization/robot_pose`
    pub robot_pose: Mailbox<RobotPoseMsg>,

    /// `/planning/path_plan`
    pub path_plan: Mailbox<PathPlanMsg>,

    /// `/wheel_velocities_mps`
    pub wheel_vels: Mailbox<WheelVelsMsg>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Bus topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    LocInit,
    TargetVel,
    RobotPose,
    PathPlan,
    WheelVels,
}

/// Reasons a raw payload is rejected at the bus boundary.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Payload for {0} is not a JSON object")]
    NotAnObject(Topic),

    #[error("Payload for {0} does not match the message: {1}")]
    DeserialiseError(Topic, serde_json::Error),

    #[error("Message on {0} is invalid: {1}")]
    InvalidMessage(Topic, MsgError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                value: None,
                read: false,
            })),
        }
    }
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Clone> Mailbox<T> {
    /// Overwrite the slot with a new value and mark it unread.
    pub fn publish(&self, value: T) {
        let mut slot = self.lock();
        slot.value = Some(value);
        slot.read = false;
    }

    /// Take the latest value if it hasn't been taken since it was published.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.lock();
        if slot.read {
            return None;
        }
        slot.read = true;
        slot.value.clone()
    }

    /// Get the latest value regardless of whether it has been taken.
    pub fn peek(&self) -> Option<T> {
        self.lock().value.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        // The slot is always left consistent, so a poisoned lock is still usable
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Topic {
    /// All topics, in declaration order.
    pub const ALL: [Topic; 5] = [
        Topic::LocInit,
        Topic::TargetVel,
        Topic::RobotPose,
        Topic::PathPlan,
        Topic::WheelVels,
    ];

    /// The topic's path on the robot's message bus.
    pub fn path(&self) -> &'static str {
        match self {
            Topic::LocInit => "/localization/initialized_flag",
            Topic::TargetVel => "/control/target_velocity",
            Topic::RobotPose => "/localization/robot_pose",
            Topic::PathPlan => "/planning/path_plan",
            Topic::WheelVels => "/wheel_velocities_mps",
        }
    }

    /// Find the topic with the given path.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.path() == path)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse, validate and publish a raw JSON payload, stamping it with
    /// `now_s` if it has no timestamp.
    ///
    /// See `publish_stamped`.
    pub fn publish_json(&self, topic: Topic, payload: &str, now_s: f64) -> Result<(), BusError> {
        let value: Value = serde_json::from_str(payload).map_err(|e| {
            warn!("Rejected payload on {}: {}", topic, e);
            BusError::InvalidJson(e)
        })?;

        self.publish_stamped(topic, value, now_s)
    }

    /// Validate and publish a JSON value.
    ///
    /// The payload may be wrapped in a `{"data": {...}}` envelope. Rejected
    /// payloads are logged as warnings and are not published.
    pub fn publish_value(&self, topic: Topic, value: Value) -> Result<(), BusError> {
        let result = self.dispatch(topic, unwrap_envelope(value));
        if let Err(ref e) = result {
            warn!("Rejected payload: {}", e);
        }
        result
    }

    /// Publish a JSON value, filling in the `timestamp` field with `now_s` if
    /// the payload doesn't carry one.
    pub fn publish_stamped(&self, topic: Topic, value: Value, now_s: f64) -> Result<(), BusError> {
        let mut value = unwrap_envelope(value);

        match value {
            Value::Object(ref mut map) => {
                if !map.contains_key("timestamp") {
                    map.insert("timestamp".into(), Value::from(now_s));
                }
            }
            _ => {
                warn!("Rejected payload: {}", BusError::NotAnObject(topic));
                return Err(BusError::NotAnObject(topic));
            }
        }

        self.publish_value(topic, value)
    }

    fn dispatch(&self, topic: Topic, value: Value) -> Result<(), BusError> {
        if !value.is_object() {
            return Err(BusError::NotAnObject(topic));
        }

        match topic {
            Topic::LocInit => self.loc_init.publish(parse(topic, value)?),
            Topic::TargetVel => self.target_vel.publish(parse(topic, value)?),
            Topic::RobotPose => self.robot_pose.publish(parse(topic, value)?),
            Topic::PathPlan => self.path_plan.publish(parse(topic, value)?),
            Topic::WheelVels => self.wheel_vels.publish(parse(topic, value)?),
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        v => v,
    }
}

fn parse<T>(topic: Topic, value: Value) -> Result<T, BusError>
where
    T: DeserializeOwned + Validate,
{
    let msg: T = serde_json::from_value(value).map_err(|e| BusError::DeserialiseError(topic, e))?;
    msg.validate()
        .map_err(|e| BusError::InvalidMessage(topic, e))?;
    Ok(msg)
}
