//! # Bus script interpreter module
//!
//! This module provides an interpreter for bus scripts, which replay timed
//! messages onto the bus so the control executable can be driven without any
//! upstream nodes running.
//!
//! A script is a sequence of entries of the form
//!
//! ```text
//! <time_s>: <topic path> <json payload>;
//! ```
//!
//! for example `1.5: /control/target_velocity {"linear_velocity_mps": 0.2,
//! "angular_velocity_radps": 0.0};`. Lines which don't match are ignored, so
//! `#` comments are allowed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use thiserror::Error;

// Internal
use comms_if::bus::Topic;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A message which is scripted to be published at a specific time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedMsg {
    /// The session time the message is to be published at
    pub exec_time_s: f64,

    /// The topic to publish on
    pub topic: Topic,

    /// The raw payload, validated against the topic's message type on publish
    pub payload: Value,
}

/// A script interpreter.
///
/// After initialising with the script use `.get_pending` to acquire the
/// messages which are due.
pub struct ScriptInterpreter {
    msgs: VecDeque<ScriptedMsg>,
    duration_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error("Script contains an invalid timestamp: {0}. Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an unknown topic at {0} s: {1}")]
    UnknownTopic(f64, String),

    #[error("Script contains invalid JSON at {0} s: {1}")]
    InvalidJson(f64, serde_json::Error),

    #[error("Script pattern could not be compiled: {0}")]
    BadPattern(regex::Error),
}

/// The result of polling the interpreter.
#[derive(Debug)]
pub enum PendingMsgs {
    None,
    Some(Vec<ScriptedMsg>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let script = fs::read_to_string(script_path).map_err(ScriptError::ScriptLoadError)?;

        Self::parse(&script)
    }

    /// Create a new interpreter from the script's text.
    pub fn parse(script: &str) -> Result<Self, ScriptError> {
        let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*(\S+)\s+([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::BadPattern)?;

        let mut msgs: Vec<ScriptedMsg> = Vec::new();

        for cap in re.captures_iter(script) {
            let time_str = &cap[1];
            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|_| ScriptError::InvalidTimestamp(time_str.to_string()))?;

            let topic = Topic::from_path(&cap[3])
                .ok_or_else(|| ScriptError::UnknownTopic(exec_time_s, cap[3].to_string()))?;

            let payload: Value = serde_json::from_str(&cap[4])
                .map_err(|e| ScriptError::InvalidJson(exec_time_s, e))?;

            msgs.push(ScriptedMsg {
                exec_time_s,
                topic,
                payload,
            });
        }

        if msgs.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        // Entries may be written out of order, replay them in time order.
        // The sort is stable so messages sharing a time keep their order.
        msgs.sort_by(|a, b| a.exec_time_s.total_cmp(&b.exec_time_s));

        let duration_s = msgs.last().map(|m| m.exec_time_s).unwrap_or(0.0);

        Ok(ScriptInterpreter {
            msgs: msgs.into(),
            duration_s,
        })
    }

    /// Return the messages due at `elapsed_s`, or end of script if none remain.
    pub fn get_pending(&mut self, elapsed_s: f64) -> PendingMsgs {
        if self.msgs.is_empty() {
            return PendingMsgs::EndOfScript;
        }

        let mut due = vec![];

        while let Some(m) = self.msgs.front() {
            if m.exec_time_s > elapsed_s {
                break;
            }
            if let Some(m) = self.msgs.pop_front() {
                due.push(m);
            }
        }

        if due.is_empty() {
            PendingMsgs::None
        } else {
            PendingMsgs::Some(due)
        }
    }

    /// Get the number of messages left in the script
    pub fn get_num_msgs(&self) -> usize {
        self.msgs.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        self.duration_s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = r#"
# Drive forward then hand over to a plan
0.0: /localization/initialized_flag {"initialized": true};
1.0: /control/target_velocity {"linear_velocity_mps": 0.2, "angular_velocity_radps": 0.0};
0.5: /localization/robot_pose {"x_m": 0.0, "y_m": 0.0, "theta_rad": 0.0};
"#;

    #[test]
    fn test_parse_and_replay() {
        let mut si = ScriptInterpreter::parse(SCRIPT).unwrap();

        assert_eq!(si.get_num_msgs(), 3);
        assert_eq!(si.get_duration(), 1.0);

        match si.get_pending(0.0) {
            PendingMsgs::Some(v) => {
                assert_eq!(v.len(), 1);
                assert_eq!(v[0].topic, Topic::LocInit);
            }
            p => panic!("Expected one message, got {:?}", p),
        }

        assert!(matches!(si.get_pending(0.2), PendingMsgs::None));

        match si.get_pending(2.0) {
            PendingMsgs::Some(v) => {
                assert_eq!(v.len(), 2);
                assert_eq!(v[0].topic, Topic::RobotPose);
                assert_eq!(v[1].topic, Topic::TargetVel);
            }
            p => panic!("Expected two messages, got {:?}", p),
        }

        assert!(matches!(si.get_pending(3.0), PendingMsgs::EndOfScript));
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(
            ScriptInterpreter::parse("nothing to see here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::parse("1.0: /cmd_vel {};"),
            Err(ScriptError::UnknownTopic(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::parse("1.0: /control/target_velocity {\"linear\": };"),
            Err(ScriptError::InvalidJson(_, _))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.script");
        std::fs::write(&path, SCRIPT).unwrap();

        assert_eq!(ScriptInterpreter::new(&path).unwrap().get_num_msgs(), 3);
        assert!(matches!(
            ScriptInterpreter::new(dir.path().join("missing.script")),
            Err(ScriptError::ScriptLoadError(_))
        ));
    }
}
