//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (DIFFBOT_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the `params` directory in the software root.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let mut path = crate::host::get_sw_root().map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    load_from(path)
}

/// Load a parameter file from an explicit path.
pub fn load_from<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>,
{
    // Load the file into a string
    let params_str = read_to_string(path).map_err(LoadError::FileLoadError)?;

    // Parse the string into the parameter struct
    toml::from_str(params_str.as_str()).map_err(LoadError::DeserialiseError)
}

/// Load a parameter file, falling back on the default parameters if the
/// software root isn't set or the file doesn't exist.
///
/// A file which exists but cannot be parsed is still an error.
pub fn load_or_default<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned + Default,
{
    match load(param_file_path) {
        Ok(p) => Ok(p),
        Err(LoadError::SwRootNotSet) => {
            info!(
                "Software root not set, using default parameters for {}",
                param_file_path
            );
            Ok(P::default())
        }
        Err(LoadError::FileLoadError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(
                "No parameter file {} found, using defaults",
                param_file_path
            );
            Ok(P::default())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct TestParams {
        wheel_base_m: f64,
        cycle_frequency_hz: f64,
    }

    #[test]
    fn test_load_from() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wheel_base_m = 0.425\ncycle_frequency_hz = 300.0").unwrap();

        let p: TestParams = load_from(file.path()).unwrap();

        assert_eq!(
            p,
            TestParams {
                wheel_base_m: 0.425,
                cycle_frequency_hz: 300.0
            }
        );
    }

    #[test]
    fn test_load_from_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wheel_base_m = \"wide\"").unwrap();

        match load_from::<TestParams, _>(file.path()) {
            Err(LoadError::DeserialiseError(_)) => (),
            r => panic!("Expected a deserialise error, got {:?}", r),
        }
    }
}
