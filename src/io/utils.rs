//! Utilities for input/output.

#[cfg(feature = "json")]
use serde::{de::DeserializeOwned, Serialize};
#[cfg(feature = "json")]
use std::{fs, io, path};

/// Serializes the given data into JSON format and saves it at the given path.
#[cfg(feature = "json")]
pub fn save_data_as_json<T: Serialize>(file_path: &path::Path, data: &T) -> io::Result<()> {
    let file = fs::File::create(file_path)?;
    serde_json::to_writer(io::BufWriter::new(file), data)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

/// Reads and deserializes JSON data from the file at the given path.
#[cfg(feature = "json")]
pub fn read_json_file<T: DeserializeOwned>(file_path: &path::Path) -> io::Result<T> {
    let file = fs::File::open(file_path)?;
    serde_json::from_reader(io::BufReader::new(file))
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::tracing::TracerConfig;

    #[test]
    fn tracer_config_survives_json_file() {
        let file_path = std::env::temp_dir().join("pfss_trace_config_test.json");
        let config = TracerConfig {
            max_steps: 42,
            ..TracerConfig::default()
        };
        save_data_as_json(&file_path, &config).unwrap();
        let read: TracerConfig = read_json_file(&file_path).unwrap();
        assert_eq!(read.max_steps, 42);
        assert_eq!(read.tolerance_absolute, config.tolerance_absolute);
        fs::remove_file(&file_path).unwrap();
    }
}
