//! JSON files for solver configuration, restart states and results.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::sim::boundary_layer::{BoundaryLayerConfig, BoundaryLayerReport, BoundaryLayerState};

/// Reads a solver configuration. Missing fields take their default values.
pub fn read_config(path: &Path) -> Result<BoundaryLayerConfig> {
    let config: BoundaryLayerConfig = read_json(path, "configuration")?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &BoundaryLayerConfig) -> Result<()> {
    write_json(path, config, "configuration")
}

/// Reads normalized unknowns saved by [`write_state`], e.g. to restart a solve.
pub fn read_state(path: &Path) -> Result<BoundaryLayerState> {
    read_json(path, "state")
}

pub fn write_state(path: &Path, state: &BoundaryLayerState) -> Result<()> {
    write_json(path, state, "state")
}

pub fn read_report(path: &Path) -> Result<BoundaryLayerReport> {
    read_json(path, "report")
}

pub fn write_report(path: &Path, report: &BoundaryLayerReport) -> Result<()> {
    write_json(path, report, "report")
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse {} file: {}", what, path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)
        .with_context(|| format!("Failed to write {} file: {}", what, path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::boundary_layer::ShapeParameters;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");

        let mut config = BoundaryLayerConfig::default();
        config.freestream.velocity = 25.0;
        config.newton.recouple_every = Some(5);
        config.gmres.krylov_dim = 300;
        write_config(&path, &config)?;

        let loaded = read_config(&path)?;
        assert_eq!(loaded.freestream.velocity, 25.0);
        assert_eq!(loaded.newton.recouple_every, Some(5));
        assert_eq!(loaded.gmres.krylov_dim, 300);
        assert_eq!(loaded.profile.layers, 300);
        Ok(())
    }

    #[test]
    fn test_read_invalid_config() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"freestream": {"density": -1.0}}"#)?;
        assert!(read_config(&path).is_err());

        fs::write(&path, "not json")?;
        let err = read_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration"));
        Ok(())
    }

    #[test]
    fn test_state_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("state.json");
        let params = ShapeParameters {
            delta: 1.5e-3,
            a: 0.9,
            b: 0.01,
            psi: 0.02,
            ctau1: 3e-5,
            ctau2: 0.0,
        };
        let state = BoundaryLayerState::from_parameters(&[params, params]);
        write_state(&path, &state)?;
        let loaded = read_state(&path)?;
        assert_eq!(loaded.face_count(), 2);
        for (a, b) in loaded.normalized(1).iter().zip(state.normalized(1)) {
            assert!((a - b).abs() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = read_report(Path::new("/nonexistent/report.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to open file"));
    }
}
