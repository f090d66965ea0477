//! Radar detections and feature extraction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::transforms::time_sec_to_index;
use crate::error::{invalid_param, ClusterError};

/// One backscatter measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Seconds since an arbitrary epoch shared by the stream.
    pub time_sec: f64,
    pub beam: usize,
    pub gate: usize,
    /// Line-of-sight Doppler velocity (m/s)
    #[serde(default)]
    pub velocity: f64,
    /// Spectral width (m/s)
    #[serde(default)]
    pub spectral_width: f64,
    /// Backscatter power (dB)
    #[serde(default)]
    pub power: f64,
}

impl Detection {
    /// Detection with only its position set.
    pub fn at(time_sec: f64, beam: usize, gate: usize) -> Self {
        Self {
            time_sec,
            beam,
            gate,
            velocity: 0.0,
            spectral_width: 0.0,
            power: 0.0,
        }
    }
}

/// Column of a feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    Gate,
    Beam,
    TimeIndex,
    Velocity,
    SpectralWidth,
    Power,
}

impl FeatureColumn {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::Gate => "gate",
            FeatureColumn::Beam => "beam",
            FeatureColumn::TimeIndex => "time_index",
            FeatureColumn::Velocity => "velocity",
            FeatureColumn::SpectralWidth => "spectral_width",
            FeatureColumn::Power => "power",
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureColumn {
    type Err = ClusterError;

    /// Accepts the column names and the SuperDARN fit-file aliases
    /// (`slist`, `bmnum`, `v`, `w_l`, `p_l`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gate" | "slist" => Ok(FeatureColumn::Gate),
            "beam" | "bmnum" => Ok(FeatureColumn::Beam),
            "time_index" => Ok(FeatureColumn::TimeIndex),
            "velocity" | "v" => Ok(FeatureColumn::Velocity),
            "spectral_width" | "w_l" => Ok(FeatureColumn::SpectralWidth),
            "power" | "p_l" => Ok(FeatureColumn::Power),
            other => Err(invalid_param(
                "columns",
                format!("unknown feature column '{}'", other),
            )),
        }
    }
}

/// Build a row-per-detection feature matrix for a matrix backend.
///
/// # Errors
///
/// Returns `InvalidParams` if `columns` is empty or the time index cannot be
/// computed.
pub fn feature_matrix(
    stream: &[Detection],
    columns: &[FeatureColumn],
) -> Result<Vec<Vec<f32>>, ClusterError> {
    if columns.is_empty() {
        return Err(invalid_param("columns", "at least one feature column is required"));
    }

    let time_index = if columns.contains(&FeatureColumn::TimeIndex) {
        let times: Vec<f64> = stream.iter().map(|d| d.time_sec).collect();
        time_sec_to_index(&times)?
    } else {
        Vec::new()
    };

    let rows = stream
        .iter()
        .enumerate()
        .map(|(i, d)| {
            columns
                .iter()
                .map(|column| match column {
                    FeatureColumn::Gate => d.gate as f32,
                    FeatureColumn::Beam => d.beam as f32,
                    FeatureColumn::TimeIndex => time_index[i] as f32,
                    FeatureColumn::Velocity => d.velocity as f32,
                    FeatureColumn::SpectralWidth => d.spectral_width as f32,
                    FeatureColumn::Power => d.power as f32,
                })
                .collect()
        })
        .collect();
    Ok(rows)
}
