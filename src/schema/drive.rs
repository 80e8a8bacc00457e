//! `drive.v1` message types (deployment surface).

use serde::{Deserialize, Serialize};

use super::config::Config;

/// Binds a configuration and a tau binary source into a new drive.
/// Exactly one of the `tau` variants may be set; none means the service
/// default.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DriveRequest {
    pub config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Opaque server-issued drive handle.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    #[serde(default)]
    pub id: String,
}

/// Opaque server-issued course handle.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PlotRequest {
    pub drive: Drive,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shapes: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub concurrency: i32,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

/// One progress record of a displacement stream.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplacementProgress {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    /// Percentage, 0..=100.
    #[serde(default)]
    pub progress: i32,
    /// Non-empty when this step failed.
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
