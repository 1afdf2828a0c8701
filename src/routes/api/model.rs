use serde::Serialize;

use crate::routes::record::Fruit;

/// Body of `/api/tree-data`, consumed by the tree visualization as-is.
#[derive(Debug, Serialize)]
pub struct TreeData {
    pub fruits: Vec<Fruit>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
}
