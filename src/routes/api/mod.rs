mod handler;
mod model;

pub use handler::{health, tree_data};
pub use model::{HealthStatus, TreeData};
