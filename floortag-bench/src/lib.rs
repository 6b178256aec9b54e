pub mod metrics;
pub mod scene;
pub mod transform;
