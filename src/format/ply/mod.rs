pub mod exporter;
pub mod internal;
pub mod weights;
