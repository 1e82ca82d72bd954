pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod encoding;
pub mod evaluation;
pub mod features;
pub mod forest;
pub mod form;
pub mod predict;
pub mod teams;
pub mod train;
