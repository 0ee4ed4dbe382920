pub mod devices;
pub mod discovery;
pub mod service;
