pub mod exception;
pub mod model;
pub mod repository;
pub mod service;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "mock")]
pub mod mock;
