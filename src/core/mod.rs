//! Core functionality for the wearable sensor bridge
//! This module contains the device-management subsystem and the
//! result-submission collaborator used by the testing paradigms.

pub mod bluetooth;
pub mod submission;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use submission::{HttpResultSink, ParadigmResult, ResultSink};
