// Calibration module - adaptive zero/scale calibration engine
//
// Components, leaves first:
// 1. RingBuffer: fixed-capacity circular container shared by every history
// 2. CalibrationStore: bias/scale under a bounded-wait lock
// 3. StabilityDetector: rolling current history and stable-load state machine
// 4. DeviceCatalog: first-match load signature recognition
// 5. LearningSystem: decayed weighted scale estimator
// 6. AutoCalStatistics: counters surfaced to the command interface
// 7. controller: periodic zero/learning/sensitivity loop

pub mod controller;
pub mod learning;
pub mod recognition;
pub mod ring;
pub mod stability;
pub mod statistics;
pub mod store;

pub use controller::{next_sensitivity, AutoCalController, ControllerHandle, IterationReport};
pub use learning::{estimate_scale, CalibrationPoint, LearnedScale, LearningSystem};
pub use recognition::{DeviceCatalog, DeviceProfile, Recognition};
pub use ring::RingBuffer;
pub use stability::{StabilityDetector, StabilityEvent, StabilityPhase, StabilityState};
pub use statistics::AutoCalStatistics;
pub use store::{CalibrationParameters, CalibrationStore};
