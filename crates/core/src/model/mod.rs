pub mod raw;
pub mod trace;

pub use raw::{KeyValue, RawLog, RawProcess, RawReference, RawSpan, RawTrace};
pub use trace::{Step, StepStatus, Trace};
