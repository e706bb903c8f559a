pub mod types;

pub use types::{
    HarnessError, HarnessResult, InteractionOutcome, LogLevel, LogLine, ScenarioFailure,
    ScenarioLog, ScenarioResult,
};
