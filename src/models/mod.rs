pub mod counts;
pub mod result;
pub mod stats;
pub mod status;
pub mod suite;
pub mod update;

pub use counts::{FamilyCounts, FileCount, TestCounts};
pub use result::{RunResults, SuiteResult, SuiteSet};
pub use stats::TestStats;
pub use status::{RunStatus, SuiteStatus};
pub use suite::{SuiteId, SuiteKind};
pub use update::{LiveUpdate, StreamMessage};
