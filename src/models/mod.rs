// Domain models: host snapshot, running sums and the averaged report

mod ranking;
mod report;
mod snapshot;
mod sums;
mod units;

pub use ranking::{Load, compare_by_load, compare_optional_by_load, rank_by_load};
pub use report::{AggregateReport, MemoryReport, ProcessReport};
pub use snapshot::{MemoryDetail, MemoryStat, ProcessStat, Snapshot};
pub use sums::{AggregateSums, MemorySums, ProcessSums};
pub use units::{bytes_to_mb, percent_of, truncate_2dp};
