// Process ranking: descending CPU; memory decides only when both CPU values are zero.

use std::cmp::Ordering;

use super::{ProcessReport, ProcessStat};

/// Anything that can be ranked by CPU then memory load.
pub trait Load {
    fn cpu_percent(&self) -> f64;
    fn memory_percent(&self) -> f64;
}

impl Load for ProcessStat {
    fn cpu_percent(&self) -> f64 {
        self.cpu_percent
    }

    fn memory_percent(&self) -> f64 {
        self.memory_percent
    }
}

impl Load for ProcessReport {
    fn cpu_percent(&self) -> f64 {
        self.cpu_percent
    }

    fn memory_percent(&self) -> f64 {
        self.memory_percent
    }
}

/// Heaviest first. `Less` means `a` ranks ahead of `b`.
pub fn compare_by_load<T: Load>(a: &T, b: &T) -> Ordering {
    if a.cpu_percent() > 0.0 || b.cpu_percent() > 0.0 {
        b.cpu_percent().total_cmp(&a.cpu_percent())
    } else {
        b.memory_percent().total_cmp(&a.memory_percent())
    }
}

/// Same as [`compare_by_load`], but an absent entry on either side compares as equal.
pub fn compare_optional_by_load<T: Load>(a: Option<&T>, b: Option<&T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_by_load(a, b),
        _ => Ordering::Equal,
    }
}

/// Stable in-place ranking, heaviest first.
pub fn rank_by_load<T: Load>(items: &mut [T]) {
    items.sort_by(compare_by_load);
}
