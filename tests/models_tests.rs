// Model tests: JSON field names and the ranking order's properties

mod common;

use common::process;
use std::cmp::Ordering;
use stressmon::models::*;

#[test]
fn test_snapshot_serialization_camel_case() {
    let s = Snapshot {
        cpu_percent: 12.5,
        processes: vec![process(1, 1.0, 2.0)],
        ..Snapshot::empty()
    };
    let json = serde_json::to_string(&s).unwrap();
    assert!(json.contains("\"cpuPercent\""));
    assert!(json.contains("\"virtualMemory\""));
    assert!(json.contains("\"swapMemory\""));
    assert!(json.contains("\"usedPercent\""));
    assert!(json.contains("\"workingDir\""));
    assert!(json.contains("\"createdAt\""));
    assert!(json.contains("\"memoryDetail\""));
    assert!(json.contains("\"numThreads\""));
    let back: Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, s);
}

#[test]
fn test_report_serialization_uses_megabyte_fields() {
    let report = AggregateReport {
        test_id: "t".into(),
        steps: 2,
        cpu_percent: 1.0,
        virtual_memory: MemoryReport::default(),
        swap_memory: MemoryReport {
            total_mb: 4.0,
            used_mb: 1.5,
            available_mb: 2.5,
            used_percent: 37.5,
        },
        processes: vec![],
    };
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"testId\":\"t\""));
    assert!(json.contains("\"usedMb\":1.5"));
    assert!(json.contains("\"totalMb\""));
}

#[test]
fn test_memory_stat_megabyte_views_floor() {
    let m = MemoryStat {
        total: 3 * 1024 * 1024 + 1000,
        used: 1024 * 1024,
        available: 0,
        used_percent: 33.3,
    };
    // 3.00095 MB floors to 3.0
    assert_eq!(m.total_mb(), 3.0);
    assert_eq!(m.used_mb(), 1.0);
    assert_eq!(m.available_mb(), 0.0);
}

#[test]
fn test_ranking_is_a_total_preorder() {
    let values = [0.0, 0.5, 10.0, 33.3];
    let mut items = Vec::new();
    for cpu in values {
        for mem in values {
            items.push(process(items.len() as u32, cpu, mem));
        }
    }

    for a in &items {
        assert_eq!(compare_by_load(a, a), Ordering::Equal, "reflexive");
        for b in &items {
            assert_eq!(
                compare_by_load(a, b),
                compare_by_load(b, a).reverse(),
                "antisymmetric"
            );
            for c in &items {
                if compare_by_load(a, b) != Ordering::Greater
                    && compare_by_load(b, c) != Ordering::Greater
                {
                    assert_ne!(compare_by_load(a, c), Ordering::Greater, "transitive");
                }
            }
        }
    }
}

#[test]
fn test_ranking_is_stable_for_ties() {
    let mut list = vec![
        process(1, 7.0, 1.0),
        process(2, 7.0, 9.0),
        process(3, 0.0, 4.0),
        process(4, 0.0, 4.0),
    ];
    rank_by_load(&mut list);
    let order: Vec<u32> = list.iter().map(|p| p.pid).collect();
    assert_eq!(order, vec![1, 2, 3, 4]);
}

#[test]
fn test_fold_over_empty_snapshots_counts_steps_only() {
    let sums = (0..4).fold(AggregateSums::default(), |acc, _| acc.fold(&Snapshot::empty()));
    let report = sums.report("idle").unwrap();
    assert_eq!(report.steps, 4);
    assert_eq!(report.cpu_percent, 0.0);
    assert!(report.processes.is_empty());
}
