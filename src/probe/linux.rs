// Linux-specific helpers: per-process counters from /proc/<pid>/status.

/// Fields of /proc/<pid>/status that sysinfo does not expose. Sizes in bytes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(super) struct ProcStatus {
    pub(super) threads: Option<u32>,
    pub(super) vm_data: u64,
    pub(super) vm_stack: u64,
    pub(super) vm_locked: u64,
    pub(super) vm_swap: u64,
}

/// Read /proc/<pid>/status (Linux). None when the process is gone or the file is unreadable.
pub(super) fn read_proc_status(pid: u32) -> Option<ProcStatus> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
        Some(parse_proc_status(&content))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = pid;
        None
    }
}

pub(super) fn parse_proc_status(content: &str) -> ProcStatus {
    let mut status = ProcStatus::default();
    for line in content.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name {
            "Threads" => status.threads = value.parse().ok(),
            "VmData" => status.vm_data = parse_kb(value),
            "VmStk" => status.vm_stack = parse_kb(value),
            "VmLck" => status.vm_locked = parse_kb(value),
            "VmSwap" => status.vm_swap = parse_kb(value),
            _ => {}
        }
    }
    status
}

/// "1234 kB" -> bytes. Unparseable values read as 0.
fn parse_kb(value: &str) -> u64 {
    value
        .split_whitespace()
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .map(|kb| kb * 1024)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tpostgres\nState:\tS (sleeping)\nVmLck:\t       0 kB\n\
VmData:\t    2048 kB\nVmStk:\t     132 kB\nVmSwap:\t      16 kB\nThreads:\t7\n";

    #[test]
    fn parses_thread_count_and_memory_fields() {
        let status = parse_proc_status(STATUS);
        assert_eq!(status.threads, Some(7));
        assert_eq!(status.vm_data, 2048 * 1024);
        assert_eq!(status.vm_stack, 132 * 1024);
        assert_eq!(status.vm_locked, 0);
        assert_eq!(status.vm_swap, 16 * 1024);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let status = parse_proc_status("Name:\tkthreadd\n");
        assert_eq!(status, ProcStatus::default());
    }

    #[test]
    fn garbage_size_reads_as_zero() {
        assert_eq!(parse_kb("n/a kB"), 0);
    }
}
