// Key layout of one test's aggregate in the shared store. Everything lives under "<test_id>:".
//
//   <id>:steps                      counter, ticks folded
//   <id>:cpu                        float sum
//   <id>:swap, <id>:vm              hashes: total/used/available (byte sums), percent (float sum)
//   <id>:pids:<table>               hashes keyed by pid

pub const TOTAL: &str = "total";
pub const USED: &str = "used";
pub const AVAILABLE: &str = "available";
pub const PERCENT: &str = "percent";

/// Per-pid hash tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PidTable {
    Names,
    Status,
    Cwd,
    CreationTime,
    MemoryInfo,
    NumThreads,
    MemPercent,
    CpuPercent,
}

impl PidTable {
    pub const ALL: [PidTable; 8] = [
        PidTable::Names,
        PidTable::Status,
        PidTable::Cwd,
        PidTable::CreationTime,
        PidTable::MemoryInfo,
        PidTable::NumThreads,
        PidTable::MemPercent,
        PidTable::CpuPercent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PidTable::Names => "names",
            PidTable::Status => "status",
            PidTable::Cwd => "cwd",
            PidTable::CreationTime => "creationTime",
            PidTable::MemoryInfo => "memoryInfo",
            PidTable::NumThreads => "numThreads",
            PidTable::MemPercent => "memPercent",
            PidTable::CpuPercent => "cpuPercent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    prefix: String,
}

impl SessionKeys {
    pub fn new(test_id: &str) -> Self {
        Self {
            prefix: test_id.to_string(),
        }
    }

    pub fn steps(&self) -> String {
        format!("{}:steps", self.prefix)
    }

    pub fn cpu(&self) -> String {
        format!("{}:cpu", self.prefix)
    }

    pub fn swap(&self) -> String {
        format!("{}:swap", self.prefix)
    }

    pub fn vm(&self) -> String {
        format!("{}:vm", self.prefix)
    }

    pub fn pids(&self, table: PidTable) -> String {
        format!("{}:pids:{}", self.prefix, table.as_str())
    }
}
