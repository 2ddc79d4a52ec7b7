use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// 單一階段的耗時與記憶體紀錄
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub elapsed: Duration,
    pub memory_mb: Option<u64>,
}

/// 記錄每個 pipeline 階段的耗時，CLI 模式下另外取樣行程記憶體
pub struct RunMonitor {
    enabled: bool,
    started: Instant,
    last_mark: Instant,
    phases: Vec<PhaseStats>,
    #[cfg(feature = "cli")]
    system: System,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
}

impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            started: now,
            last_mark: now,
            phases: Vec::new(),
            #[cfg(feature = "cli")]
            system: System::new(),
            #[cfg(feature = "cli")]
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 結束目前階段並記錄
    pub fn mark(&mut self, phase: &str) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let stats = PhaseStats {
            phase: phase.to_string(),
            elapsed: now.duration_since(self.last_mark),
            memory_mb: self.sample_memory_mb(),
        };
        self.last_mark = now;

        match stats.memory_mb {
            Some(mb) => tracing::info!("📊 {} - {:?}, memory {}MB", stats.phase, stats.elapsed, mb),
            None => tracing::info!("📊 {} - {:?}", stats.phase, stats.elapsed),
        }
        self.phases.push(stats);
    }

    pub fn phases(&self) -> &[PhaseStats] {
        &self.phases
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let peak = self.phases.iter().filter_map(|p| p.memory_mb).max();
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}",
            self.started.elapsed(),
            peak.map(|mb| format!("{}MB", mb))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    #[cfg(feature = "cli")]
    fn sample_memory_mb(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system
            .process(pid)
            .map(|process| process.memory() / 1024 / 1024)
    }

    #[cfg(not(feature = "cli"))]
    fn sample_memory_mb(&mut self) -> Option<u64> {
        None
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
