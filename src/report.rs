use std::env;
use std::fs;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::hardware::CoreId;
use crate::stages::StageRecord;
use crate::timeq::Cycle;

/// Creates a fresh run directory below `root`, or below `EENN_STAGE_LOG_DIR`
/// (default `stage_logs`) when no root is given.
pub fn create_run_dir(root: Option<&Path>) -> Option<PathBuf> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => env::var("EENN_STAGE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("stage_logs")),
    };
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let pid = std::process::id();
    let run_dir = root.join(format!("run_{ts}_{pid}"));
    if fs::create_dir_all(&run_dir).is_err() {
        return None;
    }
    Some(run_dir)
}

#[derive(Debug, Serialize)]
pub struct StageLogRecord<'a> {
    pub candidate: &'a [CoreId],
    #[serde(flatten)]
    pub stage: &'a StageRecord,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub candidate: Vec<CoreId>,
    pub total_energy: f64,
    pub total_latency: Cycle,
    pub stages: Vec<StageRecord>,
}

/// Appends per-stage records as JSON lines; shared by concurrent evaluations.
pub struct StageLog {
    dir: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl StageLog {
    pub fn create(dir: &Path) -> io::Result<StageLog> {
        fs::create_dir_all(dir)?;
        let file = File::create(dir.join("stages.jsonl"))?;
        Ok(StageLog {
            dir: dir.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_stages(&self, candidate: &[CoreId], stages: &[StageRecord]) -> io::Result<()> {
        let mut guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for stage in stages {
            let record = StageLogRecord { candidate, stage };
            let payload = serde_json::to_string(&record)?;
            writeln!(guard, "{payload}")?;
        }
        guard.flush()
    }

    pub fn write_summary(&self, summary: &RunSummary) -> io::Result<()> {
        let payload = serde_json::to_string_pretty(summary)?;
        fs::write(self.dir.join("summary.json"), payload)
    }
}
