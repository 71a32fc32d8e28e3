use std::{
    fmt::Display,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use crate::error::OrchestratorError;

const LOG_FILE: &str = "finetune.log";

/// The log of a single run, written next to its checkpoints.
///
/// Every entry is also forwarded to the `log` facade.
pub struct RunLog {
    path: PathBuf,
    writer: BufWriter<File>,
    started: Instant,
}

impl RunLog {
    /// Creates `run_dir` if needed and starts a fresh log file inside it.
    pub fn create(run_dir: &Path) -> Result<Self, OrchestratorError> {
        fs::create_dir_all(run_dir)?;

        let path = run_dir.join(LOG_FILE);
        let writer = BufWriter::new(File::create(&path)?);

        Ok(Self {
            path,
            writer,
            started: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a run level event.
    pub fn info(&mut self, msg: impl Display) -> Result<(), OrchestratorError> {
        log::info!("{msg}");
        self.write("INFO", msg)
    }

    /// Records something that went wrong without ending the run.
    pub fn warn(&mut self, msg: impl Display) -> Result<(), OrchestratorError> {
        log::warn!("{msg}");
        self.write("WARN", msg)
    }

    /// Flushes the log and closes the file.
    pub fn finish(mut self) -> Result<(), OrchestratorError> {
        self.writer.flush()?;
        Ok(())
    }

    fn write(&mut self, level: &str, msg: impl Display) -> Result<(), OrchestratorError> {
        let elapsed = self.started.elapsed().as_secs_f64();
        writeln!(self.writer, "[{elapsed:>9.3}s {level}] {msg}")?;
        Ok(())
    }
}
