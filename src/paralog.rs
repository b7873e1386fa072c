//! Claiming directories for jobs that run side by side on a shared file system
//!
//! Several copies of a job (aggregation, result checking, cleanup) may run on
//! the same server, each working on distinct directories. A job claims a
//! directory by writing `status-{jobname}.txt` into it and releases it by
//! deleting that file and appending a line to `status-global.txt`.
//!
//! Claims are advisory: there is no atomic create or locking, and a claim
//! older than the manager's timeout is treated as abandoned by a crashed job.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Job name used for the cross-job status file
const GLOBAL_STATUS_NAME: &str = "global";

/// Per-process manager of directory claims and the job log file
#[derive(Debug)]
pub struct StatusManager {
    jobname: String,
    jobtitle: String,
    logpath: PathBuf,
    timeout: Duration,
    exclusive_jobnames: Vec<String>,
}

impl StatusManager {
    /// Create the log directory if needed and start a new `{jobname}-{n}.log`
    ///
    /// `timeout` is how long after a claim is written it is still honored.
    /// `exclusive_jobnames` lists other jobs that may not work in the same
    /// directory at the same time.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the log directory or file cannot be created.
    pub fn new(
        jobname: &str,
        jobtitle: &str,
        logdir: &Path,
        timeout: Duration,
        exclusive_jobnames: &[&str],
    ) -> io::Result<Self> {
        fs::create_dir_all(logdir)?;

        let logpath = (0..)
            .map(|ii| logdir.join(format!("{jobname}-{ii}.log")))
            .find(|path| !path.exists())
            .unwrap_or_else(|| logdir.join(format!("{jobname}.log")));

        OpenOptions::new().create(true).append(true).open(&logpath)?;
        info!("Job '{jobname}' logging to {}", logpath.display());

        Ok(Self {
            jobname: jobname.to_string(),
            jobtitle: jobtitle.to_string(),
            logpath,
            timeout,
            exclusive_jobnames: exclusive_jobnames.iter().map(ToString::to_string).collect(),
        })
    }

    #[must_use]
    pub fn logpath(&self) -> &Path {
        &self.logpath
    }

    #[must_use]
    pub fn jobname(&self) -> &str {
        &self.jobname
    }

    /// Claim `dirpath`; returns `false` if it is already claimed
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the claim file cannot be written.
    pub fn claim(&self, dirpath: &Path) -> io::Result<bool> {
        if self.is_claimed(dirpath)? {
            return Ok(false);
        }

        let status_path = Self::claiming_filepath(dirpath, &self.jobname);
        fs::write(
            &status_path,
            format!(
                "{} {}: {}\n",
                std::process::id(),
                self.jobtitle,
                self.logpath.display()
            ),
        )?;
        self.log_message(&format!("Claimed {}", dirpath.display()))?;

        Ok(true)
    }

    /// Append a status line to this job's claim file in `dirpath`
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the claim file cannot be appended to.
    pub fn update(&self, dirpath: &Path, status: &str) -> io::Result<()> {
        append_line(&Self::claiming_filepath(dirpath, &self.jobname), status)
    }

    /// Remove this job's claim on `dirpath` and record `status` in the global status file
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the claim file does not exist or the global
    /// status file cannot be written.
    pub fn release(&self, dirpath: &Path, status: &str) -> io::Result<()> {
        fs::remove_file(Self::claiming_filepath(dirpath, &self.jobname))?;

        let timestamp = Local::now().format("%a %b %e %H:%M:%S %Y");
        append_line(
            &Self::globalstatus_filepath(dirpath),
            &format!("{timestamp} {}: {status}", self.jobtitle),
        )?;
        self.log_message(&format!("Released {}: {status}", dirpath.display()))
    }

    /// Whether this job or any exclusive job holds a live claim on `dirpath`
    ///
    /// Claims older than the timeout are ignored but left in place.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a claim file's modification time cannot be read.
    pub fn is_claimed(&self, dirpath: &Path) -> io::Result<bool> {
        let jobnames = std::iter::once(self.jobname.as_str())
            .chain(self.exclusive_jobnames.iter().map(String::as_str));

        for jobname in jobnames {
            let filepath = Self::claiming_filepath(dirpath, jobname);
            if !filepath.exists() {
                continue;
            }

            let modified = fs::metadata(&filepath)?.modified()?;
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO);
            if age < self.timeout {
                return Ok(true);
            }
            warn!(
                "Ignoring stale claim {} ({}s old)",
                filepath.display(),
                age.as_secs()
            );
        }

        Ok(false)
    }

    /// Write a line to the job log only, echoing it through `tracing`
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the log file cannot be appended to.
    pub fn log_message(&self, msg: &str) -> io::Result<()> {
        info!(job = %self.jobname, "{msg}");
        append_line(&self.logpath, msg)
    }

    /// Path of the cross-job status file of `dirpath`
    #[must_use]
    pub fn globalstatus_filepath(dirpath: &Path) -> PathBuf {
        Self::claiming_filepath(dirpath, GLOBAL_STATUS_NAME)
    }

    /// Path of the claim file `jobname` writes into `dirpath`
    #[must_use]
    pub fn claiming_filepath(dirpath: &Path, jobname: &str) -> PathBuf {
        dirpath.join(format!("status-{jobname}.txt"))
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
