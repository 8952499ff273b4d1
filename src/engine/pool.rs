//! Fixed-size worker pool with explicit rounds.
//!
//! ```text
//! add_job ──► submit channel ──► feeder ──► work queue ──► N workers
//!                                  │                          │
//!                                  └── WaitGroup token ───────┘ (dropped when job returns)
//! ```
//!
//! A round is `start_round` → any number of `add_job` → `wait`. `wait` closes
//! the submit channel, joins the feeder (every submitted job has been handed
//! to the work queue), waits until every token is dropped, then closes the
//! work queue and joins the workers.
//!
//! Errors never stop other jobs: every job of the round runs to completion.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;

use super::error::{BuildError, panic_message};

/// Work function of a job: `Ok(true)` when it did non-trivial work.
pub type JobFn = Box<dyn FnOnce() -> anyhow::Result<bool> + Send + 'static>;

/// One named unit of work.
pub struct Job {
    name: String,
    work: JobFn,
}

impl Job {
    pub fn new<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<bool> + Send + 'static,
    {
        Self {
            name: name.into(),
            work: Box::new(work),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Terminal state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    Skipped,
    Errored,
}

/// What remains of a job once it ran.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub name: String,
    pub duration: Duration,
    pub outcome: Outcome,
}

/// Results of one drained round (or phase).
#[derive(Debug, Default)]
pub struct RoundReport {
    pub jobs: Vec<JobSummary>,
    pub errors: Vec<BuildError>,
}

impl RoundReport {
    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn executed(&self) -> usize {
        self.count(Outcome::Executed)
    }

    pub fn errored(&self) -> usize {
        self.count(Outcome::Errored)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.jobs.iter().filter(|j| j.outcome == outcome).count()
    }
}

type Dispatch = (Job, WaitGroup);

struct ActiveRound {
    round: u64,
    submit: Sender<Job>,
    feeder: JoinHandle<Sender<Dispatch>>,
    workers: Vec<JoinHandle<()>>,
    wait_group: WaitGroup,
    collected: Arc<Mutex<RoundReport>>,
}

/// Worker pool shared by the context for the whole process lifetime.
pub struct Pool {
    concurrency: usize,
    active: Mutex<Option<ActiveRound>>,
}

impl Pool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            active: Mutex::new(None),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Begin accepting jobs.
    ///
    /// # Panics
    ///
    /// If a round is already started. That is a driver bug, not a runtime
    /// condition.
    pub fn start_round(&self, round: u64) {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            panic!(
                "pool: start_round({round}) while round {} is still active",
                current.round
            );
        }

        let (submit, submitted) = channel::unbounded::<Job>();
        let (work_tx, work_rx) = channel::unbounded::<Dispatch>();
        let wait_group = WaitGroup::new();
        let collected = Arc::new(Mutex::new(RoundReport::default()));

        let feeder = {
            let wait_group = wait_group.clone();
            thread::Builder::new()
                .name("modulir-feeder".into())
                .spawn(move || feed(submitted, work_tx, wait_group))
                .expect("failed to spawn feeder thread")
        };

        let workers = (0..self.concurrency)
            .map(|i| {
                let work_rx = work_rx.clone();
                let collected = Arc::clone(&collected);
                thread::Builder::new()
                    .name(format!("modulir-worker-{i}"))
                    .spawn(move || work(work_rx, collected))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        *active = Some(ActiveRound {
            round,
            submit,
            feeder,
            workers,
            wait_group,
            collected,
        });
    }

    /// Enqueue a job into the active round.
    ///
    /// # Panics
    ///
    /// If no round is active (jobs may not enqueue jobs while `wait` drains).
    pub fn add_job(&self, job: Job) {
        let submit = match self.active.lock().as_ref() {
            Some(round) => round.submit.clone(),
            None => panic!("pool: add_job(`{}`) without an active round", job.name),
        };
        if submit.send(job).is_err() {
            unreachable!("feeder outlives the submit sender");
        }
    }

    /// Drain the active round and return its report.
    ///
    /// # Panics
    ///
    /// If no round is active.
    pub fn wait(&self) -> RoundReport {
        let Some(round) = self.active.lock().take() else {
            panic!("pool: wait() without an active round");
        };

        let ActiveRound {
            submit,
            feeder,
            workers,
            wait_group,
            collected,
            ..
        } = round;

        // 1. no more submissions
        drop(submit);
        // 2. every submitted job is now in the work queue
        let work_tx = feeder
            .join()
            .unwrap_or_else(|e| std::panic::resume_unwind(e));
        // 3. every dispatched job returned
        wait_group.wait();
        // 4. close the work queue so workers exit
        drop(work_tx);
        for worker in workers {
            let _ = worker.join();
        }

        std::mem::take(&mut *collected.lock())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if self.active.get_mut().is_some() {
            let _ = self.wait();
        }
    }
}

/// Forward submitted jobs to workers, attaching a wait-group token to each.
///
/// Returns the work sender so `wait` decides when the queue closes.
fn feed(submitted: Receiver<Job>, work_tx: Sender<Dispatch>, wait_group: WaitGroup) -> Sender<Dispatch> {
    for job in submitted {
        if work_tx.send((job, wait_group.clone())).is_err() {
            break;
        }
    }
    work_tx
}

fn work(work_rx: Receiver<Dispatch>, collected: Arc<Mutex<RoundReport>>) {
    for (job, token) in work_rx {
        let (summary, error) = run_job(job);
        {
            let mut report = collected.lock();
            report.jobs.push(summary);
            if let Some(error) = error {
                report.errors.push(error);
            }
        }
        drop(token);
    }
}

fn run_job(job: Job) -> (JobSummary, Option<BuildError>) {
    let Job { name, work } = job;
    let start = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(work));
    let duration = start.elapsed();

    let (outcome, error) = match result {
        Ok(Ok(true)) => {
            crate::debug!("job"; "{} ({:.1?})", name, duration);
            (Outcome::Executed, None)
        }
        Ok(Ok(false)) => (Outcome::Skipped, None),
        Ok(Err(error)) => (
            Outcome::Errored,
            Some(BuildError::Job {
                name: name.clone(),
                error,
            }),
        ),
        Err(payload) => (
            Outcome::Errored,
            Some(BuildError::Panic {
                name: name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        ),
    };

    (
        JobSummary {
            name,
            duration,
            outcome,
        },
        error,
    )
}
