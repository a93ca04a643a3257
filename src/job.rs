//! Batch job controller: fetch → extract → synthesize → assemble under
//! a pausable/cancellable state machine.
//!
//! One job exists per controller, and one controller per process by
//! construction: all shared state lives behind the controller's own
//! mutex, control commands run on the caller's path and never block on
//! the worker, and the single background worker observes pause and
//! cancellation cooperatively at defined check points. Pausing parks the
//! worker on a notification channel that `resume` and `stop` wake.
//!
//! Per-chapter and per-batch failures are absorbed: a chapter that
//! cannot be fetched, extracted, or synthesized is recorded and skipped,
//! and a batch that cannot be assembled keeps its intermediates. Only
//! unanticipated faults abort the job.

use crate::assemble::{self, AudioBatch};
use crate::console::Console;
use crate::error::JobError;
use crate::scrape::{ChapterQuery, ChapterRef, ChapterSlot, ChapterSource, chapter_label};
use crate::tts::{Synthesizer, VoiceParams};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Processing,
    Paused,
    Completed,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Idle => "idle",
            JobStatus::Processing => "processing",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Parameters for one batch job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Chapter selection.
    pub query: ChapterQuery,

    /// Number of chapters merged into one audio batch.
    pub batch_size: usize,

    /// Voice and prosody for synthesis.
    pub voice: VoiceParams,
}

/// How a chapter attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterDisposition {
    /// Audio was produced and joined the in-flight batch.
    Synthesized,

    /// No candidate URL yielded usable content.
    NotFound,

    /// Content was extracted but the TTS backend failed; the chapter is
    /// excluded from its batch.
    SynthesisFailed,
}

/// Per-chapter result, kept for inspection after the job finishes.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterRecord {
    pub number: u32,
    pub title: String,
    pub url: String,
    pub disposition: ChapterDisposition,
}

/// Point-in-time view of the job, safe to read at any moment.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub current: u32,
    pub total: u32,
    pub current_chapter: Option<ChapterRef>,
    pub completed_batches: u32,
    pub total_batches: u32,
    pub error: Option<String>,
}

/// The single mutable job entity, always accessed under the
/// controller's mutex.
struct JobState {
    status: JobStatus,
    current: u32,
    total: u32,
    current_chapter: Option<ChapterRef>,
    completed_batches: u32,
    total_batches: u32,
    error: Option<String>,
    chapters: Vec<ChapterRecord>,
    batches: Vec<AudioBatch>,
    paused: bool,
    cancelled: bool,
    /// Incremented on every start; a worker only writes its final status
    /// if its epoch is still current.
    epoch: u64,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            status: JobStatus::Idle,
            current: 0,
            total: 0,
            current_chapter: None,
            completed_batches: 0,
            total_batches: 0,
            error: None,
            chapters: Vec::new(),
            batches: Vec::new(),
            paused: false,
            cancelled: false,
            epoch: 0,
        }
    }
}

/// How the worker loop ended.
enum WorkerExit {
    Finished,
    Cancelled,
}

/// Outcome of a cooperative check point.
#[derive(PartialEq)]
enum Checkpoint {
    Proceed,
    Cancelled,
}

/// A synthesized chapter waiting for its batch.
struct PendingPart {
    position: u32,
    path: PathBuf,
}

struct Inner {
    state: Mutex<JobState>,
    wake: Notify,
    worker: Mutex<Option<JoinHandle<()>>>,
    source: Arc<dyn ChapterSource>,
    synthesizer: Arc<dyn Synthesizer>,
    output_dir: PathBuf,
    ffmpeg: Option<PathBuf>,
    console: Console,
}

/// Single-instance batch job controller. Cloning yields another handle
/// to the same job.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl JobController {
    /// Creates a controller writing artifacts under `output_dir`.
    ///
    /// `ffmpeg` selects audio-aware batch assembly; `None` degrades to
    /// raw byte concatenation.
    pub fn new(
        source: Arc<dyn ChapterSource>,
        synthesizer: Arc<dyn Synthesizer>,
        output_dir: PathBuf,
        ffmpeg: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(JobState::default()),
                wake: Notify::new(),
                worker: Mutex::new(None),
                source,
                synthesizer,
                output_dir,
                ffmpeg,
                console: Console::new(),
            }),
        }
    }

    /// Starts a new job. Rejected while one is processing or paused.
    pub fn start(&self, request: JobRequest) -> Result<(), JobError> {
        let epoch = {
            let mut state = self.inner.state();
            if matches!(state.status, JobStatus::Processing | JobStatus::Paused) {
                return Err(JobError::InvalidTransition {
                    command: "start",
                    status: state.status,
                });
            }
            let epoch = state.epoch + 1;
            *state = JobState::default();
            state.epoch = epoch;
            state.status = JobStatus::Processing;
            epoch
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            inner.run(request, epoch).await;
        });
        *self
            .inner
            .worker
            .lock()
            .expect("worker handle lock poisoned") = Some(handle);

        Ok(())
    }

    /// Pauses the running job at the worker's next check point.
    pub fn pause(&self) -> Result<(), JobError> {
        let mut state = self.inner.state();
        if state.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                command: "pause",
                status: state.status,
            });
        }
        state.paused = true;
        state.status = JobStatus::Paused;
        Ok(())
    }

    /// Resumes a paused job.
    pub fn resume(&self) -> Result<(), JobError> {
        {
            let mut state = self.inner.state();
            if state.status != JobStatus::Paused {
                return Err(JobError::InvalidTransition {
                    command: "resume",
                    status: state.status,
                });
            }
            state.paused = false;
            state.status = JobStatus::Processing;
        }
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Requests cancellation and returns the job to idle. The worker
    /// exits at its next check point; there is no forced interruption
    /// mid-fetch.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state();
            state.cancelled = true;
            state.paused = false;
            state.status = JobStatus::Idle;
        }
        self.inner.wake.notify_one();
    }

    /// Current job snapshot.
    pub fn status(&self) -> JobSnapshot {
        let state = self.inner.state();
        JobSnapshot {
            status: state.status,
            current: state.current,
            total: state.total,
            current_chapter: state.current_chapter.clone(),
            completed_batches: state.completed_batches,
            total_batches: state.total_batches,
            error: state.error.clone(),
        }
    }

    /// Per-chapter results recorded so far.
    pub fn chapters(&self) -> Vec<ChapterRecord> {
        self.inner.state().chapters.clone()
    }

    /// Batches produced so far, including failed ones.
    pub fn batches(&self) -> Vec<AudioBatch> {
        self.inner.state().batches.clone()
    }

    /// Waits for the current worker to exit, if one is running.
    pub async fn wait(&self) {
        let handle = self
            .inner
            .worker
            .lock()
            .expect("worker handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().expect("job state lock poisoned")
    }

    async fn run(&self, request: JobRequest, epoch: u64) {
        let outcome = self.process(&request).await;

        let mut state = self.state();
        if state.epoch != epoch {
            // A newer job owns the state now.
            return;
        }
        match outcome {
            Ok(WorkerExit::Finished) => state.status = JobStatus::Completed,
            Ok(WorkerExit::Cancelled) => state.status = JobStatus::Idle,
            Err(err) => {
                state.status = JobStatus::Error;
                state.error = Some(format!("{err:#}"));
            }
        }
    }

    /// Blocks while paused, waking on `resume`/`stop` notifications.
    async fn checkpoint(&self) -> Checkpoint {
        loop {
            {
                let state = self.state();
                if state.cancelled {
                    return Checkpoint::Cancelled;
                }
                if !state.paused {
                    return Checkpoint::Proceed;
                }
            }
            self.wake.notified().await;
        }
    }

    /// The worker loop for one job.
    async fn process(&self, request: &JobRequest) -> anyhow::Result<WorkerExit> {
        let slots = self.source.resolve(&request.query).await?;
        let batch_size = request.batch_size.max(1);

        {
            let mut state = self.state();
            state.total = slots.len() as u32;
            state.total_batches = (slots.len() as u32).div_ceil(batch_size as u32);
        }

        std::fs::create_dir_all(&self.output_dir)?;

        let mut pending: Vec<PendingPart> = Vec::new();
        let mut batch_index: u32 = 0;
        let mut position: u32 = 0;
        let last_index = slots.len().saturating_sub(1);

        for (index, slot) in slots.iter().enumerate() {
            if self.checkpoint().await == Checkpoint::Cancelled {
                return Ok(WorkerExit::Cancelled);
            }

            let (record, attempted) = self
                .attempt_slot(slot, &request.voice, &mut position, &mut pending)
                .await?;

            {
                let mut state = self.state();
                state.current = (index + 1) as u32;
                state.current_chapter = Some(attempted);
                state.chapters.push(record);
            }

            if pending.len() >= batch_size || (index == last_index && !pending.is_empty()) {
                batch_index += 1;
                let batch = self.assemble_pending(batch_index, &mut pending);
                let mut state = self.state();
                if batch.assembled {
                    state.completed_batches += 1;
                }
                state.batches.push(batch);
            }
        }

        Ok(WorkerExit::Finished)
    }

    /// Tries a slot's candidate URLs in order until one yields content,
    /// then synthesizes it. Every failure mode is absorbed into the
    /// returned record.
    async fn attempt_slot(
        &self,
        slot: &ChapterSlot,
        voice: &VoiceParams,
        position: &mut u32,
        pending: &mut Vec<PendingPart>,
    ) -> anyhow::Result<(ChapterRecord, ChapterRef)> {
        let mut attempted = slot.candidates.first().cloned().unwrap_or_else(|| ChapterRef {
            url: String::new(),
            number: slot.number,
            title: None,
        });

        for candidate in &slot.candidates {
            attempted = candidate.clone();

            let content = match self.source.fetch_chapter(candidate).await {
                Ok(content) => content,
                Err(_) => continue,
            };
            if content.is_empty() {
                continue;
            }

            return match self.synthesizer.synthesize(&content.body, voice).await {
                Ok(audio) => {
                    *position += 1;
                    let path = self.output_dir.join(format!("chapter_{:04}.mp3", *position));
                    std::fs::write(&path, &audio)?;
                    pending.push(PendingPart {
                        position: *position,
                        path,
                    });
                    Ok((
                        ChapterRecord {
                            number: content.number,
                            title: content.title,
                            url: content.url,
                            disposition: ChapterDisposition::Synthesized,
                        },
                        attempted,
                    ))
                }
                Err(err) => {
                    self.console.warning(&format!(
                        "Synthesis failed for {}: {}",
                        chapter_label(slot.number),
                        err
                    ));
                    Ok((
                        ChapterRecord {
                            number: content.number,
                            title: content.title,
                            url: content.url,
                            disposition: ChapterDisposition::SynthesisFailed,
                        },
                        attempted,
                    ))
                }
            };
        }

        Ok((
            ChapterRecord {
                number: slot.number,
                title: format!("{} (Not Found)", chapter_label(slot.number)),
                url: attempted.url.clone(),
                disposition: ChapterDisposition::NotFound,
            },
            attempted,
        ))
    }

    /// Merges the pending parts into a batch artifact. An assembly
    /// failure keeps the intermediates and marks the batch failed.
    fn assemble_pending(&self, index: u32, pending: &mut Vec<PendingPart>) -> AudioBatch {
        let first = pending.first().map(|p| p.position).unwrap_or(0);
        let last = pending.last().map(|p| p.position).unwrap_or(0);
        let path = self
            .output_dir
            .join(format!("batch_{}_chapters_{}_to_{}.mp3", index, first, last));
        let parts: Vec<PathBuf> = pending.iter().map(|p| p.path.clone()).collect();

        let assembled = match assemble::assemble_batch(&parts, &path, self.ffmpeg.as_deref()) {
            Ok(()) => true,
            Err(err) => {
                self.console
                    .warning(&format!("Batch {} assembly failed: {}", index, err));
                false
            }
        };

        let chapters = pending.len() as u32;
        pending.clear();

        AudioBatch {
            index,
            first_chapter: first,
            last_chapter: last,
            path,
            chapters,
            assembled,
        }
    }
}
