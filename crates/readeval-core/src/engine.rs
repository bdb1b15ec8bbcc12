//! Evaluation engine: admission control and phase orchestration.
//!
//! Every evaluation runs under a permit from the [`AdmissionLimiter`], held
//! for the whole remote session and released on every exit path. A phase
//! launches all of its jobs together and collects one outcome per job; the
//! phase status is folded from those outcomes afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::batch::{BatchCoordinator, CharacterVerdict};
use crate::error::EvalError;
use crate::model::{Category, EvaluationRequest, EvaluationResult, LanguageProfile};
use crate::reference::ReferenceSet;
use crate::traits::SpeechEvaluator;

/// Default number of concurrently active remote sessions.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

// ---------------------------------------------------------------------------
// Admission limiter
// ---------------------------------------------------------------------------

/// The limiter was closed; no further sessions can start.
#[derive(Debug, Error)]
#[error("admission limiter closed")]
pub struct LimiterClosed;

/// Fixed-size permit pool bounding concurrent remote sessions.
#[derive(Debug, Clone)]
pub struct AdmissionLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Default for AdmissionLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl AdmissionLimiter {
    /// A limiter with `capacity` permits (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit. Dropping the permit returns it to the pool.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, LimiterClosed> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimiterClosed)
    }

    /// Refuse all pending and future acquisitions.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_job_start(&self, job_id: &str);
    fn on_job_complete(&self, outcome: &JobOutcome);
    fn on_phase_complete(&self, total: usize, succeeded: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_job_start(&self, _: &str) {}
    fn on_job_complete(&self, _: &JobOutcome) {}
    fn on_phase_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

// ---------------------------------------------------------------------------
// Jobs and phases
// ---------------------------------------------------------------------------

/// One recording scheduled for evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub id: String,
    pub audio: Arc<[u8]>,
    pub request: EvaluationRequest,
}

impl EvaluationJob {
    pub fn new(id: impl Into<String>, audio: impl Into<Arc<[u8]>>, request: EvaluationRequest) -> Self {
        Self {
            id: id.into(),
            audio: audio.into(),
            request,
        }
    }
}

/// Result of one job. Failures are carried inside `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub result: EvaluationResult,
    pub duration_ms: u64,
}

/// Status of a whole evaluation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Every job succeeded (or there were none).
    Completed,
    /// At least one job failed.
    PartiallyCompleted,
    /// The phase could not run at all.
    Failed,
}

impl PhaseStatus {
    pub fn fold(outcomes: &[JobOutcome]) -> Self {
        if outcomes.iter().all(|o| o.result.success) {
            PhaseStatus::Completed
        } else {
            PhaseStatus::PartiallyCompleted
        }
    }
}

/// Everything a phase produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub id: Uuid,
    pub status: PhaseStatus,
    /// In job order.
    pub outcomes: Vec<JobOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// One fluency-sheet recording: a row read during round 1 or 2.
#[derive(Debug, Clone)]
pub struct RowRecording {
    pub round: u8,
    pub row_index: usize,
    pub audio: Arc<[u8]>,
    /// Rate declared by the recording itself; the engine's rate otherwise.
    pub sample_rate: Option<u32>,
}

impl RowRecording {
    /// `round<R>-row<N>`, with N counted from 1.
    pub fn job_id(&self) -> String {
        format!("round{}-row{}", self.round, self.row_index + 1)
    }
}

/// Fluency test outcome across both rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluencySummary {
    pub round1_correct: usize,
    pub round2_correct: usize,
    /// Mean of the two round totals.
    pub average_score: f64,
    pub phase: PhaseReport,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs evaluations against one backend under one admission limiter.
pub struct EvaluationEngine {
    evaluator: Arc<dyn SpeechEvaluator>,
    limiter: AdmissionLimiter,
    coordinator: BatchCoordinator,
    profile: LanguageProfile,
    audio_format: String,
    sample_rate: u32,
}

impl EvaluationEngine {
    pub fn new(evaluator: Arc<dyn SpeechEvaluator>, limiter: AdmissionLimiter) -> Self {
        Self {
            evaluator,
            limiter,
            coordinator: BatchCoordinator::new(),
            profile: LanguageProfile::default(),
            audio_format: "raw".to_string(),
            sample_rate: 16_000,
        }
    }

    pub fn with_coordinator(mut self, coordinator: BatchCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Profile used for batch and fluency requests.
    pub fn with_profile(mut self, profile: LanguageProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Audio encoding of every recording this engine receives.
    pub fn with_audio(mut self, audio_format: impl Into<String>, sample_rate: u32) -> Self {
        self.audio_format = audio_format.into();
        self.sample_rate = sample_rate;
        self
    }

    fn request(&self, category: Category, text: impl Into<String>, profile: LanguageProfile) -> EvaluationRequest {
        let mut request = EvaluationRequest::new(category, text)
            .with_profile(profile)
            .with_sample_rate(self.sample_rate);
        request.audio_format = self.audio_format.clone();
        request
    }

    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }

    /// Evaluate one recording. Never fails; errors become tagged results.
    pub async fn evaluate(
        &self,
        audio: &[u8],
        text: &str,
        category: Category,
        profile: LanguageProfile,
    ) -> EvaluationResult {
        let request = self.request(category, text, profile);
        self.evaluate_request(audio, &request).await
    }

    /// Evaluate one recording that answers for several characters and map
    /// the result back onto each of them, in request order.
    pub async fn evaluate_batch(&self, audio: &[u8], characters: &[String]) -> Vec<CharacterVerdict> {
        self.evaluate_batch_at(audio, self.sample_rate, characters).await
    }

    /// [`evaluate_batch`](Self::evaluate_batch) for audio recorded at
    /// `sample_rate` instead of the engine's configured rate.
    pub async fn evaluate_batch_at(
        &self,
        audio: &[u8],
        sample_rate: u32,
        characters: &[String],
    ) -> Vec<CharacterVerdict> {
        if characters.is_empty() {
            return Vec::new();
        }
        let request = self
            .request(
                Category::ReadSyllable,
                characters.join(" "),
                self.profile.clone(),
            )
            .with_sample_rate(sample_rate);
        let result = self.evaluate_request(audio, &request).await;
        self.coordinator.map(&result, characters)
    }

    async fn evaluate_request(&self, audio: &[u8], request: &EvaluationRequest) -> EvaluationResult {
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return EvaluationResult::failed(&EvalError::TransportFailure(e.to_string()));
            }
        };
        let outcome = self.evaluator.evaluate(audio, request).await;
        if let Err(e) = &outcome {
            tracing::error!(evaluator = self.evaluator.name(), "evaluation failed: {e}");
        }
        EvaluationResult::from_outcome(outcome)
    }

    /// Launch every job together and collect one outcome per job, in job
    /// order. Concurrency is bounded by the limiter.
    pub async fn run_all(
        &self,
        jobs: Vec<EvaluationJob>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<JobOutcome>, LimiterClosed> {
        let mut futures = FuturesUnordered::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let evaluator = Arc::clone(&self.evaluator);
            let limiter = self.limiter.clone();

            futures.push(async move {
                let permit = match limiter.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, Err(e)),
                };
                progress.on_job_start(&job.id);

                let start = Instant::now();
                let outcome = evaluator.evaluate(&job.audio, &job.request).await;
                drop(permit);

                if let Err(e) = &outcome {
                    tracing::error!("evaluation failed for {}: {e}", job.id);
                }
                let outcome = JobOutcome {
                    job_id: job.id,
                    result: EvaluationResult::from_outcome(outcome),
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                (index, Ok(outcome))
            });
        }

        let mut outcomes = Vec::with_capacity(futures.len());
        let mut closed = false;

        while let Some((index, outcome)) = futures.next().await {
            match outcome {
                Ok(outcome) => {
                    progress.on_job_complete(&outcome);
                    outcomes.push((index, outcome));
                }
                Err(_) => closed = true,
            }
        }

        if closed {
            return Err(LimiterClosed);
        }

        outcomes.sort_by_key(|(index, _)| *index);
        Ok(outcomes.into_iter().map(|(_, o)| o).collect())
    }

    /// Run a phase and fold its status.
    pub async fn run_phase(
        &self,
        jobs: Vec<EvaluationJob>,
        progress: &dyn ProgressReporter,
    ) -> PhaseReport {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let total = jobs.len();

        let (status, outcomes) = match self.run_all(jobs, progress).await {
            Ok(outcomes) => (PhaseStatus::fold(&outcomes), outcomes),
            Err(e) => {
                tracing::error!("phase {id} could not run: {e}");
                (PhaseStatus::Failed, Vec::new())
            }
        };

        let succeeded = outcomes.iter().filter(|o| o.result.success).count();
        let failed = total - succeeded;
        let elapsed = start.elapsed();
        progress.on_phase_complete(total, succeeded, failed, elapsed);
        tracing::info!(
            %id,
            total,
            succeeded,
            failed,
            status = ?status,
            "phase finished in {:.1}s",
            elapsed.as_secs_f64()
        );

        PhaseReport {
            id,
            status,
            outcomes,
            succeeded,
            failed,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Evaluate every row recording of a fluency test and total the
    /// correctly read characters per round.
    pub async fn run_fluency(
        &self,
        reference: &ReferenceSet,
        recordings: Vec<RowRecording>,
        progress: &dyn ProgressReporter,
    ) -> FluencySummary {
        let mut jobs = Vec::with_capacity(recordings.len());
        let mut invalid = Vec::new();
        let mut row_lengths = Vec::with_capacity(recordings.len());

        for rec in &recordings {
            let id = rec.job_id();
            match reference.row(rec.row_index) {
                Some(row) => {
                    let mut request =
                        self.request(Category::ReadSyllable, row.text(), self.profile.clone());
                    if let Some(rate) = rec.sample_rate {
                        request.sample_rate = rate;
                    }
                    jobs.push(EvaluationJob::new(id, Arc::clone(&rec.audio), request));
                    row_lengths.push((rec.round, row.len()));
                }
                None => {
                    tracing::error!("row index {} out of range", rec.row_index);
                    let error = EvalError::InvalidRequest(format!(
                        "row index {} out of range (sheet has {} rows)",
                        rec.row_index,
                        reference.rows.len()
                    ));
                    invalid.push(JobOutcome {
                        job_id: id,
                        result: EvaluationResult::failed(&error),
                        duration_ms: 0,
                    });
                }
            }
        }

        let mut phase = self.run_phase(jobs, progress).await;

        let mut round1_correct = 0;
        let mut round2_correct = 0;
        for (outcome, (round, row_len)) in phase.outcomes.iter().zip(&row_lengths) {
            let correct = correct_in_row(&outcome.result, *row_len);
            match round {
                1 => round1_correct += correct,
                2 => round2_correct += correct,
                other => tracing::warn!("ignoring recording from unknown round {other}"),
            }
        }

        if !invalid.is_empty() {
            phase.failed += invalid.len();
            phase.outcomes.extend(invalid);
            if phase.status == PhaseStatus::Completed {
                phase.status = PhaseStatus::PartiallyCompleted;
            }
        }

        FluencySummary {
            round1_correct,
            round2_correct,
            average_score: (round1_correct + round2_correct) as f64 / 2.0,
            phase,
        }
    }
}

/// Correctly read characters in one row recording, capped at the row length.
///
/// Without per-character detail the total score is used as a proportion of
/// the row.
pub fn correct_in_row(result: &EvaluationResult, row_len: usize) -> usize {
    if !result.success {
        return 0;
    }
    let correct = match result.utterance.as_ref().filter(|u| !u.characters.is_empty()) {
        Some(utterance) => utterance
            .characters
            .iter()
            .filter(|c| c.is_correct())
            .count(),
        None => (row_len as f64 * result.scores.total / 100.0).max(0.0) as usize,
    };
    correct.min(row_len)
}
