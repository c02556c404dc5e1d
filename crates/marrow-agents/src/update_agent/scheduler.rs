// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crossbeam_channel::{Receiver, Sender};
use marrow_core::renderer::{FrameIndex, GraphicsDevice, RenderError, ResourceError};
use marrow_lanes::scene_lane::{Variant, VariantUpdate};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// An error raised while fanning out variant updates.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A worker thread could not be started.
    #[error("Failed to spawn update worker {index}: {source}")]
    Spawn {
        /// Index of the worker in the pool.
        index: usize,
        /// The OS error.
        #[source]
        source: std::io::Error,
    },
    /// A worker no longer accepts jobs.
    #[error("Update worker {0} is gone")]
    WorkerLost(usize),
    /// Every worker hung up while updates were still in flight. The variants
    /// that never came back are gone and their slots are left empty.
    #[error("The update worker pool disconnected, {lost} variant(s) lost")]
    PoolDisconnected {
        /// Number of variants that were not returned.
        lost: usize,
    },
    /// The update of a variant failed on the GPU side.
    #[error("Update of variant '{variant}' failed: {source}")]
    Update {
        /// Label of the variant.
        variant: String,
        /// The backend error.
        #[source]
        source: ResourceError,
    },
    /// The update of a variant panicked. The variant is kept as it was left.
    #[error("Update of variant '{variant}' panicked")]
    TaskPanicked {
        /// Label of the variant.
        variant: String,
    },
}

impl From<SchedulerError> for RenderError {
    fn from(error: SchedulerError) -> Self {
        match error {
            SchedulerError::Update { source, .. } => RenderError::ResourceError(source),
            other => RenderError::Internal(other.to_string()),
        }
    }
}

/// Totals of one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Number of variants updated.
    pub updated: usize,
    /// Number of skin palettes uploaded into the frame slot.
    pub skin_uploads: usize,
    /// Sum of the nodes whose global transform changed.
    pub nodes_changed: usize,
    /// Number of non-looping clips that ended during this run.
    pub clips_finished: usize,
}

impl SchedulerReport {
    fn add(&mut self, update: &VariantUpdate) {
        self.updated += 1;
        self.skin_uploads += update.skin_uploaded as usize;
        self.nodes_changed += update.nodes_changed;
        self.clips_finished += update.blend.finished as usize;
    }
}

struct UpdateTask {
    index: usize,
    variant: Box<Variant>,
    dt: f32,
    frame: FrameIndex,
}

enum TaskFailure {
    Resource(ResourceError),
    Panicked,
}

struct TaskOutcome {
    index: usize,
    variant: Box<Variant>,
    result: Result<VariantUpdate, TaskFailure>,
}

struct Worker {
    jobs: Option<Sender<UpdateTask>>,
    handle: Option<JoinHandle<()>>,
}

/// A fixed pool of persistent worker threads updating variants in parallel.
///
/// Variants are moved into the workers and back, so no lock guards their data.
/// Two workers never see the same variant in one run.
pub struct UpdateScheduler {
    workers: Vec<Worker>,
    results: Receiver<TaskOutcome>,
}

impl UpdateScheduler {
    /// Starts `worker_count` workers (at least one). Uploads go through `device`.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        worker_count: usize,
    ) -> Result<Self, SchedulerError> {
        let worker_count = worker_count.max(1);
        let (result_tx, results) = crossbeam_channel::unbounded();
        let mut workers = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let (job_tx, job_rx) = crossbeam_channel::unbounded::<UpdateTask>();
            let device = Arc::clone(&device);
            let result_tx = result_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("marrow-update-{index}"))
                .spawn(move || worker_loop(device, job_rx, result_tx))
                .map_err(|source| SchedulerError::Spawn { index, source })?;
            workers.push(Worker {
                jobs: Some(job_tx),
                handle: Some(handle),
            });
        }

        log::info!("UpdateScheduler started with {} worker(s)", worker_count);
        Ok(Self { workers, results })
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Updates every variant present in `slots` and blocks until all of them are
    /// back in their slot.
    ///
    /// The i-th live variant goes to worker `i % worker_count`. Empty slots are
    /// skipped. On error the variants are still returned to their slots and the
    /// first failure is reported, except when the whole pool disconnects: the
    /// variants still out are lost and their slots stay empty.
    pub fn run<'a, I>(
        &self,
        slots: I,
        dt: f32,
        frame: FrameIndex,
    ) -> Result<SchedulerReport, SchedulerError>
    where
        I: IntoIterator<Item = &'a mut Option<Box<Variant>>>,
    {
        let mut slots: Vec<&'a mut Option<Box<Variant>>> =
            slots.into_iter().filter(|slot| slot.is_some()).collect();
        let worker_count = self.workers.len();
        let mut in_flight = 0;
        let mut lost_worker = None;

        for (index, slot) in slots.iter_mut().enumerate() {
            let Some(variant) = slot.take() else {
                continue;
            };
            let worker = index % worker_count;
            let task = UpdateTask {
                index,
                variant,
                dt,
                frame,
            };
            let Some(jobs) = self.workers[worker].jobs.as_ref() else {
                **slot = Some(task.variant);
                lost_worker = Some(worker);
                break;
            };
            match jobs.send(task) {
                Ok(()) => in_flight += 1,
                Err(crossbeam_channel::SendError(task)) => {
                    **slot = Some(task.variant);
                    lost_worker = Some(worker);
                    break;
                }
            }
        }

        let mut report = SchedulerReport::default();
        let first_error = gather(&self.results, &mut slots, in_flight, &mut report);

        match (first_error, lost_worker) {
            (Some(error @ SchedulerError::PoolDisconnected { .. }), _) => Err(error),
            (_, Some(worker)) => Err(SchedulerError::WorkerLost(worker)),
            (Some(error), None) => Err(error),
            (None, None) => Ok(report),
        }
    }
}

/// Puts `in_flight` returning variants back into their slots, accumulating
/// `report`. Returns the first failure.
fn gather(
    results: &Receiver<TaskOutcome>,
    slots: &mut [&mut Option<Box<Variant>>],
    in_flight: usize,
    report: &mut SchedulerReport,
) -> Option<SchedulerError> {
    let mut first_error = None;
    for received in 0..in_flight {
        let Ok(outcome) = results.recv() else {
            let lost = in_flight - received;
            log::error!(
                "Update workers hung up with {} variant(s) in flight; they are lost",
                lost
            );
            return Some(SchedulerError::PoolDisconnected { lost });
        };
        let failure = match outcome.result {
            Ok(update) => {
                report.add(&update);
                None
            }
            Err(TaskFailure::Resource(source)) => Some(SchedulerError::Update {
                variant: outcome.variant.label().to_owned(),
                source,
            }),
            Err(TaskFailure::Panicked) => Some(SchedulerError::TaskPanicked {
                variant: outcome.variant.label().to_owned(),
            }),
        };
        if let Some(error) = failure {
            log::error!("{}", error);
            first_error.get_or_insert(error);
        }
        *slots[outcome.index] = Some(outcome.variant);
    }
    first_error
}

fn worker_loop(
    device: Arc<dyn GraphicsDevice>,
    jobs: Receiver<UpdateTask>,
    results: Sender<TaskOutcome>,
) {
    for task in jobs {
        let UpdateTask {
            index,
            mut variant,
            dt,
            frame,
        } = task;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            variant.update(device.as_ref(), dt, frame)
        }));
        let result = match result {
            Ok(Ok(update)) => Ok(update),
            Ok(Err(e)) => Err(TaskFailure::Resource(e)),
            Err(_) => Err(TaskFailure::Panicked),
        };
        if results
            .send(TaskOutcome {
                index,
                variant,
                result,
            })
            .is_err()
        {
            break;
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            // Closing the job channel ends the worker loop.
            worker.jobs.take();
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    log::warn!("An update worker terminated abnormally");
                }
            }
        }
        log::info!("UpdateScheduler stopped");
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("workers", &self.workers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_infra::HeadlessDevice;

    #[test]
    fn pool_has_at_least_one_worker() {
        let scheduler = UpdateScheduler::new(Arc::new(HeadlessDevice::new()), 0).unwrap();
        assert_eq!(scheduler.worker_count(), 1);
    }

    #[test]
    fn empty_run_reports_nothing() {
        let scheduler = UpdateScheduler::new(Arc::new(HeadlessDevice::new()), 3).unwrap();
        let mut slots: Vec<Option<Box<Variant>>> = vec![None, None];

        let report = scheduler
            .run(slots.iter_mut(), 0.016, FrameIndex::default())
            .unwrap();

        assert_eq!(report, SchedulerReport::default());
    }

    #[test]
    fn hung_up_pool_reports_variants_still_out() {
        let (results_tx, results) = crossbeam_channel::unbounded::<TaskOutcome>();
        drop(results_tx);
        let mut taken: Vec<Option<Box<Variant>>> = vec![None, None];
        let mut slots: Vec<&mut Option<Box<Variant>>> = taken.iter_mut().collect();
        let mut report = SchedulerReport::default();

        let error = gather(&results, &mut slots, 2, &mut report);

        assert!(matches!(
            error,
            Some(SchedulerError::PoolDisconnected { lost: 2 })
        ));
        assert_eq!(report, SchedulerReport::default());
    }

    #[test]
    fn update_failures_become_resource_errors() {
        let error = SchedulerError::Update {
            variant: "v".into(),
            source: ResourceError::OutOfBounds,
        };
        assert_eq!(
            RenderError::from(error),
            RenderError::ResourceError(ResourceError::OutOfBounds)
        );
        assert!(matches!(
            RenderError::from(SchedulerError::PoolDisconnected { lost: 1 }),
            RenderError::Internal(_)
        ));
    }
}
