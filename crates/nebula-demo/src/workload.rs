//! Concurrent surface scan over a paged volume.
//!
//! Regions are handed to a pool of worker threads through a bounded channel.
//! Each worker snapshots its region with a [`BufferedSampler`] (one chunk-table
//! lock per region) and counts solid voxels that touch a non-solid face
//! neighbour.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded};
use glam::IVec3;
use nebula_math::Region;
use nebula_voxel::{BufferedSampler, PagedVolume, Sampler, Voxel, VoxelSampler};

/// A region to scan.
#[derive(Clone, Debug)]
pub struct ScanTask {
    pub id: u32,
    pub region: Region,
}

/// Counts for one scanned region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanResult {
    pub id: u32,
    pub solid: u64,
    pub surface: u64,
    pub elapsed_us: u64,
}

/// Solid and surface voxel counts of `region`, read from a buffered snapshot.
pub fn count_surface_buffered(volume: &PagedVolume<Voxel>, region: &Region) -> (u64, u64) {
    let mut sampler = BufferedSampler::new(volume, region);
    count_surface(&mut sampler, region)
}

/// Same as [`count_surface_buffered`] but walks the live volume with a [`Sampler`].
pub fn count_surface_cursor(volume: &PagedVolume<Voxel>, region: &Region) -> (u64, u64) {
    let mut sampler = Sampler::new(volume);
    count_surface(&mut sampler, region)
}

fn count_surface<S: VoxelSampler<Voxel>>(sampler: &mut S, region: &Region) -> (u64, u64) {
    let mut solid = 0;
    let mut surface = 0;
    for z in region.lower_z()..=region.upper_z() {
        for y in region.lower_y()..=region.upper_y() {
            sampler.set_position(IVec3::new(region.lower_x(), y, z));
            for _ in region.lower_x()..=region.upper_x() {
                if sampler.voxel().is_solid() {
                    solid += 1;
                    let exposed = !sampler.peek_voxel_1nx0py0pz().is_solid()
                        || !sampler.peek_voxel_1px0py0pz().is_solid()
                        || !sampler.peek_voxel_0px1ny0pz().is_solid()
                        || !sampler.peek_voxel_0px1py0pz().is_solid()
                        || !sampler.peek_voxel_0px0py1nz().is_solid()
                        || !sampler.peek_voxel_0px0py1pz().is_solid();
                    if exposed {
                        surface += 1;
                    }
                }
                sampler.move_positive_x();
            }
        }
    }
    (solid, surface)
}

/// Worker threads scanning regions of a shared volume.
pub struct ScanPool {
    task_sender: Option<Sender<ScanTask>>,
    result_receiver: Receiver<ScanResult>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl ScanPool {
    /// Spawns `thread_count` workers (at least one).
    pub fn new(volume: Arc<PagedVolume<Voxel>>, thread_count: usize, queue_capacity: usize) -> Self {
        let (task_sender, task_receiver) = bounded::<ScanTask>(queue_capacity);
        let (result_sender, result_receiver) = bounded::<ScanResult>(queue_capacity);

        let workers = (0..thread_count.max(1))
            .filter_map(|i| {
                let receiver = task_receiver.clone();
                let sender = result_sender.clone();
                let volume = Arc::clone(&volume);
                let spawned = std::thread::Builder::new()
                    .name(format!("scan-worker-{i}"))
                    .spawn(move || {
                        while let Ok(task) = receiver.recv() {
                            let start = Instant::now();
                            let (solid, surface) = count_surface_buffered(&volume, &task.region);
                            let result = ScanResult {
                                id: task.id,
                                solid,
                                surface,
                                elapsed_us: start.elapsed().as_micros() as u64,
                            };
                            if sender.send(result).is_err() {
                                break;
                            }
                        }
                    });
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        tracing::error!("failed to spawn scan worker {i}: {err}");
                        None
                    }
                }
            })
            .collect();

        Self {
            task_sender: Some(task_sender),
            result_receiver,
            workers,
        }
    }

    /// One worker per CPU.
    pub fn default_thread_count() -> usize {
        num_cpus::get().max(1)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Scans every task and returns the results ordered by task id.
    ///
    /// Submission and collection interleave so the bounded queues never deadlock.
    pub fn run(&self, tasks: Vec<ScanTask>) -> Vec<ScanResult> {
        let Some(sender) = &self.task_sender else {
            return Vec::new();
        };
        if self.workers.is_empty() {
            tracing::error!("scan pool has no workers");
            return Vec::new();
        }

        let expected = tasks.len();
        let mut results = Vec::with_capacity(expected);
        let mut pending = tasks.into_iter();
        let mut next = pending.next();
        while results.len() < expected {
            if let Some(task) = next.take() {
                match sender.try_send(task) {
                    Ok(()) => next = pending.next(),
                    Err(err) => {
                        next = Some(err.into_inner());
                        if let Ok(result) = self.result_receiver.recv() {
                            results.push(result);
                        }
                    }
                }
            } else {
                match self.result_receiver.recv() {
                    Ok(result) => results.push(result),
                    Err(_) => break,
                }
            }
        }
        results.sort_by_key(|r| r.id);
        results
    }
}

impl Drop for ScanPool {
    fn drop(&mut self) {
        // Closing the channel ends the worker loops.
        self.task_sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
