//! Offloaded histogram construction.
//!
//! The device owns its own copy of the binned columns and its own copy of
//! the weighted gradients, and runs on a dedicated worker. Callers upload
//! gradients once per round, issue histogram jobs and receive a
//! [`HistogramTicket`] they must wait on before the split search reads the
//! result. Jobs run in issue order; there is no cancellation.

use crate::core::constants::HIST_STRIDE;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::{DataSize, Hist, Score};
use crate::dataset::BinnedDataset;
use crate::tree::histogram::builder::GradientView;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread::JoinHandle;

enum DeviceCommand {
    Upload {
        gradients: Vec<Score>,
        hessians: Vec<Score>,
    },
    Build {
        rows: Vec<DataSize>,
        group_mask: Vec<bool>,
        reply: Sender<Result<Vec<Hist>>>,
    },
}

/// Device-side memory: dense bins of every group plus the uploaded
/// gradients.
struct DeviceMemory {
    columns: Vec<Vec<u16>>,
    group_starts: Vec<usize>,
    histogram_len: usize,
    gradients: Vec<Score>,
    hessians: Vec<Score>,
}

impl DeviceMemory {
    fn build(&self, rows: &[DataSize], group_mask: &[bool]) -> Result<Vec<Hist>> {
        if self.gradients.is_empty() {
            return Err(LightGBMError::device("histogram requested before gradients were uploaded"));
        }
        let mut hist = vec![0.0; self.histogram_len];
        for (g, column) in self.columns.iter().enumerate() {
            if !group_mask.get(g).copied().unwrap_or(false) {
                continue;
            }
            let start = self.group_starts[g] * HIST_STRIDE;
            for &row in rows {
                let r = row as usize;
                let idx = start + column[r] as usize * HIST_STRIDE;
                hist[idx] += self.gradients[r] as f64;
                hist[idx + 1] += self.hessians[r] as f64;
                hist[idx + 2] += 1.0;
            }
        }
        Ok(hist)
    }
}

/// Handle to an issued histogram job.
#[must_use = "a histogram ticket must be waited on"]
pub struct HistogramTicket {
    receiver: Receiver<Result<Vec<Hist>>>,
}

impl HistogramTicket {
    /// Block until the device finishes the job.
    pub fn wait(self) -> Result<Vec<Hist>> {
        self.receiver
            .recv()
            .map_err(|_| LightGBMError::device("device worker stopped before finishing a job"))?
    }
}

/// Histogram builder running on a separate worker with its own memory.
pub struct DeviceHistogramBuilder {
    sender: Option<Sender<DeviceCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl DeviceHistogramBuilder {
    /// Copy the binned columns of `dataset` to the device and start it.
    pub fn new(dataset: &BinnedDataset) -> Result<Self> {
        let num_data = dataset.num_data() as usize;
        let columns: Vec<Vec<u16>> = dataset.groups().iter().map(|g| g.column().to_dense(num_data)).collect();
        let group_starts = (0..=dataset.num_groups()).map(|g| dataset.group_bin_start(g)).collect();
        let memory = DeviceMemory {
            columns,
            group_starts,
            histogram_len: dataset.num_total_bin() * HIST_STRIDE,
            gradients: Vec::new(),
            hessians: Vec::new(),
        };

        let (sender, receiver) = unbounded::<DeviceCommand>();
        let worker = std::thread::Builder::new()
            .name("lightgbm-device".to_string())
            .spawn(move || run_device(memory, receiver))
            .map_err(|e| LightGBMError::device(format!("failed to start device worker: {}", e)))?;
        log::debug!(
            "Device histogram builder started with {} groups over {} rows",
            dataset.num_groups(),
            num_data
        );

        Ok(DeviceHistogramBuilder {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    fn send(&self, command: DeviceCommand) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| LightGBMError::device("device is shut down"))?
            .send(command)
            .map_err(|_| LightGBMError::device("device worker is not running"))
    }

    /// Copy this round's weighted gradients to the device.
    pub fn upload_gradients(&self, gradients: &GradientView<'_>) -> Result<()> {
        let (gradients, hessians) = gradients.materialize();
        self.send(DeviceCommand::Upload { gradients, hessians })
    }

    /// Start building the histogram of `rows` for the masked groups.
    pub fn issue(&self, rows: &[DataSize], group_mask: &[bool]) -> Result<HistogramTicket> {
        let (reply, receiver) = bounded(1);
        self.send(DeviceCommand::Build {
            rows: rows.to_vec(),
            group_mask: group_mask.to_vec(),
            reply,
        })?;
        Ok(HistogramTicket { receiver })
    }
}

fn run_device(mut memory: DeviceMemory, receiver: Receiver<DeviceCommand>) {
    while let Ok(command) = receiver.recv() {
        match command {
            DeviceCommand::Upload { gradients, hessians } => {
                memory.gradients = gradients;
                memory.hessians = hessians;
            }
            DeviceCommand::Build {
                rows,
                group_mask,
                reply,
            } => {
                let result = memory.build(&rows, &group_mask);
                if reply.send(result).is_err() {
                    log::trace!("Histogram ticket dropped before completion");
                }
            }
        }
    }
}

impl Drop for DeviceHistogramBuilder {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Device histogram worker panicked");
            }
        }
    }
}
