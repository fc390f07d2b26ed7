//! # Region Close Task
//!
//! Closes every open region file on the worker. Because jobs run in submission
//! order, every save submitted before this task has reached disk once it runs.

use log::info;

use crate::{
    core::MtResource,
    map_state::{
        region::RegionCache,
        task_management::task::{Completion, Job, Task, TaskFault},
    },
};

/// A task that flushes and closes all open region files.
pub struct RegionCloseTask {
    regions: MtResource<RegionCache>,
}

impl RegionCloseTask {
    /// Creates a task closing the regions of `regions`.
    pub fn new(regions: MtResource<RegionCache>) -> Self {
        RegionCloseTask { regions }
    }
}

impl Task for RegionCloseTask {
    type Job = RegionCloseJob;
    type Completion = RegionCloseCompletion;

    fn kind(&self) -> &'static str {
        "region close"
    }

    fn split(self) -> (RegionCloseJob, RegionCloseCompletion) {
        (
            RegionCloseJob {
                regions: self.regions,
            },
            RegionCloseCompletion,
        )
    }
}

/// Worker half of a `RegionCloseTask`.
pub struct RegionCloseJob {
    regions: MtResource<RegionCache>,
}

impl Job for RegionCloseJob {
    /// Number of region files that were open.
    type Output = usize;

    fn run(self) -> usize {
        let mut regions = self.regions.get_mut();
        let open = regions.open_count();
        regions.close_all();
        open
    }
}

/// Controller half of a `RegionCloseTask`.
pub struct RegionCloseCompletion;

impl Completion for RegionCloseCompletion {
    type Output = usize;

    fn on_complete(self, outcome: Result<usize, TaskFault>) {
        if let Ok(closed) = outcome {
            info!("closed {} region files", closed);
        }
    }
}
