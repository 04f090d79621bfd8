// Copyright (c) 2025 Huawei Technologies Co.,Ltd. All rights reserved.
//
// Argonc is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

mod criu;

pub use criu::CriuEngine;

use std::{env, path::PathBuf, str::FromStr};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use nix::unistd::Pid;

use crate::{container::State, utils::resolve_scope_path};
use oci_spec::state::ContainerStatus;

/// Image directory used when no --image-path is given, relative to the
/// current working directory.
pub const DEFAULT_IMAGE_DIR: &str = "checkpoint";

/// How the snapshot engine treats the container's control groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CgroupMode {
    #[default]
    Soft,
    Ignore,
    Full,
    Strict,
}

impl FromStr for CgroupMode {
    type Err = anyhow::Error;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "soft" => Ok(CgroupMode::Soft),
            "ignore" => Ok(CgroupMode::Ignore),
            "full" => Ok(CgroupMode::Full),
            "strict" => Ok(CgroupMode::Strict),
            _ => bail!("Unknown cgroup mode specified: {:?}", mode),
        }
    }
}

/// Fully-resolved option set for one checkpoint or restore operation.
/// Built once per invocation and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CrOptions {
    pub image_path: PathBuf,
    pub work_path: Option<PathBuf>,
    pub parent_path: Option<PathBuf>,
    pub leave_running: bool,
    pub tcp_established: bool,
    pub ext_unix_sk: bool,
    pub shell_job: bool,
    pub file_locks: bool,
    pub pre_dump: bool,
    pub manage_cgroups_mode: CgroupMode,
}

/// Default the image path to <cwd>/checkpoint when none is given.
pub fn resolve_image_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let cwd = env::current_dir()
                .with_context(|| "Failed to determine the current working directory")?;
            Ok(cwd.join(DEFAULT_IMAGE_DIR))
        }
    }
}

/// Opaque contract with the external snapshot engine. Engine failures are
/// propagated verbatim, without retry.
pub trait SnapshotEngine {
    /// Dump the process tree rooted at `pid` into the image directory.
    fn dump(&self, pid: Pid, options: &CrOptions, freeze_scope: Option<&str>) -> Result<()>;

    /// Reconstruct a process tree from the image directory and return the
    /// pid of the restored init process.
    fn restore(&self, options: &CrOptions) -> Result<Pid>;
}

// The per-container scope unit may legitimately appear as a substring of
// sibling cgroup components, so it is matched as a whole trailing component.
fn freeze_scope(state: &State) -> Option<String> {
    let config = state.config.as_ref()?;
    let cgroups_path = config.linux.as_ref()?.cgroupsPath.as_ref()?;
    let scope_unit = format!("{}.scope", state.id);
    Some(resolve_scope_path(cgroups_path, &scope_unit))
}

/// Drive the snapshot engine to capture a running container. The transition
/// of the runtime state to Stopped belongs to the caller side, not the
/// engine, and happens only after the engine reports success.
pub fn checkpoint(
    state: &mut State,
    options: &CrOptions,
    engine: &dyn SnapshotEngine,
) -> Result<()> {
    let status = state
        .probe_status()
        .with_context(|| "Failed to probe container status")?;
    if status != ContainerStatus::Running {
        bail!("Cannot checkpoint a container with {:?} status", status);
    }

    let scope = freeze_scope(state);
    debug!(
        "Checkpointing container {} (pid {}) to {}",
        state.id,
        state.pid,
        options.image_path.display()
    );
    engine.dump(Pid::from_raw(state.pid), options, scope.as_deref())?;

    // A pre-dump always leaves the container running.
    if !options.leave_running && !options.pre_dump {
        state.status = ContainerStatus::Stopped;
        state
            .save()
            .with_context(|| "Failed to save container state")?;
    }
    info!("Checkpointed container {}", state.id);
    Ok(())
}

/// Drive the snapshot engine to reconstruct a container and record the new
/// init process in the runtime state.
pub fn restore(state: &mut State, options: &CrOptions, engine: &dyn SnapshotEngine) -> Result<Pid> {
    let status = state
        .probe_status()
        .with_context(|| "Failed to probe container status")?;
    if status == ContainerStatus::Running {
        bail!("Cannot restore a container which is still running");
    }

    let pid = engine.restore(options)?;

    state.pid = pid.as_raw();
    state.start_time = 0;
    if let Ok(proc) = procfs::process::Process::new(pid.as_raw()) {
        if let Ok(stat) = proc.stat() {
            state.start_time = stat.starttime;
        }
    }
    state.status = ContainerStatus::Running;
    state
        .save()
        .with_context(|| "Failed to save container state")?;
    info!("Restored container {} with pid {}", state.id, pid);
    Ok(pid)
}
