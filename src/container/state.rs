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

use std::{
    fs::{remove_dir_all, DirBuilder, File, OpenOptions},
    io::BufReader,
    os::unix::fs::DirBuilderExt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use libc::pid_t;
use nix::sys::stat::Mode;
use procfs::process::ProcState;
use serde::{Deserialize, Serialize};

use crate::utils::ArgoncErr;
use oci_spec::{runtime::RuntimeConfig, state::ContainerStatus};

/// Runtime state of one container, persisted under the state root.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub oci_version: String,
    pub id: String,
    pub pid: pid_t,
    pub root: PathBuf,
    pub bundle: PathBuf,
    pub rootfs: String,
    pub status: ContainerStatus,
    pub start_time: u64,
    pub created_time: DateTime<Utc>,
    pub config: Option<RuntimeConfig>,
}

impl State {
    pub fn new(root: &Path, bundle: &Path, id: &str, config: &RuntimeConfig) -> Self {
        Self {
            oci_version: config.ociVersion.clone(),
            id: id.to_string(),
            pid: -1,
            root: root.to_path_buf(),
            bundle: bundle.to_path_buf(),
            rootfs: config.root.path.clone(),
            status: ContainerStatus::Creating,
            start_time: 0,
            created_time: Utc::now(),
            config: Some(config.clone()),
        }
    }

    fn file_path(root: &Path, id: &str) -> PathBuf {
        root.join(id).join("state.json")
    }

    pub fn container_dir(&self) -> PathBuf {
        self.root.join(&self.id)
    }

    pub fn save(&self) -> Result<()> {
        let container_dir = self.container_dir();
        if !container_dir.exists() {
            DirBuilder::new()
                .recursive(true)
                .mode(Mode::S_IRWXU.bits())
                .create(&container_dir)
                .with_context(|| {
                    ArgoncErr::CreateDir(container_dir.to_string_lossy().to_string())
                })?;
        }

        let path = Self::file_path(&self.root, &self.id);
        let state_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| "Failed to open state file")?;
        serde_json::to_writer(&state_file, self)?;
        Ok(())
    }

    pub fn load(root: &Path, id: &str) -> Result<State> {
        let path = Self::file_path(root, id);
        let state_file = File::open(&path)
            .with_context(|| ArgoncErr::OpenFile(path.to_string_lossy().to_string()))?;
        let state = serde_json::from_reader(BufReader::new(state_file))
            .with_context(|| "Failed to parse state file")?;
        Ok(state)
    }

    pub fn remove_dir(&self) -> Result<()> {
        remove_dir_all(self.container_dir())
            .with_context(|| "Failed to remove container directory")?;
        Ok(())
    }

    /// Current container status, cross-checked against the process the state
    /// refers to. A recycled pid is detected by the process start time.
    pub fn probe_status(&self) -> Result<ContainerStatus> {
        if self.status == ContainerStatus::Stopped {
            return Ok(ContainerStatus::Stopped);
        }
        if self.pid < 0 {
            return Ok(ContainerStatus::Creating);
        }

        // If /proc/<pid> is not accessible, the process most likely has
        // stopped.
        let proc = procfs::process::Process::new(self.pid);
        if proc.is_err() {
            return Ok(ContainerStatus::Stopped);
        }
        let proc_stat = proc
            .unwrap()
            .stat()
            .with_context(|| ArgoncErr::ReadProcStat(self.pid))?;
        if proc_stat.starttime != self.start_time {
            return Ok(ContainerStatus::Stopped);
        }

        match proc_stat.state()? {
            ProcState::Zombie | ProcState::Dead => Ok(ContainerStatus::Stopped),
            _ => Ok(self.status),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use std::fs::remove_dir_all;

    use nix::unistd::getpid;

    use oci_spec::{posix::Root, posix::User, process::Process as OciProcess};

    use super::*;

    pub fn init_config() -> RuntimeConfig {
        let root = Root {
            path: String::from("/tmp/argonc/bundle/rootfs"),
            readonly: true,
        };
        let user = User {
            uid: 0,
            gid: 0,
            umask: None,
            additionalGids: None,
        };
        let process = OciProcess {
            cwd: String::from("/"),
            args: Some(vec![String::from("bash")]),
            env: None,
            terminal: false,
            execCPUAffinity: None,
            user,
        };
        RuntimeConfig {
            ociVersion: String::from("1.2"),
            root,
            mounts: Vec::new(),
            process,
            hostname: None,
            linux: None,
            annotations: None,
        }
    }

    #[test]
    fn test_save_and_load() {
        let root = Path::new("/tmp/argonc/test_save_and_load");
        remove_dir_all(root).unwrap_or_default();

        let config = init_config();
        let mut state = State::new(root, Path::new("/tmp/argonc/bundle"), "save_load", &config);
        state.pid = 4422;
        state.status = ContainerStatus::Created;
        state.save().unwrap();

        let loaded = State::load(root, "save_load").unwrap();
        assert_eq!(loaded.id, "save_load");
        assert_eq!(loaded.pid, 4422);
        assert_eq!(loaded.status, ContainerStatus::Created);
        assert_eq!(loaded.rootfs, "/tmp/argonc/bundle/rootfs");
        assert!(loaded.config.is_some());

        state.remove_dir().unwrap();
        assert!(State::load(root, "save_load").is_err());
    }

    #[test]
    fn test_probe_status() {
        let root = Path::new("/tmp/argonc/test_probe_status");
        remove_dir_all(root).unwrap_or_default();

        let config = init_config();
        let mut state = State::new(root, Path::new("/tmp/argonc/bundle"), "probe", &config);

        assert_eq!(state.probe_status().unwrap(), ContainerStatus::Creating);

        state.status = ContainerStatus::Running;
        state.pid = 0;
        assert_eq!(state.probe_status().unwrap(), ContainerStatus::Stopped);

        // Start time mismatch means the pid has been recycled.
        state.pid = getpid().as_raw();
        state.start_time = 0;
        assert_eq!(state.probe_status().unwrap(), ContainerStatus::Stopped);

        let proc_stat = procfs::process::Process::new(state.pid)
            .unwrap()
            .stat()
            .unwrap();
        state.start_time = proc_stat.starttime;
        assert_eq!(state.probe_status().unwrap(), ContainerStatus::Running);

        state.status = ContainerStatus::Stopped;
        assert_eq!(state.probe_status().unwrap(), ContainerStatus::Stopped);
    }
}
