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
    io::stdout,
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{builder::NonEmptyStringValueParser, Parser};
use nix::unistd::getpid;

use crate::{
    container::State,
    handler::HandlerRegistry,
    utils::{ArgoncErr, Endpoint},
};
use oci_spec::{runtime::RuntimeConfig, state::ContainerStatus};

/// Run a container through a pluggable execution backend
#[derive(Parser, Debug)]
pub struct Run {
    /// Path to the bundle directory, defaults to the current working directory.
    #[arg(short, long, default_value = ".")]
    pub bundle: PathBuf,
    /// Path of an AF_UNIX socket which will receive the container ID and a
    /// duplicate of stdout at a file descriptor.
    #[arg(long)]
    pub notify_socket: Option<PathBuf>,
    /// Container ID to run.
    #[arg(value_parser = NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
}

impl Run {
    fn load_config(&self, bundle: &Path) -> Result<(RuntimeConfig, PathBuf)> {
        let config_path = bundle.join("config.json").to_string_lossy().to_string();
        let mut config = RuntimeConfig::from_file(&config_path)?;

        let mut rootfs = PathBuf::from(&config.root.path);
        if !rootfs.is_absolute() {
            rootfs = bundle.join(rootfs);
        }
        config.root.path = rootfs.to_string_lossy().to_string();
        Ok((config, rootfs))
    }

    fn notify_listener(&self) -> Result<()> {
        if let Some(socket) = self.notify_socket.as_ref() {
            // The listener expects a null-terminated text payload.
            let mut payload = self.container_id.clone().into_bytes();
            payload.push(0);

            let endpoint = Endpoint::connect(socket)?;
            endpoint
                .send(stdout().as_raw_fd(), &payload)
                .with_context(|| "Failed to notify listener")?;
            endpoint.close()?;
        }
        Ok(())
    }

    pub fn run(&self, root: &Path) -> Result<()> {
        let bundle = self
            .bundle
            .canonicalize()
            .with_context(|| "Failed to canonicalize bundle path")?;
        let (mut config, rootfs) = self.load_config(&bundle)?;

        if root.join(&self.container_id).exists() {
            bail!("Container {} already exists", &self.container_id);
        }
        let mut state = State::new(root, &bundle, &self.container_id, &config);
        state.pid = getpid().as_raw();
        state.start_time = procfs::process::Process::new(state.pid)
            .with_context(|| ArgoncErr::ReadProcPid(state.pid))?
            .stat()
            .with_context(|| ArgoncErr::ReadProcStat(state.pid))?
            .starttime;
        state.status = ContainerStatus::Running;
        state.save().with_context(|| "Failed to save state")?;

        self.notify_listener()?;

        // The selected backend replaces the process image; an error return
        // is fatal to the whole container start.
        let mut registry = HandlerRegistry::new();
        match registry.dispatch(&mut config, &rootfs) {
            Ok(never) => match never {},
            Err(e) => {
                let _ = state.remove_dir();
                Err(e)
            }
        }
    }
}
