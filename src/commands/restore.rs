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

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{builder::NonEmptyStringValueParser, Parser};

use crate::{
    checkpoint::{self as cr, resolve_image_path, CgroupMode, CrOptions, CriuEngine},
    container::State,
    utils::ArgoncErr,
};

/// Restore a container from a checkpoint image
#[derive(Parser, Debug)]
pub struct Restore {
    /// Path of the saved snapshot image files.
    #[arg(long, value_name = "DIR")]
    pub image_path: Option<PathBuf>,
    /// Path for saving work files and logs.
    #[arg(long, value_name = "DIR")]
    pub work_path: Option<PathBuf>,
    /// Allow open tcp connections.
    #[arg(long)]
    pub tcp_established: bool,
    /// Allow external unix sockets.
    #[arg(long)]
    pub ext_unix_sk: bool,
    /// Allow shell jobs.
    #[arg(long)]
    pub shell_job: bool,
    /// Allow file locks.
    #[arg(long)]
    pub file_locks: bool,
    /// Cgroups mode: 'soft' (default), 'ignore', 'full' or 'strict'.
    #[arg(long, value_name = "MODE")]
    pub manage_cgroups_mode: Option<String>,
    /// Container ID to restore.
    #[arg(value_parser = NonEmptyStringValueParser::new(), required = true)]
    pub container_id: Vec<String>,
}

impl Restore {
    fn options(&self) -> Result<CrOptions> {
        let manage_cgroups_mode = match self.manage_cgroups_mode.as_deref() {
            Some(mode) => mode.parse()?,
            None => CgroupMode::default(),
        };

        Ok(CrOptions {
            image_path: resolve_image_path(self.image_path.clone())?,
            work_path: self.work_path.clone(),
            parent_path: None,
            leave_running: false,
            tcp_established: self.tcp_established,
            ext_unix_sk: self.ext_unix_sk,
            shell_job: self.shell_job,
            file_locks: self.file_locks,
            pre_dump: false,
            manage_cgroups_mode,
        })
    }

    pub fn run(&self, root: &Path) -> Result<()> {
        let id = super::single_container_id(&self.container_id)?;
        let options = self.options()?;

        let mut state = State::load(root, id).with_context(|| ArgoncErr::LoadConState)?;
        let engine = CriuEngine::new()?;
        cr::restore(&mut state, &options, &engine)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_command() -> Restore {
        Restore {
            image_path: Some(PathBuf::from("/tmp/argonc/images")),
            work_path: None,
            tcp_established: false,
            ext_unix_sk: false,
            shell_job: false,
            file_locks: false,
            manage_cgroups_mode: None,
            container_id: vec![String::from("container")],
        }
    }

    #[test]
    fn test_options_defaults() {
        let options = init_command().options().unwrap();
        assert_eq!(options.image_path, PathBuf::from("/tmp/argonc/images"));
        assert_eq!(options.manage_cgroups_mode, CgroupMode::Soft);
        assert!(!options.leave_running);
        assert!(!options.pre_dump);
        assert!(options.parent_path.is_none());
    }

    #[test]
    fn test_options_rejects_unknown_mode() {
        let mut command = init_command();
        command.manage_cgroups_mode = Some(String::from("FULL"));
        assert!(command.options().is_err());
    }

    #[test]
    fn test_run_rejects_two_container_ids() {
        let mut command = init_command();
        command.container_id = vec![String::from("first"), String::from("second")];
        assert!(command.run(Path::new("/tmp/argonc/no-such-root")).is_err());
    }
}
