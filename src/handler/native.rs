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

use std::{convert::Infallible, ffi::CString, os::unix::ffi::OsStrExt, path::Path};

use anyhow::{Context, Result};
use nix::{
    sched::sched_setaffinity,
    unistd::{self, Pid},
};

use super::{handler_annotation, wasm_entrypoint, ConfigurePhase, ExecHandler};
use crate::utils::parse_cpuset;
use oci_spec::runtime::RuntimeConfig;

/// Default backend: replace the process image with the container entrypoint.
pub struct NativeHandler;

impl NativeHandler {
    pub fn new() -> Self {
        Self
    }

    fn set_exec_affinity(config: &RuntimeConfig) -> Result<()> {
        if let Some(affinity) = config.process.execCPUAffinity.as_ref() {
            if let Some(initial) = affinity.initial.as_ref() {
                let mask = parse_cpuset(initial)
                    .with_context(|| "Invalid initial CPU affinity specification")?;
                sched_setaffinity(Pid::from_raw(0), &mask.to_cpu_set()?)
                    .with_context(|| "Failed to set initial CPU affinity")?;
            }
        }
        Ok(())
    }
}

impl ExecHandler for NativeHandler {
    fn name(&self) -> &str {
        "native"
    }

    fn feature(&self) -> &str {
        "EXEC:native"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn can_handle(&self, config: &RuntimeConfig) -> bool {
        match handler_annotation(config) {
            Some(name) => name == self.name(),
            None => !wasm_entrypoint(config),
        }
    }

    fn configure(
        &self,
        _phase: ConfigurePhase,
        _config: &mut RuntimeConfig,
        _rootfs: &Path,
    ) -> Result<()> {
        Ok(())
    }

    fn run(&self, config: &RuntimeConfig, path: &Path, args: &[String]) -> Result<Infallible> {
        Self::set_exec_affinity(config)?;

        let exec_bin = CString::new(path.as_os_str().as_bytes())?;
        let args: Vec<CString> = args
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<_, _>>()?;

        Ok(unistd::execvp(&exec_bin, &args)
            .with_context(|| format!("Failed to exec {}", path.display()))?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rusty_fork::rusty_fork_test;

    use crate::container::state::tests::init_config;
    use crate::handler::HANDLER_ANNOTATION;
    use oci_spec::linux::ExecCpuAffinity;

    use super::*;

    #[test]
    fn test_can_handle() {
        let handler = NativeHandler::new();
        let mut config = init_config();
        assert!(handler.can_handle(&config));

        config.process.args = Some(vec![String::from("app.wasm")]);
        assert!(!handler.can_handle(&config));

        let mut annotations = HashMap::new();
        annotations.insert(HANDLER_ANNOTATION.to_string(), "native".to_string());
        config.annotations = Some(annotations.clone());
        assert!(handler.can_handle(&config));

        annotations.insert(HANDLER_ANNOTATION.to_string(), "wasm".to_string());
        config.annotations = Some(annotations);
        config.process.args = Some(vec![String::from("bash")]);
        assert!(!handler.can_handle(&config));
    }

    #[test]
    fn test_run_failure_reports_error() {
        let handler = NativeHandler::new();
        let config = init_config();
        let args = vec![String::from("/does/not/exist")];

        assert!(handler
            .run(&config, Path::new("/does/not/exist"), &args)
            .is_err());
    }

    rusty_fork_test! {
        #[test]
        fn test_set_exec_affinity() {
            let mut config = init_config();
            config.process.execCPUAffinity = Some(ExecCpuAffinity {
                initial: Some(String::from("0")),
                final_cpus: None,
            });

            assert!(NativeHandler::set_exec_affinity(&config).is_ok());
            let set = nix::sched::sched_getaffinity(Pid::from_raw(0)).unwrap();
            assert!(set.is_set(0).unwrap());
            assert!(!set.is_set(1).unwrap());
        }

        #[test]
        fn test_set_exec_affinity_rejects_malformed_cpuset() {
            let mut config = init_config();
            config.process.execCPUAffinity = Some(ExecCpuAffinity {
                initial: Some(String::from("0-")),
                final_cpus: None,
            });

            assert!(NativeHandler::set_exec_affinity(&config).is_err());
        }
    }
}
