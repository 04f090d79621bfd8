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

mod native;
mod wasmedge;

pub use native::NativeHandler;
pub use wasmedge::WasmEdgeHandler;

use std::{convert::Infallible, path::Path, path::PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use log::debug;

use crate::utils::ArgoncErr;
use oci_spec::runtime::RuntimeConfig;

/// Annotation selecting the execution backend for a container.
pub const HANDLER_ANNOTATION: &str = "run.oci.handler";

/// Lifecycle points at which a backend may adjust the container
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurePhase {
    BeforeMounts,
    AfterMounts,
    BeforeStart,
}

const CONFIGURE_PHASES: [ConfigurePhase; 3] = [
    ConfigurePhase::BeforeMounts,
    ConfigurePhase::AfterMounts,
    ConfigurePhase::BeforeStart,
];

/// A pluggable execution backend able to replace the native launch of a
/// container process.
///
/// Backend-owned state is acquired by `load` and released by `unload`;
/// `unload` on a never-loaded backend is a no-op. `run` either replaces the
/// process image (and thus never returns) or reports an error after
/// releasing everything it allocated.
pub trait ExecHandler {
    fn name(&self) -> &str;

    fn alias(&self) -> Option<&str> {
        None
    }

    /// Capability tag advertised to the outside, e.g. through `features`.
    fn feature(&self) -> &str;

    /// Whether the backend can be loaded on this host at all.
    fn is_available(&self) -> bool;

    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        Ok(())
    }

    fn can_handle(&self, config: &RuntimeConfig) -> bool;

    /// Invoked once per lifecycle phase; phases a backend does not act on
    /// must be a no-op.
    fn configure(
        &self,
        phase: ConfigurePhase,
        config: &mut RuntimeConfig,
        rootfs: &Path,
    ) -> Result<()>;

    fn run(&self, config: &RuntimeConfig, path: &Path, args: &[String]) -> Result<Infallible>;
}

pub fn handler_annotation(config: &RuntimeConfig) -> Option<&str> {
    config
        .annotations
        .as_ref()
        .and_then(|a| a.get(HANDLER_ANNOTATION))
        .map(|s| s.as_str())
}

fn wasm_entrypoint(config: &RuntimeConfig) -> bool {
    config
        .process
        .args
        .as_ref()
        .and_then(|args| args.first())
        .map(|arg| arg.ends_with(".wasm"))
        .unwrap_or(false)
}

fn entrypoint(config: &RuntimeConfig) -> Result<(PathBuf, Vec<String>)> {
    let args = config
        .process
        .args
        .clone()
        .ok_or_else(|| anyhow!("args in process is not set in config.json"))?;
    if args.is_empty() {
        bail!("args in process is empty in config.json");
    }
    Ok((PathBuf::from(&args[0]), args))
}

/// The set of registered execution backends for one container-execution
/// attempt.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn ExecHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: vec![
                Box::new(NativeHandler::new()),
                Box::new(WasmEdgeHandler::new()),
            ],
        }
    }

    #[cfg(test)]
    fn with_handlers(handlers: Vec<Box<dyn ExecHandler>>) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &[Box<dyn ExecHandler>] {
        &self.handlers
    }

    /// Exactly one backend must claim the container; none or several is a
    /// configuration error.
    fn select(&mut self, config: &RuntimeConfig) -> Result<&mut Box<dyn ExecHandler>> {
        let claimed: Vec<usize> = self
            .handlers
            .iter()
            .enumerate()
            .filter(|(_, handler)| handler.can_handle(config))
            .map(|(index, _)| index)
            .collect();

        match claimed.as_slice() {
            [index] => Ok(&mut self.handlers[*index]),
            [] => bail!("No registered handler can execute the container"),
            _ => {
                let names: Vec<&str> = claimed
                    .iter()
                    .map(|index| self.handlers[*index].name())
                    .collect();
                bail!("More than one handler claims the container: {:?}", names)
            }
        }
    }

    /// Resolve the backend for the container and hand the calling process
    /// over to it. Returns only on error; any backend loaded on the way is
    /// unloaded before the error propagates.
    pub fn dispatch(&mut self, config: &mut RuntimeConfig, rootfs: &Path) -> Result<Infallible> {
        let (path, args) = entrypoint(config)?;
        let handler = self.select(config)?;
        debug!("Dispatching container to handler {}", handler.name());

        if let Err(e) = handler.load() {
            let _ = handler.unload();
            return Err(e).with_context(|| ArgoncErr::LoadHandler(handler.name().to_string()));
        }

        for phase in CONFIGURE_PHASES {
            if let Err(e) = handler.configure(phase, config, rootfs) {
                let _ = handler.unload();
                return Err(e)
                    .with_context(|| format!("Handler {} failed to configure", handler.name()));
            }
        }

        match handler.run(config, &path, &args) {
            Ok(never) => match never {},
            Err(e) => {
                let _ = handler.unload();
                Err(e).with_context(|| format!("Handler {} failed to run", handler.name()))
            }
        }
    }
}
