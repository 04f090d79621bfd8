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
    convert::Infallible,
    env,
    ffi::{c_char, c_int, c_void, CString},
    os::unix::ffi::OsStrExt,
    path::Path,
    process::exit,
    ptr,
};

use anyhow::{anyhow, bail, Context, Result};
use libloading::{os::unix::Symbol, Library};
use log::{debug, info};

use super::{handler_annotation, wasm_entrypoint, ConfigurePhase, ExecHandler};
use crate::get_libfn;
use oci_spec::runtime::{Mount, RuntimeConfig};

pub const WASMEDGE_LIBRARY: &str = "libwasmedge.so.0";

// Environment variables a workload may set for the backend; they are passed
// through to the runtime library, never interpreted here.
const PLUGIN_PATH_ENV: &str = "WASMEDGE_PLUGIN_PATH";
const WASINN_PRELOAD_ENV: &str = "WASMEDGE_WASINN_PRELOAD";

// Host directory holding wasmedge plugins, made visible to containers that
// request plugins.
const PLUGIN_DIR: &str = "/usr/lib/wasmedge";

const HOST_REGISTRATION_WASI: c_int = 0;
const PROPOSAL_BULK_MEMORY_OPERATIONS: c_int = 4;
const PROPOSAL_REFERENCE_TYPES: c_int = 5;
const PROPOSAL_SIMD: c_int = 6;

#[repr(C)]
#[derive(Copy, Clone)]
struct WasmEdgeString {
    length: u32,
    buf: *const c_char,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct WasmEdgeResult {
    code: u8,
}

type ConfigureCreateFn = unsafe extern "C" fn() -> *mut c_void;
type ConfigureDeleteFn = unsafe extern "C" fn(*mut c_void);
type ConfigureAddProposalFn = unsafe extern "C" fn(*mut c_void, c_int);
type ConfigureAddHostRegistrationFn = unsafe extern "C" fn(*mut c_void, c_int);
type VmCreateFn = unsafe extern "C" fn(*const c_void, *mut c_void) -> *mut c_void;
type VmDeleteFn = unsafe extern "C" fn(*mut c_void);
type VmGetImportModuleContextFn = unsafe extern "C" fn(*mut c_void, c_int) -> *mut c_void;
type ModuleInstanceInitWasiFn = unsafe extern "C" fn(
    *mut c_void,
    *const *const c_char,
    u32,
    *const *const c_char,
    u32,
    *const *const c_char,
    u32,
);
type VmRunWasmFromFileFn = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    WasmEdgeString,
    *const c_void,
    u32,
    *mut c_void,
    u32,
) -> WasmEdgeResult;
type PluginLoadFromPathFn = unsafe extern "C" fn(*const c_char);
type PluginInitWasiNnFn = unsafe extern "C" fn(*const *const c_char, u32);
type ResultOkFn = unsafe extern "C" fn(WasmEdgeResult) -> bool;
type StringCreateByCStringFn = unsafe extern "C" fn(*const c_char) -> WasmEdgeString;

struct WasmFuncTable {
    configure_create: Symbol<ConfigureCreateFn>,
    configure_delete: Symbol<ConfigureDeleteFn>,
    configure_add_proposal: Symbol<ConfigureAddProposalFn>,
    configure_add_host_registration: Symbol<ConfigureAddHostRegistrationFn>,
    vm_create: Symbol<VmCreateFn>,
    vm_delete: Symbol<VmDeleteFn>,
    vm_get_import_module_context: Symbol<VmGetImportModuleContextFn>,
    module_instance_init_wasi: Symbol<ModuleInstanceInitWasiFn>,
    vm_run_wasm_from_file: Symbol<VmRunWasmFromFileFn>,
    plugin_load_from_path: Symbol<PluginLoadFromPathFn>,
    plugin_init_wasi_nn: Symbol<PluginInitWasiNnFn>,
    result_ok: Symbol<ResultOkFn>,
    string_create_by_cstring: Symbol<StringCreateByCStringFn>,
}

impl WasmFuncTable {
    unsafe fn new(library: &Library) -> Result<WasmFuncTable> {
        Ok(Self {
            configure_create: get_libfn!(library, ConfigureCreateFn, WasmEdge_ConfigureCreate),
            configure_delete: get_libfn!(library, ConfigureDeleteFn, WasmEdge_ConfigureDelete),
            configure_add_proposal: get_libfn!(
                library,
                ConfigureAddProposalFn,
                WasmEdge_ConfigureAddProposal
            ),
            configure_add_host_registration: get_libfn!(
                library,
                ConfigureAddHostRegistrationFn,
                WasmEdge_ConfigureAddHostRegistration
            ),
            vm_create: get_libfn!(library, VmCreateFn, WasmEdge_VMCreate),
            vm_delete: get_libfn!(library, VmDeleteFn, WasmEdge_VMDelete),
            vm_get_import_module_context: get_libfn!(
                library,
                VmGetImportModuleContextFn,
                WasmEdge_VMGetImportModuleContext
            ),
            module_instance_init_wasi: get_libfn!(
                library,
                ModuleInstanceInitWasiFn,
                WasmEdge_ModuleInstanceInitWASI
            ),
            vm_run_wasm_from_file: get_libfn!(
                library,
                VmRunWasmFromFileFn,
                WasmEdge_VMRunWasmFromFile
            ),
            plugin_load_from_path: get_libfn!(
                library,
                PluginLoadFromPathFn,
                WasmEdge_PluginLoadFromPath
            ),
            plugin_init_wasi_nn: get_libfn!(library, PluginInitWasiNnFn, WasmEdge_PluginInitWASINN),
            result_ok: get_libfn!(library, ResultOkFn, WasmEdge_ResultOK),
            string_create_by_cstring: get_libfn!(
                library,
                StringCreateByCStringFn,
                WasmEdge_StringCreateByCString
            ),
        })
    }
}

// Backend state owned between load and unload. The library handle must stay
// alive as long as the function table it resolved.
struct WasmEdgeBackend {
    #[allow(unused)]
    library: Library,
    vtable: WasmFuncTable,
}

/// Execution backend running the container entrypoint as a WebAssembly
/// module through a dynamically loaded wasmedge runtime.
pub struct WasmEdgeHandler {
    backend: Option<WasmEdgeBackend>,
}

impl WasmEdgeHandler {
    pub fn new() -> Self {
        Self { backend: None }
    }

    fn wants_plugins(config: &RuntimeConfig) -> bool {
        config
            .process
            .env
            .as_ref()
            .map(|envs| {
                envs.iter().any(|env| {
                    env.starts_with(&format!("{}=", PLUGIN_PATH_ENV))
                        || env.starts_with(&format!("{}=", WASINN_PRELOAD_ENV))
                })
            })
            .unwrap_or(false)
    }

    // Make the host plugin directory visible inside the container. Already
    // configured mounts and a missing host directory are both fine.
    fn append_plugin_mount(config: &mut RuntimeConfig, plugin_dir: &Path) {
        let destination = plugin_dir.to_string_lossy().to_string();
        if config
            .mounts
            .iter()
            .any(|mount| mount.destination == destination)
        {
            return;
        }
        if !plugin_dir.exists() {
            return;
        }

        config.mounts.push(Mount {
            destination: destination.clone(),
            source: Some(destination),
            options: Some(
                ["ro", "rprivate", "nosuid", "nodev", "rbind"]
                    .iter()
                    .map(|option| option.to_string())
                    .collect(),
            ),
            fs_type: Some(String::from("bind")),
        });
    }

    fn collect_env(config: &RuntimeConfig) -> Result<Vec<CString>> {
        config
            .process
            .env
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|env| CString::new(env).map_err(|e| anyhow!("Invalid environment entry: {}", e)))
            .collect()
    }
}

impl ExecHandler for WasmEdgeHandler {
    fn name(&self) -> &str {
        "wasmedge"
    }

    fn alias(&self) -> Option<&str> {
        Some("wasm")
    }

    fn feature(&self) -> &str {
        "WASM:wasmedge"
    }

    fn is_available(&self) -> bool {
        if self.backend.is_some() {
            return true;
        }
        // SAFETY: the library is dropped again without calling into it.
        unsafe { Library::new(WASMEDGE_LIBRARY) }.is_ok()
    }

    fn load(&mut self) -> Result<()> {
        if self.backend.is_some() {
            return Ok(());
        }

        // SAFETY: the library is only used through the typed function table
        // resolved below.
        let library = unsafe { Library::new(WASMEDGE_LIBRARY) }
            .with_context(|| format!("Could not load {}", WASMEDGE_LIBRARY))?;
        // SAFETY: every symbol is resolved against its declared type and the
        // library handle outlives the table.
        let vtable = unsafe { WasmFuncTable::new(&library) }
            .with_context(|| format!("Could not find symbol in {}", WASMEDGE_LIBRARY))?;
        self.backend = Some(WasmEdgeBackend { library, vtable });
        debug!("Loaded {}", WASMEDGE_LIBRARY);
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        // A never-loaded backend is a no-op.
        self.backend.take();
        Ok(())
    }

    fn can_handle(&self, config: &RuntimeConfig) -> bool {
        match handler_annotation(config) {
            Some(name) => name == self.name() || Some(name) == self.alias(),
            None => wasm_entrypoint(config),
        }
    }

    fn configure(
        &self,
        phase: ConfigurePhase,
        config: &mut RuntimeConfig,
        _rootfs: &Path,
    ) -> Result<()> {
        if phase != ConfigurePhase::AfterMounts {
            return Ok(());
        }
        if !Self::wants_plugins(config) {
            return Ok(());
        }

        Self::append_plugin_mount(config, Path::new(PLUGIN_DIR));
        Ok(())
    }

    fn run(&self, config: &RuntimeConfig, path: &Path, args: &[String]) -> Result<Infallible> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| anyhow!("wasmedge backend is not loaded"))?;
        let vtable = &backend.vtable;

        let c_args: Vec<CString> = args
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<_, _>>()?;
        let arg_ptrs: Vec<*const c_char> = c_args.iter().map(|arg| arg.as_ptr()).collect();
        let c_envs = Self::collect_env(config)?;
        let env_ptrs: Vec<*const c_char> = c_envs.iter().map(|env| env.as_ptr()).collect();
        let preopens = [CString::new("/:/")?];
        let preopen_ptrs: Vec<*const c_char> =
            preopens.iter().map(|preopen| preopen.as_ptr()).collect();
        let module_path = CString::new(path.as_os_str().as_bytes())?;
        let start_func = CString::new("_start")?;

        // SAFETY: FFI calls against the loaded runtime; every failure path
        // deletes the contexts created before it.
        unsafe {
            let configure = (vtable.configure_create)();
            if configure.is_null() {
                bail!("Could not create wasmedge configure context");
            }
            (vtable.configure_add_proposal)(configure, PROPOSAL_BULK_MEMORY_OPERATIONS);
            (vtable.configure_add_proposal)(configure, PROPOSAL_REFERENCE_TYPES);
            (vtable.configure_add_proposal)(configure, PROPOSAL_SIMD);
            (vtable.configure_add_host_registration)(configure, HOST_REGISTRATION_WASI);

            if let Ok(plugin_path) = env::var(PLUGIN_PATH_ENV) {
                let plugin_path = CString::new(plugin_path)?;
                (vtable.plugin_load_from_path)(plugin_path.as_ptr());
            }
            if let Ok(preload) = env::var(WASINN_PRELOAD_ENV) {
                let preload = CString::new(preload)?;
                let preloads = [preload.as_ptr()];
                (vtable.plugin_init_wasi_nn)(preloads.as_ptr(), 1);
            }

            let vm = (vtable.vm_create)(configure, ptr::null_mut());
            if vm.is_null() {
                (vtable.configure_delete)(configure);
                bail!("Could not create wasmedge vm");
            }

            let wasi_module = (vtable.vm_get_import_module_context)(vm, HOST_REGISTRATION_WASI);
            if wasi_module.is_null() {
                (vtable.vm_delete)(vm);
                (vtable.configure_delete)(configure);
                bail!("Could not get wasmedge wasi module context");
            }

            (vtable.module_instance_init_wasi)(
                wasi_module,
                arg_ptrs.as_ptr(),
                arg_ptrs.len() as u32,
                env_ptrs.as_ptr(),
                env_ptrs.len() as u32,
                preopen_ptrs.as_ptr(),
                preopen_ptrs.len() as u32,
            );

            let result = (vtable.vm_run_wasm_from_file)(
                vm,
                module_path.as_ptr(),
                (vtable.string_create_by_cstring)(start_func.as_ptr()),
                ptr::null(),
                0,
                ptr::null_mut(),
                0,
            );
            let ok = (vtable.result_ok)(result);
            (vtable.vm_delete)(vm);
            (vtable.configure_delete)(configure);
            if !ok {
                bail!("wasmedge failed to run {}", path.display());
            }
        }

        info!("wasmedge finished running {}", path.display());
        exit(0);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::container::state::tests::init_config;
    use crate::handler::HANDLER_ANNOTATION;

    use super::*;

    fn plugin_config() -> RuntimeConfig {
        let mut config = init_config();
        config.process.env = Some(vec![format!("{}=/plugins", PLUGIN_PATH_ENV)]);
        config
    }

    #[test]
    fn test_can_handle() {
        let handler = WasmEdgeHandler::new();
        let mut config = init_config();
        assert!(!handler.can_handle(&config));

        config.process.args = Some(vec![String::from("app.wasm")]);
        assert!(handler.can_handle(&config));

        config.process.args = Some(vec![String::from("bash")]);
        for name in ["wasmedge", "wasm"] {
            let mut annotations = HashMap::new();
            annotations.insert(HANDLER_ANNOTATION.to_string(), name.to_string());
            config.annotations = Some(annotations);
            assert!(handler.can_handle(&config));
        }

        let mut annotations = HashMap::new();
        annotations.insert(HANDLER_ANNOTATION.to_string(), "native".to_string());
        config.annotations = Some(annotations);
        assert!(!handler.can_handle(&config));
    }

    #[test]
    fn test_configure_acts_on_one_phase_only() {
        let handler = WasmEdgeHandler::new();
        let mut config = plugin_config();

        handler
            .configure(ConfigurePhase::BeforeMounts, &mut config, Path::new("/"))
            .unwrap();
        handler
            .configure(ConfigurePhase::BeforeStart, &mut config, Path::new("/"))
            .unwrap();
        assert!(config.mounts.is_empty());
    }

    #[test]
    fn test_configure_without_plugin_request() {
        let handler = WasmEdgeHandler::new();
        let mut config = init_config();

        handler
            .configure(ConfigurePhase::AfterMounts, &mut config, Path::new("/"))
            .unwrap();
        assert!(config.mounts.is_empty());
    }

    #[test]
    fn test_append_plugin_mount_is_idempotent() {
        let mut config = plugin_config();
        let plugin_dir = Path::new("/tmp");

        WasmEdgeHandler::append_plugin_mount(&mut config, plugin_dir);
        assert_eq!(config.mounts.len(), 1);
        assert_eq!(config.mounts[0].destination, "/tmp");
        assert_eq!(config.mounts[0].fs_type, Some(String::from("bind")));

        WasmEdgeHandler::append_plugin_mount(&mut config, plugin_dir);
        assert_eq!(config.mounts.len(), 1);
    }

    #[test]
    fn test_append_plugin_mount_tolerates_missing_host_dir() {
        let mut config = plugin_config();

        WasmEdgeHandler::append_plugin_mount(
            &mut config,
            Path::new("/hopefully/does/not/really/exist"),
        );
        assert!(config.mounts.is_empty());
    }

    #[test]
    fn test_unload_without_load() {
        let mut handler = WasmEdgeHandler::new();
        assert!(handler.unload().is_ok());
    }

    #[test]
    fn test_run_requires_load() {
        let handler = WasmEdgeHandler::new();
        let config = init_config();
        let args = vec![String::from("app.wasm")];

        assert!(handler
            .run(&config, Path::new("app.wasm"), &args)
            .is_err());
    }
}
