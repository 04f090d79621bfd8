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
    ffi::{c_char, c_int, CString},
    fs::create_dir_all,
    os::fd::RawFd,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use libloading::{os::unix::Symbol, Library};
use log::debug;
use nix::{
    fcntl::{open, OFlag},
    sys::stat::Mode,
    unistd::{self, Pid},
};

use super::{CgroupMode, CrOptions, SnapshotEngine};
use crate::get_libfn;
use crate::utils::ArgoncErr;

pub const CRIU_LIBRARY: &str = "libcriu.so.2";

const CGROUP_ROOT: &str = "/sys/fs/cgroup";
const DUMP_LOG_FILE: &str = "dump.log";
const RESTORE_LOG_FILE: &str = "restore.log";
const LOG_LEVEL: c_int = 4;

// Cgroup handling modes of the engine.
const CG_MODE_IGNORE: c_int = 0;
const CG_MODE_SOFT: c_int = 3;
const CG_MODE_FULL: c_int = 4;
const CG_MODE_STRICT: c_int = 5;

type CriuInitOptsFn = unsafe extern "C" fn() -> c_int;
type CriuSetImagesDirFdFn = unsafe extern "C" fn(c_int);
type CriuSetWorkDirFdFn = unsafe extern "C" fn(c_int);
type CriuSetParentImagesFn = unsafe extern "C" fn(*const c_char) -> c_int;
type CriuSetPidFn = unsafe extern "C" fn(c_int);
type CriuSetLeaveRunningFn = unsafe extern "C" fn(bool);
type CriuSetExtUnixSkFn = unsafe extern "C" fn(bool);
type CriuSetTcpEstablishedFn = unsafe extern "C" fn(bool);
type CriuSetShellJobFn = unsafe extern "C" fn(bool);
type CriuSetFileLocksFn = unsafe extern "C" fn(bool);
type CriuSetOrphanPtsMasterFn = unsafe extern "C" fn(bool);
type CriuSetManageCgroupsFn = unsafe extern "C" fn(bool);
type CriuSetManageCgroupsModeFn = unsafe extern "C" fn(c_int);
type CriuSetFreezeCgroupFn = unsafe extern "C" fn(*const c_char) -> c_int;
type CriuSetTrackMemFn = unsafe extern "C" fn(bool);
type CriuSetLogFileFn = unsafe extern "C" fn(*const c_char) -> c_int;
type CriuSetLogLevelFn = unsafe extern "C" fn(c_int);
type CriuDumpFn = unsafe extern "C" fn() -> c_int;
type CriuRestoreChildFn = unsafe extern "C" fn() -> c_int;

struct CriuFuncTable {
    init_opts: Symbol<CriuInitOptsFn>,
    set_images_dir_fd: Symbol<CriuSetImagesDirFdFn>,
    set_work_dir_fd: Symbol<CriuSetWorkDirFdFn>,
    set_parent_images: Symbol<CriuSetParentImagesFn>,
    set_pid: Symbol<CriuSetPidFn>,
    set_leave_running: Symbol<CriuSetLeaveRunningFn>,
    set_ext_unix_sk: Symbol<CriuSetExtUnixSkFn>,
    set_tcp_established: Symbol<CriuSetTcpEstablishedFn>,
    set_shell_job: Symbol<CriuSetShellJobFn>,
    set_file_locks: Symbol<CriuSetFileLocksFn>,
    set_orphan_pts_master: Symbol<CriuSetOrphanPtsMasterFn>,
    set_manage_cgroups: Symbol<CriuSetManageCgroupsFn>,
    set_manage_cgroups_mode: Symbol<CriuSetManageCgroupsModeFn>,
    set_freeze_cgroup: Symbol<CriuSetFreezeCgroupFn>,
    set_track_mem: Symbol<CriuSetTrackMemFn>,
    set_log_file: Symbol<CriuSetLogFileFn>,
    set_log_level: Symbol<CriuSetLogLevelFn>,
    dump: Symbol<CriuDumpFn>,
    restore_child: Symbol<CriuRestoreChildFn>,
}

impl CriuFuncTable {
    unsafe fn new(library: &Library) -> Result<CriuFuncTable> {
        Ok(Self {
            init_opts: get_libfn!(library, CriuInitOptsFn, criu_init_opts),
            set_images_dir_fd: get_libfn!(library, CriuSetImagesDirFdFn, criu_set_images_dir_fd),
            set_work_dir_fd: get_libfn!(library, CriuSetWorkDirFdFn, criu_set_work_dir_fd),
            set_parent_images: get_libfn!(library, CriuSetParentImagesFn, criu_set_parent_images),
            set_pid: get_libfn!(library, CriuSetPidFn, criu_set_pid),
            set_leave_running: get_libfn!(library, CriuSetLeaveRunningFn, criu_set_leave_running),
            set_ext_unix_sk: get_libfn!(library, CriuSetExtUnixSkFn, criu_set_ext_unix_sk),
            set_tcp_established: get_libfn!(
                library,
                CriuSetTcpEstablishedFn,
                criu_set_tcp_established
            ),
            set_shell_job: get_libfn!(library, CriuSetShellJobFn, criu_set_shell_job),
            set_file_locks: get_libfn!(library, CriuSetFileLocksFn, criu_set_file_locks),
            set_orphan_pts_master: get_libfn!(
                library,
                CriuSetOrphanPtsMasterFn,
                criu_set_orphan_pts_master
            ),
            set_manage_cgroups: get_libfn!(
                library,
                CriuSetManageCgroupsFn,
                criu_set_manage_cgroups
            ),
            set_manage_cgroups_mode: get_libfn!(
                library,
                CriuSetManageCgroupsModeFn,
                criu_set_manage_cgroups_mode
            ),
            set_freeze_cgroup: get_libfn!(library, CriuSetFreezeCgroupFn, criu_set_freeze_cgroup),
            set_track_mem: get_libfn!(library, CriuSetTrackMemFn, criu_set_track_mem),
            set_log_file: get_libfn!(library, CriuSetLogFileFn, criu_set_log_file),
            set_log_level: get_libfn!(library, CriuSetLogLevelFn, criu_set_log_level),
            dump: get_libfn!(library, CriuDumpFn, criu_dump),
            restore_child: get_libfn!(library, CriuRestoreChildFn, criu_restore_child),
        })
    }
}

fn cgroup_mode_value(mode: CgroupMode) -> c_int {
    match mode {
        CgroupMode::Ignore => CG_MODE_IGNORE,
        CgroupMode::Soft => CG_MODE_SOFT,
        CgroupMode::Full => CG_MODE_FULL,
        CgroupMode::Strict => CG_MODE_STRICT,
    }
}

fn open_dir_fd(path: &Path) -> Result<RawFd> {
    create_dir_all(path)
        .with_context(|| ArgoncErr::CreateDir(path.to_string_lossy().to_string()))?;
    let fd = open(path, OFlag::O_DIRECTORY | OFlag::O_CLOEXEC, Mode::empty())
        .with_context(|| ArgoncErr::OpenFile(path.to_string_lossy().to_string()))?;
    Ok(fd)
}

/// Snapshot engine backed by a dynamically loaded CRIU library. The library
/// handle must stay alive as long as the function table it resolved.
pub struct CriuEngine {
    #[allow(unused)]
    library: Library,
    vtable: CriuFuncTable,
}

impl CriuEngine {
    pub fn new() -> Result<Self> {
        // SAFETY: the library is only used through the typed function table
        // resolved below.
        let library = unsafe { Library::new(CRIU_LIBRARY) }
            .with_context(|| format!("Could not load {}", CRIU_LIBRARY))?;
        // SAFETY: every symbol is resolved against its declared type and the
        // library handle outlives the table.
        let vtable = unsafe { CriuFuncTable::new(&library) }
            .with_context(|| format!("Could not find symbol in {}", CRIU_LIBRARY))?;
        debug!("Loaded {}", CRIU_LIBRARY);
        Ok(Self { library, vtable })
    }

    // Common option set shared by dump and restore. The returned descriptors
    // stay open until the engine call finished.
    unsafe fn apply_common_options(&self, options: &CrOptions) -> Result<Vec<RawFd>> {
        let vtable = &self.vtable;
        let mut dir_fds = Vec::new();

        if (vtable.init_opts)() != 0 {
            bail!("Failed to initialize snapshot engine options");
        }

        let images_fd = open_dir_fd(&options.image_path)?;
        dir_fds.push(images_fd);
        (vtable.set_images_dir_fd)(images_fd);

        if let Some(work_path) = options.work_path.as_ref() {
            match open_dir_fd(work_path) {
                Ok(work_fd) => {
                    dir_fds.push(work_fd);
                    (vtable.set_work_dir_fd)(work_fd);
                }
                Err(e) => {
                    for fd in dir_fds {
                        let _ = unistd::close(fd);
                    }
                    return Err(e);
                }
            }
        }

        (vtable.set_ext_unix_sk)(options.ext_unix_sk);
        (vtable.set_tcp_established)(options.tcp_established);
        (vtable.set_shell_job)(options.shell_job);
        (vtable.set_file_locks)(options.file_locks);
        (vtable.set_orphan_pts_master)(true);
        (vtable.set_manage_cgroups)(true);
        (vtable.set_manage_cgroups_mode)(cgroup_mode_value(options.manage_cgroups_mode));
        (vtable.set_log_level)(LOG_LEVEL);
        Ok(dir_fds)
    }

    unsafe fn run_dump(
        &self,
        pid: Pid,
        options: &CrOptions,
        freeze_scope: Option<&str>,
    ) -> Result<c_int> {
        let vtable = &self.vtable;

        let log_file = CString::new(DUMP_LOG_FILE)?;
        if (vtable.set_log_file)(log_file.as_ptr()) != 0 {
            bail!("Failed to set dump log file");
        }

        (vtable.set_pid)(pid.as_raw());
        // A pre-dump only tracks memory and always leaves the process
        // running.
        (vtable.set_leave_running)(options.leave_running || options.pre_dump);
        if options.pre_dump {
            (vtable.set_track_mem)(true);
        }

        if let Some(parent_path) = options.parent_path.as_ref() {
            let parent = CString::new(parent_path.as_os_str().as_bytes())?;
            if (vtable.set_parent_images)(parent.as_ptr()) != 0 {
                bail!("Failed to set parent image path");
            }
        }

        if let Some(scope) = freeze_scope {
            let path = PathBuf::from(CGROUP_ROOT).join(scope.trim_start_matches('/'));
            let freeze_path = CString::new(path.as_os_str().as_bytes())?;
            if (vtable.set_freeze_cgroup)(freeze_path.as_ptr()) != 0 {
                bail!("Failed to set freeze cgroup {}", path.display());
            }
        }

        Ok((vtable.dump)())
    }

    unsafe fn run_restore(&self, _options: &CrOptions) -> Result<c_int> {
        let vtable = &self.vtable;

        let log_file = CString::new(RESTORE_LOG_FILE)?;
        if (vtable.set_log_file)(log_file.as_ptr()) != 0 {
            bail!("Failed to set restore log file");
        }
        Ok((vtable.restore_child)())
    }
}

impl SnapshotEngine for CriuEngine {
    fn dump(&self, pid: Pid, options: &CrOptions, freeze_scope: Option<&str>) -> Result<()> {
        // SAFETY: FFI calls against the loaded engine; the directory
        // descriptors stay open until the dump finished.
        let dir_fds = unsafe { self.apply_common_options(options) }?;
        let result = unsafe { self.run_dump(pid, options, freeze_scope) };
        for fd in dir_fds {
            let _ = unistd::close(fd);
        }

        let ret = result?;
        if ret < 0 {
            bail!("Snapshot engine failed to dump the container: {}", ret);
        }
        Ok(())
    }

    fn restore(&self, options: &CrOptions) -> Result<Pid> {
        // SAFETY: FFI calls against the loaded engine; the directory
        // descriptors stay open until the restore finished.
        let dir_fds = unsafe { self.apply_common_options(options) }?;
        let result = unsafe { self.run_restore(options) };
        for fd in dir_fds {
            let _ = unistd::close(fd);
        }

        let ret = result?;
        if ret < 0 {
            bail!("Snapshot engine failed to restore the container: {}", ret);
        }
        Ok(Pid::from_raw(ret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cgroup_mode_value() {
        assert_eq!(cgroup_mode_value(CgroupMode::Ignore), CG_MODE_IGNORE);
        assert_eq!(cgroup_mode_value(CgroupMode::Soft), CG_MODE_SOFT);
        assert_eq!(cgroup_mode_value(CgroupMode::Full), CG_MODE_FULL);
        assert_eq!(cgroup_mode_value(CgroupMode::Strict), CG_MODE_STRICT);
    }

    #[test]
    fn test_open_dir_fd_creates_directory() {
        let path = Path::new("/tmp/argonc/test_open_dir_fd");
        let fd = open_dir_fd(path).unwrap();
        assert!(path.is_dir());
        unistd::close(fd).unwrap();
        std::fs::remove_dir_all("/tmp/argonc/test_open_dir_fd").unwrap();
    }
}
