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

use serde::{Deserialize, Serialize};

/// CPU affinity used to execute the process.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExecCpuAffinity {
    /// CPUs the runtime parent process is bound to before the transition
    /// to the container process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    /// CPUs the container process itself is bound to.
    #[serde(skip_serializing_if = "Option::is_none", rename = "final")]
    pub final_cpus: Option<String>,
}

/// Cpu cgroup controller settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Cpu {
    /// CPUs the container is allowed to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,
    /// Memory nodes the container is allowed to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mems: Option<String>,
}

/// Cgroup controller settings applied to the container.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Resources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Cpu>,
}

/// Linux-specific section of the container configuration.
#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LinuxPlatform {
    /// Path to the control group the container runs in, relative to
    /// the cgroup mount point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgroupsPath: Option<String>,
    /// Cgroup controller settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
}
