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

/// Container's root filesystem.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Root {
    /// Path to the root filesystem for the container.
    pub path: String,
    #[serde(default)]
    /// If true then the root filesystem MUST be read-only inside the container.
    pub readonly: bool,
}

/// The user for the process that allows specific control over which user
/// the process runs as.
#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct User {
    /// User ID in the container namespace.
    pub uid: u32,
    /// Group ID in the container namespace.
    pub gid: u32,
    /// Umask of the calling process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umask: Option<u32>,
    /// Additional group IDs in the container namespace to be added to
    /// the process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additionalGids: Option<Vec<u32>>,
}
