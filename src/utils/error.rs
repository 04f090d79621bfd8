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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArgoncErr {
    #[error("Failed to access /proc/{0}")]
    ReadProcPid(i32),
    #[error("Failed to access /proc/{0}/stat")]
    ReadProcStat(i32),
    #[error("Failed to open {0}")]
    OpenFile(String),
    #[error("Failed to create directory {0}")]
    CreateDir(String),
    #[error("Failed to load container state")]
    LoadConState,
    #[error("Failed to load handler {0}")]
    LoadHandler(String),
}
