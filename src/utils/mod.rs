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

pub mod logger;

mod cgroup;
mod channel;
mod error;

pub use cgroup::{parse_cpuset, resolve_scope_path, CpuMask};
pub use channel::{ChannelError, Endpoint, FdListener};
pub use error::ArgoncErr;

// Resolve one typed function symbol out of a dynamically loaded library.
#[macro_export]
macro_rules! get_libfn {
    ( $lib: ident, $tname: ident, $fname: ident ) => {
        $lib.get::<$tname>(stringify!($fname).as_bytes())
            .with_context(|| format!("Failed to get function {}", stringify!($fname)))?
            .into_raw()
    };
}
