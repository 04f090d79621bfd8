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

mod checkpoint;
mod features;
mod restore;
mod run;

pub use checkpoint::Checkpoint;
pub use features::Features;
pub use restore::Restore;
pub use run::Run;

use anyhow::{bail, Result};

// The checkpoint/restore commands take one container ID; anything else is a
// usage error reported before any runtime state is touched.
fn single_container_id(ids: &[String]) -> Result<&str> {
    match ids {
        [id] => Ok(id),
        [] => bail!("Please specify an ID for the container"),
        _ => bail!("Expected a single container ID, got {}", ids.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_container_id() {
        assert_eq!(
            single_container_id(&[String::from("only")]).unwrap(),
            "only"
        );
        assert!(single_container_id(&[]).is_err());
        assert!(
            single_container_id(&[String::from("first"), String::from("second")]).is_err()
        );
    }
}
