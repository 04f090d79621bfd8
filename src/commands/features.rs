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

use anyhow::Result;
use clap::Parser;

use crate::handler::HandlerRegistry;

/// List the execution backends known to the runtime
#[derive(Parser, Debug)]
pub struct Features {}

impl Features {
    pub fn run(&self) -> Result<()> {
        let registry = HandlerRegistry::new();
        for handler in registry.handlers() {
            let alias = match handler.alias() {
                Some(alias) => format!(" ({})", alias),
                None => String::new(),
            };
            let availability = if handler.is_available() {
                "available"
            } else {
                "unavailable"
            };
            println!(
                "{}{}: {} [{}]",
                handler.name(),
                alias,
                handler.feature(),
                availability
            );
        }
        Ok(())
    }
}
