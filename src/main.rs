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
mod commands;
mod container;
mod handler;
mod utils;

use std::{
    path::{Path, PathBuf},
    process::exit,
};

use anyhow::{Context, Result};
use clap::{crate_description, Args, Parser, Subcommand};
use commands::{Checkpoint, Features, Restore, Run};
use log::info;
use nix::unistd::geteuid;

use crate::utils::logger;

// Global options which are not binded to any specific command.
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Root directory to store container state.
    #[arg(short, long)]
    root: Option<PathBuf>,
    /// Path of log file.
    #[arg(short, long)]
    log: Option<PathBuf>,
    /// Enable debug log level.
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(Run),
    Checkpoint(Checkpoint),
    Restore(Restore),
    Features(Features),
}

#[derive(Parser, Debug)]
#[command(version, author, about = crate_description!())]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,
    #[command(subcommand)]
    cmd: Command,
}

fn cmd_run(command: Command, root: &Path) -> Result<()> {
    match command {
        Command::Run(run) => {
            info!("Run command: {:?}", run);
            run.run(root)?
        }
        Command::Checkpoint(checkpoint) => {
            info!("Run command: {:?}", checkpoint);
            checkpoint.run(root)?
        }
        Command::Restore(restore) => {
            info!("Run command: {:?}", restore);
            restore.run(root)?
        }
        Command::Features(features) => {
            info!("Run command: {:?}", features);
            features.run()?
        }
    }
    Ok(())
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();

    logger::init(&cli.global.log, cli.global.debug).with_context(|| "Failed to init logger")?;

    let root_path = if let Some(root) = cli.global.root {
        root
    } else {
        let euid = geteuid();
        PathBuf::from(format!("/var/run/user/{}/argonc", euid))
    };
    cmd_run(cli.cmd, &root_path)
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("ERROR: {:?}", e);
        exit(1);
    }
    exit(0);
}
