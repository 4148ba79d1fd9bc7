// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod car_cmd;

use std::path::PathBuf;

use clap::Parser;

pub(super) use self::car_cmd::CarCommands;
use crate::cli_shared::logger::LoggingColor;

/// Inspect, merge and extract CARv1 archives
#[derive(Debug, Parser)]
#[command(name = "car-utils", version, about)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Colorize log output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: LoggingColor,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub cmd: CarCommands,
}
