// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::ffi::OsString;

use clap::Parser;

use super::subcommands::Cli;
use crate::cli_shared::{logger, read_config};

pub fn main<ArgT>(args: impl IntoIterator<Item = ArgT>) -> anyhow::Result<()>
where
    ArgT: Into<OsString> + Clone,
{
    // Capture Cli inputs
    let Cli {
        config,
        color,
        log_json,
        cmd,
    } = Cli::parse_from(args);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            logger::setup_logger(color, log_json);
            let config = read_config(config.as_deref())?;
            cmd.run(&config).await
        })
}
