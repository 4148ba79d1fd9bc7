// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod main;
mod subcommands;

pub use main::main as car_utils_main;
