// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::utils::io::{read_toml, read_toml_file};

/// Upper bound of a single varint frame (header or block) accepted by the reader.
pub const DEFAULT_MAX_FRAME_LEN: usize = 32 << 20;

/// Options shared by the CAR reader, the import engine and the export engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct CarConfig {
    /// Hash every block and check it against its CID.
    pub verify_cids: bool,
    #[default(DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,
}

impl CarConfig {
    pub fn from_toml(toml_string: &str) -> anyhow::Result<Self> {
        read_toml(toml_string)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        read_toml_file(path)
    }
}
