// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod logger;

use std::path::Path;

use crate::config::CarConfig;

/// Reads the configuration file if one is given, defaults otherwise.
pub fn read_config(config_path_opt: Option<&Path>) -> anyhow::Result<CarConfig> {
    match config_path_opt {
        Some(path) => CarConfig::from_file(path),
        None => Ok(CarConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn read_config_default() {
        assert_eq!(read_config(None).unwrap(), CarConfig::default());
    }

    #[test]
    fn read_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "verify_cids = true").unwrap();
        let config = read_config(Some(file.path())).unwrap();
        assert!(config.verify_cids);
    }

    #[test]
    fn read_config_missing_file() {
        assert!(read_config(Some(Path::new("/nonexistent/car-utils.toml"))).is_err());
    }
}
