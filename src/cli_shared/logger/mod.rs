// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io::IsTerminal as _;

use tracing_subscriber::{EnvFilter, Registry, prelude::*};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LoggingColor {
    Always,
    #[default]
    Auto,
    Never,
}

impl LoggingColor {
    pub fn coloring_enabled(&self) -> bool {
        match self {
            LoggingColor::Auto => std::io::stderr().is_terminal(),
            LoggingColor::Always => true,
            LoggingColor::Never => false,
        }
    }
}

/// Installs the global subscriber. Logs go to stderr so that archives can be
/// written to stdout.
pub fn setup_logger(color: LoggingColor, json: bool) {
    let layer: Box<dyn tracing_subscriber::layer::Layer<Registry> + Send + Sync> = if json {
        Box::new(
            tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(default_env_filter())),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(color.coloring_enabled())
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(default_env_filter())),
        )
    };
    tracing_subscriber::registry().with(layer).init();
}

/// Returns an [`EnvFilter`] according to the `RUST_LOG` environment variable, or a default
/// - see [`default_env_filter`]
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}

#[test]
fn test_default_env_filter() {
    let _did_not_panic = default_env_filter();
}

#[test]
fn coloring() {
    assert!(LoggingColor::Always.coloring_enabled());
    assert!(!LoggingColor::Never.coloring_enabled());
}
