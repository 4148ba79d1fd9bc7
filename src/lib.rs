// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Reading and writing of CARv1 archives, and export of IPLD DAGs from a
//! block store, either in full or restricted by a selector.

mod cid_collections;
mod cli;
mod cli_shared;
mod config;
mod dag;
mod db;
mod error;
mod ipld;
mod utils;

pub use cid_collections::CidHashSet;
pub use cli::car_utils_main;
pub use cli_shared::logger::{LoggingColor, setup_logger};
pub use config::{CarConfig, DEFAULT_MAX_FRAME_LEN};
pub use dag::{
    CarDag, write_car, write_car_with_config, write_selective_car,
    write_selective_car_with_config,
};
pub use db::MemoryDB;
pub use error::Error;
pub use ipld::{DAG_PB, DagNode, DfsIter, Link, RecursionLimit, Selector, SelectorWalk};
pub use utils::db::car_stream::{CAR_VERSION, CarBlock, CarFrameCodec, CarHeader, CarStream, CarWriter};
pub use utils::db::car_util::{
    dedup_block_stream, load_car, load_car_with_config, merge_car_streams,
};
pub use utils::io::read_toml;
pub use utils::multihash::{cid_v1, verify_cid};
