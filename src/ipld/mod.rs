// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod node;
pub mod selector;
pub mod util;

pub use node::{DAG_PB, DagNode, Link};
pub use selector::{RecursionLimit, Selector, SelectorWalk};
pub use util::DfsIter;
