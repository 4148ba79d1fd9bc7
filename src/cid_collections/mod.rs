// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod hash_set;

pub use hash_set::CidHashSet;
