// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use super::node::DagNode;
use crate::cid_collections::CidHashSet;
use crate::error::Error;
use crate::utils::db::car_stream::CarBlock;
use crate::utils::multihash::IDENTITY_HASH_CODE;

/// Loads the block identified by `cid`. Identity-hashed CIDs carry their own
/// payload and never hit the store.
pub fn load_block<DB: Blockstore>(db: &DB, cid: Cid, verify_cid: bool) -> Result<CarBlock, Error> {
    if cid.hash().code() == IDENTITY_HASH_CODE {
        return Ok(CarBlock {
            cid,
            data: cid.hash().digest().to_vec(),
        });
    }
    let data = db
        .get(&cid)
        .map_err(Error::Read)?
        .ok_or(Error::NodeNotFound(cid))?;
    let block = CarBlock { cid, data };
    if verify_cid {
        block.validate()?;
    }
    Ok(block)
}

/// Depth-first, pre-order iterator over every block reachable from a set of
/// roots. Each CID is yielded at most once, children in link order.
///
/// Iteration stops after the first error.
pub struct DfsIter<'a, DB> {
    db: &'a DB,
    stack: Vec<Cid>,
    seen: CidHashSet,
    verify_cids: bool,
}

impl<'a, DB> DfsIter<'a, DB> {
    pub fn new(db: &'a DB, roots: impl IntoIterator<Item = Cid>) -> Self {
        let mut stack: Vec<Cid> = roots.into_iter().collect();
        stack.reverse();
        Self {
            db,
            stack,
            seen: CidHashSet::default(),
            verify_cids: false,
        }
    }

    /// Treats the given CIDs as already visited.
    pub fn with_seen(self, seen: CidHashSet) -> Self {
        Self { seen, ..self }
    }

    pub fn verify_cids(self, verify_cids: bool) -> Self {
        Self {
            verify_cids,
            ..self
        }
    }

    pub fn seen(&self) -> &CidHashSet {
        &self.seen
    }
}

impl<DB: Blockstore> DfsIter<'_, DB> {
    fn visit(&mut self, cid: Cid) -> Result<CarBlock, Error> {
        let block = load_block(self.db, cid, self.verify_cids)?;
        let links = DagNode::decode(&cid, &block.data)?.links();
        self.stack.extend(
            links
                .into_iter()
                .rev()
                .map(|link| link.cid)
                .filter(|cid| !self.seen.contains(cid)),
        );
        Ok(block)
    }
}

impl<DB: Blockstore> Iterator for DfsIter<'_, DB> {
    type Item = Result<CarBlock, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(cid) = self.stack.pop() {
            if !self.seen.insert(cid) {
                continue;
            }
            let item = self.visit(cid);
            if item.is_err() {
                self.stack.clear();
            }
            return Some(item);
        }
        None
    }
}
