// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use ahash::{HashSet, HashSetExt as _};
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use super::Selector;
use crate::cid_collections::CidHashSet;
use crate::error::Error;
use crate::ipld::node::DagNode;
use crate::ipld::util::load_block;
use crate::utils::db::car_stream::CarBlock;

/// Depth-first, pre-order iterator over the blocks selected by a list of
/// `(root, selector)` jobs, processed in order.
///
/// Every CID is yielded at most once over all jobs. A node reached twice with
/// the same selector state is only explored once, which also bounds
/// unlimited recursion over cyclic input.
pub struct SelectorWalk<'a, DB> {
    db: &'a DB,
    stack: Vec<(Cid, Selector)>,
    explored: HashSet<(Cid, Selector)>,
    emitted: CidHashSet,
    verify_cids: bool,
}

impl<'a, DB> SelectorWalk<'a, DB> {
    pub fn new(db: &'a DB, jobs: impl IntoIterator<Item = (Cid, Selector)>) -> Self {
        let mut stack: Vec<_> = jobs.into_iter().collect();
        stack.reverse();
        Self {
            db,
            stack,
            explored: HashSet::new(),
            emitted: CidHashSet::default(),
            verify_cids: false,
        }
    }

    pub fn verify_cids(self, verify_cids: bool) -> Self {
        Self {
            verify_cids,
            ..self
        }
    }

    pub fn emitted(&self) -> &CidHashSet {
        &self.emitted
    }
}

impl<DB: Blockstore> SelectorWalk<'_, DB> {
    fn visit(&mut self, cid: Cid, selector: Selector) -> Result<Option<CarBlock>, Error> {
        if selector.is_terminal() && self.emitted.contains(&cid) {
            return Ok(None);
        }
        if !self.explored.insert((cid, selector.clone())) {
            return Ok(None);
        }
        let block = load_block(self.db, cid, self.verify_cids)?;
        if !selector.is_terminal() {
            let links = DagNode::decode(&cid, &block.data)?.links();
            selector.check_links(&cid, links.len())?;
            let children = links
                .iter()
                .enumerate()
                .filter_map(|(position, link)| {
                    selector.explore(position, link).map(|next| (link.cid, next))
                })
                .collect::<Vec<_>>();
            tracing::trace!(%cid, links = links.len(), followed = children.len(), "explored node");
            self.stack.extend(children.into_iter().rev());
        }
        Ok(self.emitted.insert(cid).then_some(block))
    }
}

impl<DB: Blockstore> Iterator for SelectorWalk<'_, DB> {
    type Item = Result<CarBlock, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((cid, selector)) = self.stack.pop() {
            match self.visit(cid, selector) {
                Ok(Some(block)) => return Some(Ok(block)),
                Ok(None) => continue,
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
