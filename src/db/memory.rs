// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::utils::db::car_stream::CarBlock;
use ahash::HashMap;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use itertools::Itertools;
use parking_lot::RwLock;

/// In-memory block store.
#[derive(Debug, Default)]
pub struct MemoryDB {
    blockchain_db: RwLock<HashMap<Cid, Vec<u8>>>,
}

impl MemoryDB {
    /// Stores `block` under its own CID.
    pub fn put_block(&self, block: &CarBlock) -> anyhow::Result<()> {
        self.put_keyed(&block.cid, &block.data)
    }

    pub fn len(&self) -> usize {
        self.blockchain_db.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blockchain_db.read().is_empty()
    }

    /// All stored blocks, sorted by CID.
    pub fn blocks(&self) -> Vec<CarBlock> {
        self.blockchain_db
            .read()
            .iter()
            .map(|(&cid, data)| CarBlock {
                cid,
                data: data.clone(),
            })
            .sorted()
            .collect_vec()
    }
}

impl Blockstore for MemoryDB {
    fn get(&self, k: &Cid) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.blockchain_db.read().get(k).cloned())
    }

    fn put_keyed(&self, k: &Cid, block: &[u8]) -> anyhow::Result<()> {
        self.blockchain_db.write().insert(*k, block.to_vec());
        Ok(())
    }

    fn has(&self, k: &Cid) -> anyhow::Result<bool> {
        Ok(self.blockchain_db.read().contains_key(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_has() {
        let db = MemoryDB::default();
        let block = CarBlock::raw(b"aaaa".to_vec());
        assert!(!db.has(&block.cid).unwrap());
        assert_eq!(db.get(&block.cid).unwrap(), None);

        db.put_block(&block).unwrap();
        assert!(db.has(&block.cid).unwrap());
        assert_eq!(db.get(&block.cid).unwrap(), Some(block.data.clone()));

        // Overwriting with identical content is a no-op.
        db.put_block(&block).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.blocks(), vec![block]);
    }
}
