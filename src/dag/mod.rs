// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Export of DAGs from a block store into CAR archives.
//!
//! [`write_car`] exports everything reachable from a set of roots, while
//! [`write_selective_car`] only exports the nodes picked by a [`Selector`] per
//! root. Both walk the graph depth first, write each block at most once and
//! stop at the first error. The output is not removed on failure. On success
//! they return the number of blocks written.

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use tokio::io::AsyncWrite;
use tracing::{debug, trace};

use crate::config::CarConfig;
use crate::error::Error;
use crate::ipld::{DfsIter, Selector, SelectorWalk};
use crate::utils::db::car_stream::{CarBlock, CarHeader};

/// A root node and the selector applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarDag {
    pub root: Cid,
    pub selector: Selector,
}

impl CarDag {
    pub fn new(root: Cid, selector: Selector) -> Self {
        Self { root, selector }
    }
}

/// Writes a CAR archive with `roots` as header roots, containing every block
/// reachable from them.
pub async fn write_car<DB, W>(db: &DB, roots: Vec<Cid>, writer: W) -> Result<usize, Error>
where
    DB: Blockstore,
    W: AsyncWrite + Unpin,
{
    write_car_with_config(db, roots, writer, &CarConfig::default()).await
}

pub async fn write_car_with_config<DB, W>(
    db: &DB,
    roots: Vec<Cid>,
    writer: W,
    config: &CarConfig,
) -> Result<usize, Error>
where
    DB: Blockstore,
    W: AsyncWrite + Unpin,
{
    let header = CarHeader::new(roots);
    let blocks = DfsIter::new(db, header.roots.iter().copied()).verify_cids(config.verify_cids);
    write_blocks(&header, writer, blocks).await
}

/// Writes a CAR archive whose header roots are the roots of `dags`, in order,
/// containing the blocks selected by each DAG's selector. Selectors are
/// validated before anything is written.
pub async fn write_selective_car<DB, W>(db: &DB, dags: Vec<CarDag>, writer: W) -> Result<usize, Error>
where
    DB: Blockstore,
    W: AsyncWrite + Unpin,
{
    write_selective_car_with_config(db, dags, writer, &CarConfig::default()).await
}

pub async fn write_selective_car_with_config<DB, W>(
    db: &DB,
    dags: Vec<CarDag>,
    writer: W,
    config: &CarConfig,
) -> Result<usize, Error>
where
    DB: Blockstore,
    W: AsyncWrite + Unpin,
{
    for dag in &dags {
        dag.selector.validate()?;
    }
    let header = CarHeader::new(dags.iter().map(|dag| dag.root).collect());
    let blocks = SelectorWalk::new(db, dags.into_iter().map(|dag| (dag.root, dag.selector)))
        .verify_cids(config.verify_cids);
    write_blocks(&header, writer, blocks).await
}

async fn write_blocks<W>(
    header: &CarHeader,
    writer: W,
    blocks: impl Iterator<Item = Result<CarBlock, Error>>,
) -> Result<usize, Error>
where
    W: AsyncWrite + Unpin,
{
    let mut n_blocks = 0usize;
    let blocks = blocks.inspect(|block| {
        if let Ok(block) = block {
            trace!(cid = %block.cid, len = block.data.len(), "writing block");
            n_blocks += 1;
        }
    });
    header
        .write_stream_async(writer, futures::stream::iter(blocks))
        .await?;
    debug!(
        roots = header.roots.len(),
        blocks = n_blocks,
        "exported CAR archive"
    );
    Ok(n_blocks)
}
