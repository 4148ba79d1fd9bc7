// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use futures::{Stream, StreamExt, TryStreamExt};
use fvm_ipld_blockstore::Blockstore;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::cid_collections::CidHashSet;
use crate::config::CarConfig;
use crate::error::Error;
use crate::utils::db::car_stream::{CarBlock, CarHeader, CarStream};

/// Stream key-value pairs from a CAR archive into a block store.
/// The block store is not restored to its original state in case of errors:
/// blocks read before a failure stay written.
pub async fn load_car<R>(db: &impl Blockstore, reader: R) -> Result<CarHeader, Error>
where
    R: AsyncRead + Unpin,
{
    load_car_with_config(db, reader, &CarConfig::default()).await
}

pub async fn load_car_with_config<R>(
    db: &impl Blockstore,
    reader: R,
    config: &CarConfig,
) -> Result<CarHeader, Error>
where
    R: AsyncRead + Unpin,
{
    let mut stream = CarStream::with_config(reader, config).await?;
    let mut n_blocks = 0usize;
    while let Some(block) = stream.try_next().await? {
        db.put_keyed(&block.cid, &block.data)
            .map_err(Error::Write)?;
        n_blocks += 1;
    }
    debug!(
        roots = stream.header.roots.len(),
        blocks = n_blocks,
        "imported CAR archive"
    );
    Ok(stream.header)
}

/// Chains the blocks of several archives, in order.
pub fn merge_car_streams<R>(
    car_streams: Vec<CarStream<R>>,
) -> impl Stream<Item = Result<CarBlock, Error>>
where
    R: AsyncRead + Unpin,
{
    futures::stream::iter(car_streams).flatten()
}

/// Drops every block whose CID was already seen earlier in the stream.
pub fn dedup_block_stream(
    stream: impl Stream<Item = Result<CarBlock, Error>>,
) -> impl Stream<Item = Result<CarBlock, Error>> {
    let mut seen = CidHashSet::default();
    stream.try_filter(move |CarBlock { cid, data: _ }| futures::future::ready(seen.insert(*cid)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDB;
    use crate::utils::multihash::prelude::*;
    use ahash::HashSet;
    use cid::Cid;
    use futures::executor::{block_on, block_on_stream};
    use fvm_ipld_encoding::DAG_CBOR;
    use itertools::Itertools;
    use pretty_assertions::assert_eq;
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    #[derive(Debug, Clone)]
    struct Blocks(Vec<CarBlock>);

    impl From<&Blocks> for HashSet<Cid> {
        fn from(blocks: &Blocks) -> Self {
            blocks.0.iter().map(|b| b.cid).collect()
        }
    }

    impl Blocks {
        async fn into_car_bytes(self) -> Vec<u8> {
            let roots = self.0.iter().take(1).map(|b| b.cid).collect();
            let mut writer = vec![];
            CarHeader::new(roots)
                .write_stream_async(&mut writer, self.into_stream())
                .await
                .unwrap();
            writer
        }

        fn into_stream(self) -> impl Stream<Item = Result<CarBlock, Error>> {
            futures::stream::iter(self.0).map(Ok)
        }

        /// Implicit clone is performed inside to simplify caller code
        fn to_stream(&self) -> impl Stream<Item = Result<CarBlock, Error>> {
            self.clone().into_stream()
        }
    }

    impl Arbitrary for Blocks {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let n = usize::from(u8::arbitrary(g).saturating_add(1));
            let mut blocks = Vec::with_capacity(n);
            for _ in 0..n {
                // use small len here to increase the chance of duplication
                let data = [u8::arbitrary(g), u8::arbitrary(g)];
                let cid = Cid::new_v1(DAG_CBOR, MultihashCode::Blake2b256.digest(&data));
                let block = CarBlock {
                    cid,
                    data: data.to_vec(),
                };
                blocks.push(block);
            }
            Self(blocks)
        }
    }

    #[quickcheck]
    fn load_car_stores_every_block(blocks: Blocks) -> anyhow::Result<()> {
        block_on(async move {
            let car = blocks.clone().into_car_bytes().await;
            let db = MemoryDB::default();
            let header = load_car(&db, car.as_slice()).await?;

            assert_eq!(header.roots, vec![blocks.0[0].cid]);
            assert_eq!(db.len(), HashSet::from(&blocks).len());
            for block in &blocks.0 {
                assert_eq!(db.get(&block.cid)?, Some(block.data.clone()));
            }
            Ok::<_, anyhow::Error>(())
        })
    }

    #[tokio::test]
    async fn import_is_idempotent() {
        let blocks = Blocks(vec![
            CarBlock::raw(b"aaaa".to_vec()),
            CarBlock::raw(b"bbbb".to_vec()),
        ]);
        let car = blocks.clone().into_car_bytes().await;
        let db = MemoryDB::default();
        load_car(&db, car.as_slice()).await.unwrap();
        let first = db.blocks();
        load_car(&db, car.as_slice()).await.unwrap();
        assert_eq!(db.blocks(), first);
    }

    #[tokio::test]
    async fn truncated_import_keeps_earlier_blocks() {
        let blocks = Blocks(vec![
            CarBlock::raw(b"aaaa".to_vec()),
            CarBlock::raw(b"bbbb".to_vec()),
        ]);
        let car = blocks.clone().into_car_bytes().await;
        let db = MemoryDB::default();
        let result = load_car(&db, &car[..car.len() - 1]).await;

        assert!(matches!(result, Err(Error::TruncatedBlock(_))));
        assert_eq!(db.blocks(), vec![blocks.0[0].clone()]);
    }

    #[tokio::test]
    async fn verified_import_rejects_bad_blocks() {
        let mut bad = CarBlock::raw(b"aaaa".to_vec());
        bad.data = b"tampered".to_vec();
        let car = Blocks(vec![bad]).into_car_bytes().await;
        let config = CarConfig {
            verify_cids: true,
            ..Default::default()
        };
        let db = MemoryDB::default();
        assert!(matches!(
            load_car_with_config(&db, car.as_slice(), &config).await,
            Err(Error::CidMismatch(_))
        ));
        assert!(db.is_empty());
    }

    #[quickcheck]
    fn dedup_block_stream_tests_a_a(a: Blocks) {
        // ∀A. A∪A = A
        assert_eq!(dedup_block_stream_wrapper(&a, &a), HashSet::from(&a));
    }

    #[quickcheck]
    fn dedup_block_stream_tests_a_b(a: Blocks, b: Blocks) {
        let union_a_b = dedup_block_stream_wrapper(&a, &b);
        let union_b_a = dedup_block_stream_wrapper(&b, &a);
        // ∀AB. A∪B = B∪A
        assert_eq!(union_a_b, union_b_a);
        // ∀AB. A⊆(A∪B)
        assert!(union_a_b.is_superset(&HashSet::from(&a)));
        // ∀AB. B⊆(A∪B)
        assert!(union_a_b.is_superset(&HashSet::from(&b)));
    }

    fn dedup_block_stream_wrapper(a: &Blocks, b: &Blocks) -> HashSet<Cid> {
        let blocks: Vec<Cid> =
            block_on_stream(Box::pin(dedup_block_stream(a.to_stream().chain(b.to_stream()))))
                .map(|block| block.unwrap().cid)
                .collect();

        // Ensure `dedup_block_stream` works properly
        assert!(blocks.iter().all_unique());

        HashSet::from_iter(blocks)
    }

    #[quickcheck]
    fn car_dedup_block_stream_tests(a: Blocks, b: Blocks) -> anyhow::Result<()> {
        let cid_union = HashSet::from_iter(HashSet::from(&a).union(&HashSet::from(&b)).cloned());

        block_on(async move {
            let car_a = a.into_car_bytes().await;
            let car_b = b.into_car_bytes().await;
            let deduped = dedup_block_stream(merge_car_streams(vec![
                CarStream::new(car_a.as_slice()).await?,
                CarStream::new(car_b.as_slice()).await?,
            ]));

            let cid_union2: HashSet<Cid> = deduped.map_ok(|block| block.cid).try_collect().await?;

            assert_eq!(cid_union, cid_union2);

            Ok::<_, anyhow::Error>(())
        })
    }
}
