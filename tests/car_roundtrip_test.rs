// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use cid::Cid;
use forest_car::{
    CarBlock, CarDag, CarStream, DAG_PB, Error, MemoryDB, RecursionLimit, Selector, cid_v1,
    load_car, write_car, write_selective_car,
};
use futures::TryStreamExt;
use fvm_ipld_blockstore::Blockstore;
use ipld_core::ipld::Ipld;
use ipld_dagpb::{PbLink, PbNode};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn put_node(db: &MemoryDB, links: &[(&str, Cid)]) -> Cid {
    let map: BTreeMap<String, Ipld> = links
        .iter()
        .map(|(name, cid)| (name.to_string(), Ipld::Link(*cid)))
        .collect();
    let block = CarBlock::dag_cbor(&Ipld::Map(map)).unwrap();
    db.put_block(&block).unwrap();
    block.cid
}

fn put_leaf(db: &MemoryDB, data: &[u8]) -> Cid {
    let block = CarBlock::raw(data.to_vec());
    db.put_block(&block).unwrap();
    block.cid
}

struct Dag {
    db: MemoryDB,
    a: Cid,
    b: Cid,
    c: Cid,
    nd1: Cid,
    nd2: Cid,
    nd3: Cid,
}

// nd3 -> {bear: c, second: nd2}, nd2 -> {dog: b, first: nd1}, nd1 -> {cat: a}
fn dag() -> Dag {
    let db = MemoryDB::default();
    let a = put_leaf(&db, b"aaaa");
    let b = put_leaf(&db, b"bbbb");
    let c = put_leaf(&db, b"cccc");
    let nd1 = put_node(&db, &[("cat", a)]);
    let nd2 = put_node(&db, &[("first", nd1), ("dog", b)]);
    let nd3 = put_node(&db, &[("second", nd2), ("bear", c)]);
    Dag {
        db,
        a,
        b,
        c,
        nd1,
        nd2,
        nd3,
    }
}

fn put_pb_node(db: &MemoryDB, links: &[(&str, Cid)]) -> Cid {
    let mut links: Vec<PbLink> = links
        .iter()
        .map(|(name, cid)| PbLink {
            cid: *cid,
            name: Some(name.to_string()),
            size: None,
        })
        .collect();
    links.sort_by(|a, b| a.name.cmp(&b.name));
    let data = PbNode { links, data: None }.into_bytes().to_vec();
    let cid = cid_v1(DAG_PB, &data);
    db.put_keyed(&cid, &data).unwrap();
    cid
}

// Same shape as `dag`, built from dag-pb nodes.
fn pb_dag() -> Dag {
    let db = MemoryDB::default();
    let a = put_leaf(&db, b"aaaa");
    let b = put_leaf(&db, b"bbbb");
    let c = put_leaf(&db, b"cccc");
    let nd1 = put_pb_node(&db, &[("cat", a)]);
    let nd2 = put_pb_node(&db, &[("first", nd1), ("dog", b)]);
    let nd3 = put_pb_node(&db, &[("second", nd2), ("bear", c)]);
    Dag {
        db,
        a,
        b,
        c,
        nd1,
        nd2,
        nd3,
    }
}

async fn block_cids(car: &[u8]) -> Vec<Cid> {
    CarStream::new(car)
        .await
        .unwrap()
        .map_ok(|block| block.cid)
        .try_collect()
        .await
        .unwrap()
}

#[tokio::test]
async fn full_export_roundtrip() {
    let dag = dag();
    let mut car = vec![];
    write_car(&dag.db, vec![dag.nd3], &mut car).await.unwrap();

    let dest = MemoryDB::default();
    let header = load_car(&dest, car.as_slice()).await.unwrap();
    assert_eq!(header.roots, vec![dag.nd3]);
    assert_eq!(dest.blocks(), dag.db.blocks());
}

#[tokio::test]
async fn shared_node_is_written_once() {
    let db = MemoryDB::default();
    let shared = put_leaf(&db, b"shared");
    let left = put_node(&db, &[("x", shared)]);
    let right = put_node(&db, &[("y", shared)]);
    let root = put_node(&db, &[("left", left), ("right", right)]);

    let mut car = vec![];
    write_car(&db, vec![root], &mut car).await.unwrap();
    assert_eq!(block_cids(&car).await, vec![root, left, shared, right]);
}

#[tokio::test]
async fn selective_export_prunes_unselected_nodes() {
    let dag = dag();
    let selector = Selector::explore_index(
        1,
        Selector::explore_recursive(
            RecursionLimit::None,
            Selector::explore_all(Selector::explore_recursive_edge()),
        ),
    );
    let mut car = vec![];
    write_selective_car(&dag.db, vec![CarDag::new(dag.nd3, selector)], &mut car)
        .await
        .unwrap();

    let dest = MemoryDB::default();
    let header = load_car(&dest, car.as_slice()).await.unwrap();
    assert_eq!(header.roots, vec![dag.nd3]);
    for cid in [dag.a, dag.b, dag.nd1, dag.nd2, dag.nd3] {
        assert!(dest.has(&cid).unwrap());
    }
    assert!(!dest.has(&dag.c).unwrap());
}

#[rstest]
#[case::no_roots(vec![])]
#[case::single_root(vec![2])]
#[case::multiple_roots(vec![5, 0, 3])]
#[case::repeated_root(vec![1, 1])]
#[tokio::test]
async fn header_roots_survive_roundtrip(#[case] picks: Vec<usize>) {
    let dag = dag();
    let all = [dag.a, dag.b, dag.c, dag.nd1, dag.nd2, dag.nd3];
    let roots: Vec<Cid> = picks.iter().map(|&i| all[i]).collect();

    let mut car = vec![];
    write_car(&dag.db, roots.clone(), &mut car).await.unwrap();
    let header = load_car(&MemoryDB::default(), car.as_slice())
        .await
        .unwrap();
    assert_eq!(header.roots, roots);
}

#[tokio::test]
async fn selector_index_out_of_range() {
    let dag = dag();
    let selector = Selector::explore_index(5, Selector::Matcher);
    let mut car = vec![];
    let result =
        write_selective_car(&dag.db, vec![CarDag::new(dag.nd3, selector)], &mut car).await;
    assert!(matches!(
        result,
        Err(Error::SelectorIndexOutOfRange {
            index: 5,
            links: 2,
            ..
        })
    ));
}

#[tokio::test]
async fn truncated_archive() {
    let dag = dag();
    let mut car = vec![];
    write_car(&dag.db, vec![dag.nd2], &mut car).await.unwrap();
    let written = block_cids(&car).await;

    let dest = MemoryDB::default();
    let result = load_car(&dest, &car[..car.len() - 1]).await;
    assert!(matches!(result, Err(Error::TruncatedBlock(_))));
    assert!(!dest.has(written.last().unwrap()).unwrap());
    assert_eq!(dest.len(), written.len() - 1);
}

#[tokio::test]
async fn import_twice() {
    let dag = dag();
    let mut car = vec![];
    write_car(&dag.db, vec![dag.nd3], &mut car).await.unwrap();

    let dest = MemoryDB::default();
    load_car(&dest, car.as_slice()).await.unwrap();
    load_car(&dest, car.as_slice()).await.unwrap();
    assert_eq!(dest.blocks(), dag.db.blocks());
}

#[tokio::test]
async fn unlimited_recursion_over_a_cycle() {
    let db = MemoryDB::default();
    // The store does not check keys, so a cycle can be built from a made-up CID.
    let x = cid_v1(fvm_ipld_encoding::DAG_CBOR, b"not the real payload");
    let y = put_node(&db, &[("back", x)]);
    let mut map = BTreeMap::new();
    map.insert("next".to_string(), Ipld::Link(y));
    db.put_keyed(&x, &serde_ipld_dagcbor::to_vec(&Ipld::Map(map)).unwrap())
        .unwrap();

    let selector = Selector::explore_recursive(
        RecursionLimit::None,
        Selector::explore_all(Selector::explore_recursive_edge()),
    );
    let mut car = vec![];
    write_selective_car(&db, vec![CarDag::new(x, selector)], &mut car)
        .await
        .unwrap();
    assert_eq!(block_cids(&car).await, vec![x, y]);

    let mut car = vec![];
    write_car(&db, vec![x], &mut car).await.unwrap();
    assert_eq!(block_cids(&car).await, vec![x, y]);
}

#[tokio::test]
async fn dag_pb_full_export_roundtrip() {
    let dag = pb_dag();
    let mut car = vec![];
    write_car(&dag.db, vec![dag.nd3], &mut car).await.unwrap();
    assert_eq!(
        block_cids(&car).await,
        vec![dag.nd3, dag.c, dag.nd2, dag.b, dag.nd1, dag.a]
    );

    let dest = MemoryDB::default();
    let header = load_car(&dest, car.as_slice()).await.unwrap();
    assert_eq!(header.roots, vec![dag.nd3]);
    assert_eq!(dest.blocks(), dag.db.blocks());
}

#[rstest]
#[case::by_index(Selector::explore_index(1, follow_all()))]
#[case::by_name(Selector::explore_fields([("second", follow_all())]))]
#[tokio::test]
async fn dag_pb_selective_export_prunes_unselected_nodes(#[case] selector: Selector) {
    let dag = pb_dag();
    let mut car = vec![];
    write_selective_car(&dag.db, vec![CarDag::new(dag.nd3, selector)], &mut car)
        .await
        .unwrap();

    let dest = MemoryDB::default();
    let header = load_car(&dest, car.as_slice()).await.unwrap();
    assert_eq!(header.roots, vec![dag.nd3]);
    for cid in [dag.a, dag.b, dag.nd1, dag.nd2, dag.nd3] {
        assert!(dest.has(&cid).unwrap());
    }
    assert!(!dest.has(&dag.c).unwrap());
}

fn follow_all() -> Selector {
    Selector::explore_recursive(
        RecursionLimit::None,
        Selector::explore_all(Selector::explore_recursive_edge()),
    )
}
