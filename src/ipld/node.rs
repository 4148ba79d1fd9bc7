// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use bytes::Bytes;
use cid::Cid;
use fvm_ipld_encoding::{DAG_CBOR, IPLD_RAW};
use ipld_core::ipld::Ipld;
use ipld_dagpb::PbNode;

use crate::error::Error;

/// Multicodec code of the dag-pb (`MerkleDAG` protobuf) format.
pub const DAG_PB: u64 = 0x70;

/// A named edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    /// Path of the link inside its parent, segments joined by `/`.
    pub name: String,
    pub cid: Cid,
}

impl Link {
    pub fn new(name: impl Into<String>, cid: Cid) -> Self {
        Self {
            name: name.into(),
            cid,
        }
    }
}

/// A decoded block, dispatched on the codec of its CID.
#[derive(Debug, Clone, PartialEq)]
pub enum DagNode {
    /// Raw bytes, never has links.
    Raw,
    DagCbor(Ipld),
    /// A dag-pb node, reduced to its links in `PBNode.Links` order. Links are
    /// named by `PBLink.Name`, or by the empty string when unnamed.
    DagPb(Vec<Link>),
    /// Any codec whose link layout is unknown. Treated as a leaf.
    Opaque { codec: u64 },
}

impl DagNode {
    pub fn decode(cid: &Cid, data: &[u8]) -> Result<Self, Error> {
        match cid.codec() {
            IPLD_RAW => Ok(DagNode::Raw),
            DAG_CBOR => serde_ipld_dagcbor::from_slice(data)
                .map(DagNode::DagCbor)
                .map_err(|e| Error::NodeDecode {
                    cid: *cid,
                    reason: e.to_string(),
                }),
            DAG_PB => {
                let node =
                    PbNode::from_bytes(Bytes::copy_from_slice(data)).map_err(|e| {
                        Error::NodeDecode {
                            cid: *cid,
                            reason: e.to_string(),
                        }
                    })?;
                Ok(DagNode::DagPb(
                    node.links
                        .into_iter()
                        .map(|link| Link::new(link.name.unwrap_or_default(), link.cid))
                        .collect(),
                ))
            }
            codec => {
                tracing::debug!(%cid, "no link layout for codec 0x{codec:x}, treating as a leaf");
                Ok(DagNode::Opaque { codec })
            }
        }
    }

    /// Links in declaration order. For DAG-CBOR that is map entries by key and
    /// list entries by index, depth first.
    pub fn links(&self) -> Vec<Link> {
        match self {
            DagNode::DagCbor(ipld) => {
                let mut links = vec![];
                collect_links(ipld, &mut vec![], &mut links);
                links
            }
            DagNode::DagPb(links) => links.clone(),
            DagNode::Raw | DagNode::Opaque { .. } => vec![],
        }
    }
}

fn collect_links(ipld: &Ipld, path: &mut Vec<String>, links: &mut Vec<Link>) {
    match ipld {
        Ipld::Map(map) => {
            for (key, value) in map.iter() {
                path.push(key.clone());
                collect_links(value, path, links);
                path.pop();
            }
        }
        Ipld::List(list) => {
            for (i, value) in list.iter().enumerate() {
                path.push(i.to_string());
                collect_links(value, path, links);
                path.pop();
            }
        }
        &Ipld::Link(cid) => links.push(Link::new(path.join("/"), cid)),
        _ => (),
    }
}
