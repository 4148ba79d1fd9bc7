// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod empty_map;
mod walk;

pub use walk::SelectorWalk;

use std::collections::BTreeMap;

use cid::Cid;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use super::node::Link;
use crate::error::Error;

/// Selectors are expressions that identify and select a subset of data from
/// an IPLD DAG. Every selector is applied to one node and decides which of its
/// links to follow, and with what selector.
///
/// The serde representation follows the IPLD selector schema, see
/// <https://ipld.io/specs/selectors/>.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// Selects the current node and stops.
    #[serde(rename = ".", with = "empty_map")]
    Matcher,

    /// Follows every link of the current node.
    #[serde(rename = "a")]
    ExploreAll {
        #[serde(rename = ">")]
        next: Box<Selector>,
    },

    /// Follows the links named in `fields`, applying the mapped selector to
    /// each target. Other links are pruned.
    #[serde(rename = "f")]
    ExploreFields {
        #[serde(rename = "f>")]
        fields: BTreeMap<String, Selector>,
    },

    /// Follows only the link at position `index`.
    #[serde(rename = "i")]
    ExploreIndex {
        #[serde(rename = "i")]
        index: usize,
        #[serde(rename = ">")]
        next: Box<Selector>,
    },

    /// Follows the links at positions `start..end`.
    #[serde(rename = "r")]
    ExploreRange {
        #[serde(rename = "^")]
        start: usize,
        #[serde(rename = "$")]
        end: usize,
        #[serde(rename = ">")]
        next: Box<Selector>,
    },

    /// Applies every member selector to the same node.
    #[serde(rename = "|")]
    ExploreUnion(Vec<Selector>),

    /// Repeats `sequence`, re-entering it wherever an
    /// [`Selector::ExploreRecursiveEdge`] is reached, until `limit` is used up.
    #[serde(rename = "R")]
    ExploreRecursive {
        #[serde(rename = "l")]
        limit: RecursionLimit,
        #[serde(rename = ":>")]
        sequence: Box<Selector>,
        /// Position inside `sequence` during a traversal. `None` means the
        /// start of `sequence`.
        #[serde(skip)]
        current: Option<Box<Selector>>,
    },

    /// Marks where the enclosing [`Selector::ExploreRecursive`] starts over.
    #[serde(rename = "@", with = "empty_map")]
    ExploreRecursiveEdge,
}

/// Number of times an [`Selector::ExploreRecursive`] may re-enter its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecursionLimit {
    #[serde(rename = "none", with = "empty_map")]
    None,
    #[serde(rename = "depth")]
    Depth(u64),
}

impl Selector {
    pub fn explore_all(next: Selector) -> Self {
        Self::ExploreAll {
            next: Box::new(next),
        }
    }

    pub fn explore_index(index: usize, next: Selector) -> Self {
        Self::ExploreIndex {
            index,
            next: Box::new(next),
        }
    }

    pub fn explore_range(start: usize, end: usize, next: Selector) -> Self {
        Self::ExploreRange {
            start,
            end,
            next: Box::new(next),
        }
    }

    pub fn explore_fields<K: Into<String>>(fields: impl IntoIterator<Item = (K, Selector)>) -> Self {
        Self::ExploreFields {
            fields: fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
        }
    }

    pub fn explore_union(members: impl IntoIterator<Item = Selector>) -> Self {
        Self::ExploreUnion(members.into_iter().collect())
    }

    pub fn explore_recursive(limit: RecursionLimit, sequence: Selector) -> Self {
        Self::ExploreRecursive {
            limit,
            sequence: Box::new(sequence),
            current: None,
        }
    }

    pub fn explore_recursive_edge() -> Self {
        Self::ExploreRecursiveEdge
    }

    /// Checks the selector is well formed before it is used for a traversal.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_in(false)
    }

    fn validate_in(&self, in_recursion: bool) -> Result<(), Error> {
        use Selector::*;
        match self {
            Matcher => Ok(()),
            ExploreAll { next } | ExploreIndex { next, .. } => next.validate_in(in_recursion),
            ExploreRange { start, end, next } => {
                if start > end {
                    return Err(Error::SelectorConstruction(format!(
                        "ExploreRange start {start} is greater than end {end}"
                    )));
                }
                next.validate_in(in_recursion)
            }
            ExploreFields { fields } => fields
                .values()
                .try_for_each(|s| s.validate_in(in_recursion)),
            ExploreUnion(members) => {
                if members.is_empty() {
                    return Err(Error::SelectorConstruction(
                        "ExploreUnion must have at least one member".into(),
                    ));
                }
                members.iter().try_for_each(|s| s.validate_in(in_recursion))
            }
            ExploreRecursive {
                sequence, current, ..
            } => {
                sequence.validate_in(true)?;
                match current {
                    Some(current) => current.validate_in(true),
                    None => Ok(()),
                }
            }
            ExploreRecursiveEdge if in_recursion => Ok(()),
            ExploreRecursiveEdge => Err(Error::SelectorConstruction(
                "ExploreRecursiveEdge must be enclosed by an ExploreRecursive".into(),
            )),
        }
    }

    /// Returns `true` if this selector never follows a link, so the node it is
    /// applied to doesn't need to be decoded.
    pub fn is_terminal(&self) -> bool {
        use Selector::*;
        match self {
            Matcher | ExploreRecursiveEdge => true,
            ExploreUnion(members) => members.iter().all(Selector::is_terminal),
            ExploreRecursive {
                sequence, current, ..
            } => current.as_deref().unwrap_or(sequence).is_terminal(),
            _ => false,
        }
    }

    /// Checks positional selectors against the number of links of the node
    /// identified by `cid`.
    pub fn check_links(&self, cid: &Cid, links: usize) -> Result<(), Error> {
        use Selector::*;
        match self {
            ExploreIndex { index, .. } if *index >= links => Err(Error::SelectorIndexOutOfRange {
                cid: *cid,
                index: *index,
                links,
            }),
            ExploreUnion(members) => members.iter().try_for_each(|s| s.check_links(cid, links)),
            ExploreRecursive {
                sequence, current, ..
            } => current.as_deref().unwrap_or(sequence).check_links(cid, links),
            _ => Ok(()),
        }
    }

    /// Returns the selector to apply to the target of the link at `position`,
    /// or `None` if that link is not followed.
    pub fn explore(&self, position: usize, link: &Link) -> Option<Selector> {
        use Selector::*;
        match self {
            Matcher | ExploreRecursiveEdge => None,
            ExploreAll { next } => Some(next.as_ref().clone()),
            ExploreFields { fields } => fields.get(&link.name).cloned(),
            ExploreIndex { index, next } => (position == *index).then(|| next.as_ref().clone()),
            ExploreRange { start, end, next } => {
                (*start..*end).contains(&position).then(|| next.as_ref().clone())
            }
            ExploreUnion(members) => {
                union_of(members.iter().filter_map(|s| s.explore(position, link)))
            }
            ExploreRecursive {
                limit,
                sequence,
                current,
            } => {
                let next = current
                    .as_deref()
                    .unwrap_or(sequence)
                    .explore(position, link)?;
                let (limit, next) = if !next.has_recursive_edge() {
                    (*limit, next)
                } else {
                    match limit {
                        RecursionLimit::Depth(0) => (*limit, next.replace_recursive_edge(&Matcher)),
                        RecursionLimit::Depth(depth) => (
                            RecursionLimit::Depth(depth - 1),
                            next.replace_recursive_edge(sequence),
                        ),
                        RecursionLimit::None => (*limit, next.replace_recursive_edge(sequence)),
                    }
                };
                Some(ExploreRecursive {
                    limit,
                    sequence: sequence.clone(),
                    current: Some(Box::new(next)),
                })
            }
        }
    }

    /// Edges are only resolved directly or as union members. Edges nested in
    /// other selectors are reached, and resolved, further down the DAG.
    fn has_recursive_edge(&self) -> bool {
        match self {
            Selector::ExploreRecursiveEdge => true,
            Selector::ExploreUnion(members) => members.iter().any(Selector::has_recursive_edge),
            _ => false,
        }
    }

    fn replace_recursive_edge(&self, replacement: &Selector) -> Selector {
        match self {
            Selector::ExploreRecursiveEdge => replacement.clone(),
            Selector::ExploreUnion(members) => {
                union_of(members.iter().map(|s| s.replace_recursive_edge(replacement)))
                    .unwrap_or_else(|| self.clone())
            }
            _ => self.clone(),
        }
    }
}

/// Builds the union of `members`, flattening nested unions and dropping
/// repeated members. A single member is returned as is, none yields `None`.
///
/// Keeps the states reachable by repeatedly exploring a recursive union
/// finite: otherwise every level would nest one more copy of the sequence.
fn union_of(members: impl IntoIterator<Item = Selector>) -> Option<Selector> {
    fn flatten(selector: Selector, out: &mut Vec<Selector>) {
        match selector {
            Selector::ExploreUnion(members) => {
                for member in members {
                    flatten(member, out);
                }
            }
            other => out.push(other),
        }
    }

    let mut flat = vec![];
    for member in members {
        flatten(member, &mut flat);
    }
    let mut members: Vec<Selector> = flat.into_iter().unique().collect();
    match members.len() {
        0 | 1 => members.pop(),
        _ => Some(Selector::ExploreUnion(members)),
    }
}
