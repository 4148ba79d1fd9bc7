// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use thiserror::Error;

/// CAR codec, DAG traversal and selector error
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed CAR header: {0}")]
    MalformedHeader(String),
    #[error("Truncated block: {0}")]
    TruncatedBlock(String),
    #[error("Malformed frame length prefix: {0}")]
    MalformedFrame(String),
    #[error("Malformed CID: {0}")]
    MalformedCid(String),
    #[error("Node not found in block store: {0}")]
    NodeNotFound(Cid),
    #[error("Failed to decode node {cid}: {reason}")]
    NodeDecode { cid: Cid, reason: String },
    #[error("Selector index {index} out of range for node {cid} with {links} links")]
    SelectorIndexOutOfRange { cid: Cid, index: usize, links: usize },
    #[error("Invalid selector: {0}")]
    SelectorConstruction(String),
    #[error("CAR archive is empty")]
    EmptyArchive,
    #[error("CID/Block mismatch for block {0}")]
    CidMismatch(Cid),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Failed to read from block store: {0}")]
    Read(#[source] anyhow::Error),
    #[error("Failed to write to block store: {0}")]
    Write(#[source] anyhow::Error),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for errors caused by corrupted archive bytes, as opposed
    /// to graph resolution, selector misuse or I/O failures.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeader(_)
                | Error::TruncatedBlock(_)
                | Error::MalformedFrame(_)
                | Error::MalformedCid(_)
                | Error::EmptyArchive
                | Error::CidMismatch(_)
        )
    }

    /// Returns `true` for errors raised by the selector interpreter.
    pub fn is_selector_error(&self) -> bool {
        matches!(
            self,
            Error::SelectorIndexOutOfRange { .. } | Error::SelectorConstruction(_)
        )
    }
}
