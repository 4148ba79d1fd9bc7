// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//!
//! CID construction and block integrity checks.
//!
//! `multihash_codetable::Code` has no identity hasher, see
//! <https://github.com/multiformats/rust-multihash/pull/289>, so identity
//! digests are compared against the payload directly.
//!

pub mod prelude {
    pub use multihash_codetable::Code as MultihashCode;
    pub use multihash_codetable::MultihashDigest as _;
}

use crate::error::Error;
use cid::Cid;
use prelude::*;

/// Multicodec code of the identity hash function.
pub const IDENTITY_HASH_CODE: u64 = 0x0;

/// Hash function used for CIDs built by this crate.
pub const DEFAULT_HASH: MultihashCode = MultihashCode::Blake2b256;

/// Creates a version 1 CID for `data` tagged with `codec`, hashed with [`DEFAULT_HASH`].
pub fn cid_v1(codec: u64, data: &[u8]) -> Cid {
    Cid::new_v1(codec, DEFAULT_HASH.digest(data))
}

/// Re-hashes `data` with the hash function named by `cid` and checks that the
/// resulting CID is identical.
pub fn verify_cid(cid: &Cid, data: &[u8]) -> Result<(), Error> {
    let code = cid.hash().code();
    if code == IDENTITY_HASH_CODE {
        return match cid.hash().digest() == data {
            true => Ok(()),
            false => Err(Error::CidMismatch(*cid)),
        };
    }
    let hasher = MultihashCode::try_from(code)
        .map_err(|_| Error::MalformedCid(format!("unsupported hash function 0x{code:x}")))?;
    let actual = Cid::new(cid.version(), cid.codec(), hasher.digest(data))
        .map_err(|e| Error::MalformedCid(e.to_string()))?;
    if actual != *cid {
        return Err(Error::CidMismatch(*cid));
    }
    Ok(())
}
