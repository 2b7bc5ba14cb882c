// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Titan Pay: Protocol Primitives
//!
//! The shared vocabulary of the Titan Pay workspace. The contracts crate
//! decides *who may change what* and *how a payment is split*; this crate
//! provides the nouns those decisions are made about.
//!
//! - **address**: 20-byte account identities, derived from keys or
//!   assigned to contracts at deployment.
//! - **crypto**: Ed25519 keys and signatures, BLAKE3/SHA-256 hashing.
//! - **call**: signed call envelopes, so a host can authenticate callers.
//! - **token**: the value-transfer medium contract and the reference
//!   Titan token that implements it.
//! - **config**: protocol constants. Every magic number lives there.
//!
//! ## Design Philosophy
//!
//! 1. Money is `u64` and every operation on it is checked.
//! 2. Nothing in this crate knows about owners, levels or fees.
//! 3. Every public data type is serde-serializable, because hosts snapshot
//!    state and ship observations over the wire.

pub mod address;
pub mod call;
pub mod config;
pub mod crypto;
pub mod token;

pub use address::{Address, AddressError};
pub use call::{CallError, SignedCall};
pub use token::{Amount, MediumError, TitanToken, TokenEvent, ValueMedium};
