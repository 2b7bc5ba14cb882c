//! # Titan Pay Contracts
//!
//! The contract logic of a Titan Pay deployment:
//!
//! - **Approval**: an owner-managed registry of capability levels.
//! - **FeeLedger**: owner-governed fee ratio, receiver and value medium.
//! - **PayCore**: splits each payment into a fee leg and a remainder leg and
//!   moves both through the value medium, or neither.
//! - **Deployment**: the three contracts of one instance, wired together.
//!
//! ## Design Principles
//!
//! 1. All fee arithmetic is checked. Amounts are widened before multiplying.
//! 2. Privileged operations take the caller explicitly and check it first.
//! 3. Mutations return the events they produced; nothing is buffered.
//! 4. Every public type is serializable (serde) for snapshots and the wire.

pub mod approval;
pub mod deployment;
pub mod error;
pub mod events;
pub mod fee_ledger;
pub mod ownership;
pub mod pay_core;

pub use approval::{Approval, CapabilityLevel};
pub use deployment::{Deployment, DeploymentAddresses, DeploymentManifest};
pub use error::{ContractError, ContractResult, ErrorKind, Leg, TransferFailure};
pub use events::ContractEvent;
pub use fee_ledger::{compute_fee, FeeLedger, FeeQuote};
pub use ownership::Ownable;
pub use pay_core::{PayCore, PayCoreConfig, PaymentPolicy, PaymentReceipt};
