//! # Deployment Host
//!
//! Owns the live [`Deployment`] and is the only path by which it changes.
//!
//! ## Calls
//!
//! Queries take plain positional params and run under a read lock.
//! Mutations take a [`SignedCall`] whose `method` must equal the RPC method.
//! A mutation is handled as:
//!
//! 1. check the call is addressed to this deployment's PayCore and verify
//!    the signature, yielding the caller's address;
//! 2. under the write lock, check the nonce is above the caller's last one;
//! 3. apply the operation to a staged copy of the deployment;
//! 4. commit the staged copy and the nonce to the store;
//! 5. swap the staged copy in, release the lock, publish events.
//!
//! A failure at any step leaves state, nonce and subscribers untouched.
//!
//! The one exception is a commit whose flush fails. The store already
//! serves the new batch, so the host adopts it to stay in step, answers
//! that call with a storage error and halts: every later mutation is
//! refused until the node restarts from whatever reached disk.
//!
//! All of this blocks on the lock and on disk. Async callers run it on the
//! blocking pool.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

use titan_contracts::{
    ContractError, ContractEvent, Deployment, DeploymentAddresses, DeploymentManifest, FeeQuote,
    PaymentPolicy,
};
use titan_protocol::{Address, Amount, CallError, SignedCall, ValueMedium};

use crate::metrics::SharedMetrics;
use crate::store::{StateStore, StoreError};

/// Broadcast channel capacity for contract events. Slow subscribers that
/// fall further behind than this lose the oldest events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub const QUERY_METHODS: &[&str] = &[
    "approval_owner",
    "approval_levelOf",
    "approval_isSuper",
    "approval_isMiner",
    "payCore_owner",
    "payCore_feeInfo",
    "payCore_feeRatio",
    "payCore_titan",
    "payCore_paymentPolicy",
    "titan_balanceOf",
    "titan_allowance",
    "titan_totalSupply",
];

pub const MUTATION_METHODS: &[&str] = &[
    "approval_setLevel",
    "approval_transferOwnership",
    "payCore_setFeeRatio",
    "payCore_setFeeReceiver",
    "payCore_setTitan",
    "payCore_setPaymentPolicy",
    "payCore_transferOwnership",
    "payCore_payTitan",
    "titan_mint",
    "titan_approve",
    "titan_transfer",
];

/// `true` if `method` is served by the host.
pub fn is_known_method(method: &str) -> bool {
    QUERY_METHODS.contains(&method) || MUTATION_METHODS.contains(&method)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("method not found: {0}")]
    UnknownMethod(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("authentication failed: {0}")]
    Auth(CallError),

    /// The nonce is not above the caller's last accepted nonce.
    #[error("nonce {got} rejected for {caller}: last accepted is {last}")]
    NonceReplay { caller: Address, last: u64, got: u64 },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),

    /// An earlier commit could not be confirmed durable.
    #[error("host halted after an unconfirmed commit; restart the node")]
    Halted,

    /// The stored snapshot was created from a different manifest.
    #[error("stored snapshot belongs to another deployment (pay core {stored}, manifest {expected})")]
    SnapshotMismatch { stored: Address, expected: Address },
}

impl From<CallError> for HostError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::InvalidArgs(msg) => HostError::InvalidParams(msg),
            other => HostError::Auth(other),
        }
    }
}

impl HostError {
    /// JSON-RPC error code.
    pub fn code(&self) -> i32 {
        match self {
            HostError::UnknownMethod(_) => -32601,
            HostError::InvalidParams(_) => -32602,
            HostError::Auth(_) => -32001,
            HostError::NonceReplay { .. } => -32002,
            HostError::Contract(_) => -32000,
            HostError::Store(_)
            | HostError::Internal(_)
            | HostError::Halted
            | HostError::SnapshotMismatch { .. } => {
                -32603
            }
        }
    }

    /// Structured `data` for the JSON-RPC error object.
    pub fn data(&self) -> Option<Value> {
        match self {
            HostError::Contract(e) => Some(json!({ "kind": e.kind() })),
            HostError::NonceReplay { last, .. } => Some(json!({ "last_nonce": last })),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            HostError::UnknownMethod(_) => "unknown_method",
            HostError::InvalidParams(_) => "invalid_params",
            HostError::Auth(_) => "auth_failed",
            HostError::NonceReplay { .. } => "nonce_replay",
            HostError::Contract(e) => e.kind().as_str(),
            HostError::Store(_)
            | HostError::Internal(_)
            | HostError::Halted
            | HostError::SnapshotMismatch { .. } => {
                "internal"
            }
        }
    }
}

pub type HostResult<T> = Result<T, HostError>;

// ---------------------------------------------------------------------------
// Mutation arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetLevelArgs {
    target: Address,
    level: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferOwnershipArgs {
    new_owner: Address,
}

#[derive(Debug, Deserialize)]
struct SetFeeRatioArgs {
    ratio: u64,
}

#[derive(Debug, Deserialize)]
struct SetFeeReceiverArgs {
    receiver: Address,
}

#[derive(Debug, Deserialize)]
struct SetTitanArgs {
    titan: Address,
}

#[derive(Debug, Deserialize)]
struct SetPaymentPolicyArgs {
    policy: PaymentPolicy,
}

#[derive(Debug, Deserialize)]
struct PayTitanArgs {
    from: Address,
    to: Address,
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct MintArgs {
    to: Address,
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct ApproveArgs {
    spender: Address,
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct TransferArgs {
    to: Address,
    amount: Amount,
}

/// The result of a committed mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOutcome {
    pub caller: Address,
    pub nonce: u64,
    pub events: Vec<ContractEvent>,
    /// The fee split, for payments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<FeeQuote>,
}

/// Point-in-time facts for `/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSummary {
    pub owner: Address,
    pub addresses: DeploymentAddresses,
    pub fee_ratio: u64,
    pub payment_policy: PaymentPolicy,
    pub total_supply: Amount,
    pub known_callers: usize,
    pub snapshot_bytes: usize,
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

struct HostState {
    deployment: Deployment,
    nonces: BTreeMap<Address, u64>,
    halted: bool,
}

pub struct Host {
    /// PayCore address; signed calls must name it.
    target: Address,
    state: RwLock<HostState>,
    store: StateStore,
    events: broadcast::Sender<ContractEvent>,
    metrics: SharedMetrics,
}

impl Host {
    /// Restores the last committed state from `store`, or deploys fresh
    /// contracts from `manifest` if the store is empty.
    pub fn open(
        manifest: &DeploymentManifest,
        store: StateStore,
        metrics: SharedMetrics,
    ) -> HostResult<Self> {
        let expected = manifest.resolved_addresses();
        let deployment = match store.load_deployment()? {
            Some(deployment) => {
                let stored = deployment.pay_core.address();
                if stored != expected.pay_core {
                    return Err(HostError::SnapshotMismatch {
                        stored,
                        expected: expected.pay_core,
                    });
                }
                tracing::info!(pay_core = %stored, "restored deployment snapshot");
                deployment
            }
            None => {
                let deployment = Deployment::from_manifest(manifest)?;
                store.save_deployment(&deployment)?;
                deployment
            }
        };
        let nonces = store.load_nonces()?;
        tracing::info!(callers = nonces.len(), "nonces loaded");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            target: expected.pay_core,
            state: RwLock::new(HostState {
                deployment,
                nonces,
                halted: false,
            }),
            store,
            events,
            metrics,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContractEvent> {
        self.events.subscribe()
    }

    pub fn summary(&self) -> HostSummary {
        let state = self.state.read();
        let d = &state.deployment;
        HostSummary {
            owner: d.pay_core.owner(),
            addresses: d.addresses(),
            fee_ratio: d.pay_core.fee_ratio(),
            payment_policy: d.pay_core.payment_policy(),
            total_supply: d.titan.total_supply(),
            known_callers: state.nonces.len(),
            snapshot_bytes: self.store.snapshot_size().unwrap_or(0),
        }
    }

    /// Last accepted nonce for `caller`; 0 if it never called.
    pub fn nonce_of(&self, caller: &Address) -> u64 {
        self.state.read().nonces.get(caller).copied().unwrap_or(0)
    }

    /// Dispatches one JSON-RPC call.
    pub fn handle(&self, method: &str, params: Option<Value>) -> HostResult<Value> {
        if QUERY_METHODS.contains(&method) {
            return self.query(method, params.unwrap_or(Value::Null));
        }
        if MUTATION_METHODS.contains(&method) {
            let call: SignedCall = serde_json::from_value(params.unwrap_or(Value::Null))
                .map_err(|e| HostError::InvalidParams(format!("expected a signed call: {e}")))?;
            let outcome = self.execute(method, &call)?;
            return to_value(&outcome);
        }
        Err(HostError::UnknownMethod(method.to_string()))
    }

    // -- Queries -------------------------------------------------------------

    fn query(&self, method: &str, params: Value) -> HostResult<Value> {
        tracing::debug!(method, "query");
        let state = self.state.read();
        let d = &state.deployment;
        match method {
            "approval_owner" => to_value(&d.approval.owner()),
            "approval_levelOf" => {
                let (account,) = positional::<(Address,)>(params, "[account]")?;
                to_value(&d.approval.level_of(&account).as_u8())
            }
            "approval_isSuper" => {
                let (account,) = positional::<(Address,)>(params, "[account]")?;
                to_value(&d.approval.is_elevated(&account))
            }
            "approval_isMiner" => {
                let (account,) = positional::<(Address,)>(params, "[account]")?;
                to_value(&d.approval.is_operator(&account))
            }
            "payCore_owner" => to_value(&d.pay_core.owner()),
            "payCore_feeInfo" => {
                let (amount,) = positional::<(Amount,)>(params, "[amount]")?;
                to_value(&d.pay_core.fee_info(amount)?)
            }
            "payCore_feeRatio" => to_value(&d.pay_core.fee_ratio()),
            "payCore_titan" => to_value(&d.pay_core.titan()),
            "payCore_paymentPolicy" => to_value(&d.pay_core.payment_policy()),
            "titan_balanceOf" => {
                let (account,) = positional::<(Address,)>(params, "[account]")?;
                to_value(&d.titan.balance_of(&account))
            }
            "titan_allowance" => {
                let (owner, spender) = positional::<(Address, Address)>(params, "[owner, spender]")?;
                to_value(&d.titan.allowance(&owner, &spender))
            }
            "titan_totalSupply" => to_value(&d.titan.total_supply()),
            other => Err(HostError::UnknownMethod(other.to_string())),
        }
    }

    // -- Mutations -----------------------------------------------------------

    /// Authenticates, applies and commits one signed mutation.
    pub fn execute(&self, method: &str, call: &SignedCall) -> HostResult<CallOutcome> {
        if call.method != method {
            return Err(HostError::InvalidParams(format!(
                "signed method {} does not match {}",
                call.method, method
            )));
        }
        let caller = call.verify_for(&self.target)?;

        let mut state = self.state.write();
        if state.halted {
            return Err(HostError::Halted);
        }
        let last = state.nonces.get(&caller).copied().unwrap_or(0);
        if call.nonce <= last {
            return Err(HostError::NonceReplay {
                caller,
                last,
                got: call.nonce,
            });
        }

        let mut staged = state.deployment.clone();
        let (events, quote) = apply(&mut staged, method, &caller, call)?;

        match self.store.commit(&staged, &caller, call.nonce) {
            Ok(()) => {}
            Err(StoreError::Flush(e)) => {
                state.deployment = staged;
                state.nonces.insert(caller, call.nonce);
                state.halted = true;
                tracing::error!(%caller, method, nonce = call.nonce, error = %e, "commit not durable, halting mutations");
                return Err(StoreError::Flush(e).into());
            }
            Err(e) => return Err(e.into()),
        }
        state.deployment = staged;
        state.nonces.insert(caller, call.nonce);
        drop(state);

        tracing::info!(%caller, method, nonce = call.nonce, events = events.len(), "call committed");
        if let Some(quote) = &quote {
            self.metrics.record_payment(quote);
        }
        for event in &events {
            // No subscribers is not an error.
            let _ = self.events.send(event.clone());
        }

        Ok(CallOutcome {
            caller,
            nonce: call.nonce,
            events,
            quote,
        })
    }
}

type Applied = (Vec<ContractEvent>, Option<FeeQuote>);

fn apply(d: &mut Deployment, method: &str, caller: &Address, call: &SignedCall) -> HostResult<Applied> {
    let single = |event: ContractEvent| -> HostResult<Applied> { Ok((vec![event], None)) };
    match method {
        "approval_setLevel" => {
            let args: SetLevelArgs = call.args()?;
            single(d.approval.set_level(caller, &args.target, args.level)?)
        }
        "approval_transferOwnership" => {
            let args: TransferOwnershipArgs = call.args()?;
            single(d.approval.transfer_ownership(caller, args.new_owner)?)
        }
        "payCore_setFeeRatio" => {
            let args: SetFeeRatioArgs = call.args()?;
            single(d.pay_core.set_fee_ratio(caller, args.ratio)?)
        }
        "payCore_setFeeReceiver" => {
            let args: SetFeeReceiverArgs = call.args()?;
            single(d.pay_core.set_fee_receiver(caller, args.receiver)?)
        }
        "payCore_setTitan" => {
            let args: SetTitanArgs = call.args()?;
            single(d.pay_core.set_titan(caller, args.titan)?)
        }
        "payCore_setPaymentPolicy" => {
            let args: SetPaymentPolicyArgs = call.args()?;
            single(d.pay_core.set_payment_policy(caller, args.policy)?)
        }
        "payCore_transferOwnership" => {
            let args: TransferOwnershipArgs = call.args()?;
            single(d.pay_core.transfer_ownership(caller, args.new_owner)?)
        }
        "payCore_payTitan" => {
            let args: PayTitanArgs = call.args()?;
            let receipt = d.pay_titan(caller, &args.from, &args.to, args.amount)?;
            Ok((receipt.events, Some(receipt.quote)))
        }
        "titan_mint" => {
            let args: MintArgs = call.args()?;
            single(d.mint(caller, &args.to, args.amount)?)
        }
        "titan_approve" => {
            let args: ApproveArgs = call.args()?;
            single(d.approve(caller, &args.spender, args.amount))
        }
        "titan_transfer" => {
            let args: TransferArgs = call.args()?;
            single(d.transfer(caller, &args.to, args.amount)?)
        }
        other => Err(HostError::UnknownMethod(other.to_string())),
    }
}

fn positional<T: DeserializeOwned>(params: Value, shape: &str) -> HostResult<T> {
    serde_json::from_value(params)
        .map_err(|e| HostError::InvalidParams(format!("expected {shape}: {e}")))
}

fn to_value<T: Serialize>(value: &T) -> HostResult<Value> {
    serde_json::to_value(value).map_err(|e| HostError::Internal(e.to_string()))
}
