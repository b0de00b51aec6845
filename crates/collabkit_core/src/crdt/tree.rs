//! Replicated tree handle.
//!
//! A [`ReplicatedTree`] binds one root container of a yrs [`Doc`] to the patch
//! engine. Every patch reads the current value, plans a delta, and applies it
//! inside a single transaction tagged with the caller's origin, so observers
//! can tell their own echoes from peer changes. Equal states never open a
//! write transaction at all.
//!
//! Observers run while the transaction commits and the document is still
//! locked. A patch issued from an observer through the same handle (or any
//! clone of it) is queued and runs as its own transaction once the current
//! one has committed, or is rejected, depending on
//! [`EngineConfig::reentrancy`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
    ArrayRef, DeepObservable, Doc, MapRef, Origin, ReadTxn, StateVector, Subscription, Transact,
    TransactionMut, Update,
};

use super::node::{Container, ReplicatedNode};
use crate::config::{EngineConfig, ReentrancyPolicy};
use crate::coordinator::{PatchOutcome, plan, verify};
use crate::delta::Delta;
use crate::error::{CollabError, Result};
use crate::patch::{MutableTree, apply_delta};
use crate::path::Path;
use crate::plain::patch_plain;
use crate::value::{NodeKind, Template, Value, normalize_container};

enum Request {
    State(Value),
    Delta(Delta),
    Update(Vec<u8>),
}

struct PendingPatch {
    request: Request,
    origin: Option<Origin>,
}

#[derive(Default)]
struct TransactionState {
    active: bool,
    pending: VecDeque<PendingPatch>,
}

/// Handle to a map or array root of a yrs document, patched by value.
///
/// Clones share the document and the in-flight bookkeeping.
#[derive(Clone)]
pub struct ReplicatedTree {
    doc: Doc,
    root: Container,
    config: EngineConfig,
    state: Arc<Mutex<TransactionState>>,
}

impl std::fmt::Debug for ReplicatedTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedTree")
            .field("kind", &self.root.kind())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReplicatedTree {
    /// Tree rooted at the top-level map `name` of `doc`.
    pub fn map(doc: &Doc, name: &str) -> Self {
        let root = doc.get_or_insert_map(name);
        Self::from_map(doc, root)
    }

    /// Tree rooted at the top-level array `name` of `doc`.
    pub fn array(doc: &Doc, name: &str) -> Self {
        let root = doc.get_or_insert_array(name);
        Self::from_array(doc, root)
    }

    /// Tree rooted at an existing shared map of `doc`.
    pub fn from_map(doc: &Doc, root: MapRef) -> Self {
        Self::new(doc, Container::Map(root))
    }

    /// Tree rooted at an existing shared array of `doc`.
    pub fn from_array(doc: &Doc, root: ArrayRef) -> Self {
        Self::new(doc, Container::Array(root))
    }

    fn new(doc: &Doc, root: Container) -> Self {
        Self {
            doc: doc.clone(),
            root,
            config: EngineConfig::default(),
            state: Arc::new(Mutex::new(TransactionState::default())),
        }
    }

    /// Replace the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The underlying document.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current value of the tree.
    ///
    /// Opens a read transaction, so it cannot be used from an observer; use
    /// [`ReplicatedTree::value_in`] with the observer's transaction instead.
    pub fn to_value(&self) -> Result<Value> {
        let txn = self
            .doc
            .try_transact()
            .map_err(|e| CollabError::Replication(e.to_string()))?;
        self.value_in(&txn)
    }

    /// Value of the tree as seen by `txn`.
    pub fn value_in<T: ReadTxn>(&self, txn: &T) -> Result<Value> {
        self.root.read(txn, &mut Path::root())
    }

    /// Whether the root container has no entries.
    pub fn is_empty(&self) -> Result<bool> {
        let txn = self
            .doc
            .try_transact()
            .map_err(|e| CollabError::Replication(e.to_string()))?;
        Ok(self.root.len(&txn) == 0)
    }

    /// Make the tree deep-equal to `new_state`.
    ///
    /// `new_state` is normalized and must be a container of the root's kind.
    /// Returns [`PatchOutcome::Unchanged`] without touching the document when
    /// the tree already holds an equal value.
    pub fn patch(
        &self,
        new_state: impl Into<Template>,
        origin: Option<Origin>,
    ) -> Result<PatchOutcome> {
        let new_state = normalize_container(new_state)?;
        let kind = NodeKind::of(&new_state);
        if kind != self.root.kind() {
            return Err(CollabError::ShapeMismatch {
                path: Path::root().to_string(),
                old: self.root.kind(),
                new: kind,
            });
        }
        self.submit(Request::State(new_state), origin)
    }

    /// Apply a delta computed against the tree's current value.
    pub fn apply_delta(&self, delta: Delta, origin: Option<Origin>) -> Result<PatchOutcome> {
        self.submit(Request::Delta(delta), origin)
    }

    /// Apply a binary (v1) update received from a peer.
    ///
    /// Observers fired by the update may patch through this handle; those
    /// patches are handled like any other nested patch.
    pub fn apply_update(&self, update: &[u8], origin: Option<Origin>) -> Result<PatchOutcome> {
        self.submit(Request::Update(update.to_vec()), origin)
    }

    /// Encode the document's state vector (v1).
    pub fn encode_state_vector(&self) -> Result<Vec<u8>> {
        let txn = self
            .doc
            .try_transact()
            .map_err(|e| CollabError::Replication(e.to_string()))?;
        Ok(txn.state_vector().encode_v1())
    }

    /// Encode the whole document as one update (v1).
    pub fn encode_state_as_update(&self) -> Result<Vec<u8>> {
        let txn = self
            .doc
            .try_transact()
            .map_err(|e| CollabError::Replication(e.to_string()))?;
        Ok(txn.encode_state_as_update_v1(&StateVector::default()))
    }

    /// Encode what a peer with `state_vector` is missing (v1).
    pub fn encode_diff(&self, state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(state_vector)
            .map_err(|e| CollabError::Replication(format!("invalid state vector: {e}")))?;
        let txn = self
            .doc
            .try_transact()
            .map_err(|e| CollabError::Replication(e.to_string()))?;
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Call `callback` after every transaction that changes the tree, with the
    /// transaction's origin.
    pub fn observe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TransactionMut<'_>, Option<&Origin>) + Send + Sync + 'static,
    {
        let listener = move |txn: &TransactionMut<'_>, _events: &yrs::types::Events| {
            callback(txn, txn.origin());
        };
        match &self.root {
            Container::Map(map) => map.observe_deep(listener),
            Container::Array(array) => array.observe_deep(listener),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TransactionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn submit(&self, request: Request, origin: Option<Origin>) -> Result<PatchOutcome> {
        let origin = origin.or_else(|| self.config.default_origin.as_deref().map(Origin::from));

        {
            let mut state = self.lock();
            if state.active {
                return match self.config.reentrancy {
                    ReentrancyPolicy::Reject => Err(CollabError::ReentrantPatch),
                    ReentrancyPolicy::Defer => {
                        let limit = self.config.max_deferred_patches;
                        if state.pending.len() >= limit {
                            return Err(CollabError::DeferredQueueFull(limit));
                        }
                        state.pending.push_back(PendingPatch { request, origin });
                        log::debug!(
                            "deferred nested patch ({} queued)",
                            state.pending.len()
                        );
                        Ok(PatchOutcome::Deferred)
                    }
                };
            }
            state.active = true;
        }

        let mut in_flight = InFlight {
            tree: self,
            released: false,
        };
        let outcome = self.run(request, origin)?;
        // The outer patch has committed; a failing deferred patch is logged
        // and does not change what the outer caller is told.
        while let Some(next) = in_flight.next_pending() {
            if let Err(e) = self.run(next.request, next.origin) {
                log::warn!("deferred patch failed: {e}");
            }
        }
        Ok(outcome)
    }

    fn run(&self, request: Request, origin: Option<Origin>) -> Result<PatchOutcome> {
        match request {
            Request::State(new) => {
                let old = self.to_value()?;
                match plan(&old, &new)? {
                    Some(delta) => self.commit(&old, &new, delta, origin),
                    None => {
                        log::debug!("replicated patch skipped, tree already matches");
                        Ok(PatchOutcome::Unchanged)
                    }
                }
            }
            Request::Delta(delta) => {
                if delta.is_empty() {
                    return Ok(PatchOutcome::Unchanged);
                }
                let old = self.to_value()?;
                let mut new = old.clone();
                patch_plain(&mut new, delta.clone())?;
                self.commit(&old, &new, delta, origin)
            }
            Request::Update(bytes) => {
                let update = Update::decode_v1(&bytes)
                    .map_err(|e| CollabError::Replication(format!("invalid update: {e}")))?;
                let mut txn = self.write_txn(origin)?;
                txn.apply_update(update)
                    .map_err(|e| CollabError::Replication(format!("failed to apply update: {e}")))?;
                Ok(PatchOutcome::Applied { operations: 0 })
            }
        }
    }

    fn commit(
        &self,
        old: &Value,
        new: &Value,
        delta: Delta,
        origin: Option<Origin>,
    ) -> Result<PatchOutcome> {
        let operations = delta.operation_count();
        let mut txn = self.write_txn(origin)?;
        let mut node = ReplicatedNode::new(&mut txn, self.root.clone());
        apply_delta(&mut node, delta)?;
        if self.config.verify_patches {
            let actual = node.to_value()?;
            verify(&actual, old, new)?;
        }
        drop(node);
        // Observers fire here.
        drop(txn);
        log::debug!("committed replicated patch with {} operations", operations);
        Ok(PatchOutcome::Applied { operations })
    }

    fn write_txn(&self, origin: Option<Origin>) -> Result<TransactionMut<'_>> {
        let txn = match origin {
            Some(origin) => self.doc.try_transact_mut_with(origin),
            None => self.doc.try_transact_mut(),
        };
        txn.map_err(|e| {
            log::warn!("document busy, cannot open a write transaction: {e}");
            CollabError::ReentrantPatch
        })
    }
}

/// Marks the tree as patching until dropped.
struct InFlight<'a> {
    tree: &'a ReplicatedTree,
    released: bool,
}

impl InFlight<'_> {
    /// Pop the next deferred patch, or clear the in-flight flag when the
    /// queue is empty. Both happen under one lock so no request can slip in
    /// between.
    fn next_pending(&mut self) -> Option<PendingPatch> {
        let mut state = self.tree.lock();
        let next = state.pending.pop_front();
        if next.is_none() {
            state.active = false;
            self.released = true;
        }
        next
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = self.tree.lock();
        if !state.pending.is_empty() {
            log::warn!(
                "discarding {} deferred patches after a failed patch",
                state.pending.len()
            );
            state.pending.clear();
        }
        state.active = false;
    }
}
