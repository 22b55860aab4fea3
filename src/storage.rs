use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::account::{Account, AccountState, SigningPolicy};
use crate::error::LedgerError;
use crate::types::{Address, ObjectId, StakeSymbol};

/// A model record: the schema data records are created against.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: ObjectId,
    pub name: String,
    pub policy: SigningPolicy,
    pub schema: Vec<u8>,
}

/// A data record. Version 0 marks a deleted record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DataInfo {
    pub id: ObjectId,
    pub model: ObjectId,
    pub version: u64,
    pub policy: SigningPolicy,
    pub payload: Vec<u8>,
}

/// What the transaction pipeline needs from the state store.
pub trait StateAccess {
    /// Loads an account, materializing a zero-valued one on first access.
    fn load_account(&self, id: Address) -> Result<Arc<Account>, LedgerError>;

    fn load_miner(&self, miner: Option<&StakeSymbol>) -> Result<Option<Arc<Account>>, LedgerError> {
        miner.map(|m| self.load_account(m.address())).transpose()
    }

    fn load_model(&self, id: &ObjectId) -> Result<Option<ModelInfo>, LedgerError>;
    fn save_model(&self, model: ModelInfo) -> Result<(), LedgerError>;

    fn load_data(&self, id: &ObjectId) -> Result<Option<DataInfo>, LedgerError>;
    fn save_data(&self, data: DataInfo) -> Result<(), LedgerError>;

    fn resolve_name(&self, name: &str) -> Result<Option<Address>, LedgerError>;
}

#[derive(Default)]
struct WorkingSet {
    accounts: BTreeMap<Address, Arc<Account>>,
    models: HashMap<ObjectId, ModelInfo>,
    data: HashMap<ObjectId, DataInfo>,
}

/// Working-set entries as they were when first touched after the checkpoint.
/// `None` marks an entry that was not in the working set yet.
#[derive(Default)]
struct Checkpoint {
    accounts: BTreeMap<Address, Option<AccountState>>,
    models: HashMap<ObjectId, Option<ModelInfo>>,
    data: HashMap<ObjectId, Option<DataInfo>>,
}

impl Checkpoint {
    /// Folds a released inner checkpoint into this one. Older records win.
    fn absorb(&mut self, inner: Checkpoint) {
        for (id, prior) in inner.accounts {
            self.accounts.entry(id).or_insert(prior);
        }
        for (id, prior) in inner.models {
            self.models.entry(id).or_insert(prior);
        }
        for (id, prior) in inner.data {
            self.data.entry(id).or_insert(prior);
        }
    }
}

/// In-memory state with a durable layer and a working set.
///
/// Reads fall through the working set to the durable layer. `checkpoint` /
/// `revert` bracket a single transaction; `commit` / `discard` end a block.
/// A checkpoint records an account when it is loaded, so handles must be
/// loaded after the checkpoint they mutate under.
/// The durable layer keeps bincode-encoded records keyed like the node's
/// block store.
#[derive(Default)]
pub struct MemoryState {
    durable: RwLock<BTreeMap<String, Vec<u8>>>,
    working: RwLock<WorkingSet>,
    checkpoints: Mutex<Vec<Checkpoint>>,
    names: RwLock<HashMap<String, Address>>,
}

fn account_key(id: &Address) -> String {
    format!("account:{}", id)
}

fn model_key(id: &ObjectId) -> String {
    format!("model:{}", id)
}

fn data_key(id: &ObjectId) -> String {
    format!("data:{}", id)
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    // Generic Helper: Put
    fn put<T: Serialize>(durable: &mut BTreeMap<String, Vec<u8>>, key: String, value: &T) -> Result<(), LedgerError> {
        let serialized = bincode::serialize(value).map_err(|e| LedgerError::Storage(e.to_string()))?;
        durable.insert(key, serialized);
        Ok(())
    }

    // Generic Helper: Get
    fn get<T: for<'a> Deserialize<'a>>(&self, key: &str) -> Result<Option<T>, LedgerError> {
        match self.durable.read().get(key) {
            Some(bytes) => bincode::deserialize(bytes)
                .map(Some)
                .map_err(|e| LedgerError::Storage(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn register_name(&self, name: &str, id: Address) {
        self.names.write().insert(name.to_string(), id);
    }

    /// Starts recording changes for a later `revert`.
    pub fn checkpoint(&self) {
        self.checkpoints.lock().push(Checkpoint::default());
    }

    /// Drops the latest checkpoint, keeping the changes made since.
    pub fn release(&self) {
        let mut checkpoints = self.checkpoints.lock();
        if let Some(inner) = checkpoints.pop() {
            if let Some(outer) = checkpoints.last_mut() {
                outer.absorb(inner);
            }
        }
    }

    /// Rolls the working set back to the latest checkpoint.
    pub fn revert(&self) {
        let Some(checkpoint) = self.checkpoints.lock().pop() else {
            return;
        };
        let mut working = self.working.write();
        for (id, prior) in checkpoint.accounts {
            match prior {
                Some(state) => {
                    if let Some(account) = working.accounts.get(&id) {
                        account.restore(state);
                    }
                }
                None => {
                    working.accounts.remove(&id);
                }
            }
        }
        for (id, prior) in checkpoint.models {
            match prior {
                Some(model) => working.models.insert(id, model),
                None => working.models.remove(&id),
            };
        }
        for (id, prior) in checkpoint.data {
            match prior {
                Some(data) => working.data.insert(id, data),
                None => working.data.remove(&id),
            };
        }
    }

    fn record_account(&self, id: Address, prior: impl FnOnce() -> Option<AccountState>) {
        if let Some(top) = self.checkpoints.lock().last_mut() {
            top.accounts.entry(id).or_insert_with(prior);
        }
    }

    /// Writes the working set through to the durable layer.
    pub fn commit(&self) -> Result<(), LedgerError> {
        let mut working = self.working.write();
        let mut durable = self.durable.write();
        for (id, account) in &working.accounts {
            Self::put(&mut durable, account_key(id), &*account.read())?;
        }
        for (id, model) in &working.models {
            Self::put(&mut durable, model_key(id), model)?;
        }
        for (id, data) in &working.data {
            Self::put(&mut durable, data_key(id), data)?;
        }
        *working = WorkingSet::default();
        self.checkpoints.lock().clear();
        Ok(())
    }

    /// Throws away every uncommitted change.
    pub fn discard(&self) {
        *self.working.write() = WorkingSet::default();
        self.checkpoints.lock().clear();
    }

    /// Committed state of an account, ignoring the working set.
    pub fn durable_account(&self, id: &Address) -> Result<Option<AccountState>, LedgerError> {
        self.get(&account_key(id))
    }
}

impl StateAccess for MemoryState {
    fn load_account(&self, id: Address) -> Result<Arc<Account>, LedgerError> {
        let cached = self.working.read().accounts.get(&id).cloned();
        if let Some(account) = cached {
            self.record_account(id, || Some(account.snapshot()));
            return Ok(account);
        }
        let state = self.get(&account_key(&id))?.unwrap_or_else(|| AccountState::new(id));
        let mut working = self.working.write();
        // another reader may have loaded it meanwhile
        let mut inserted = false;
        let account = working
            .accounts
            .entry(id)
            .or_insert_with(|| {
                inserted = true;
                Arc::new(Account::new(state))
            })
            .clone();
        drop(working);
        self.record_account(id, || if inserted { None } else { Some(account.snapshot()) });
        Ok(account)
    }

    fn load_model(&self, id: &ObjectId) -> Result<Option<ModelInfo>, LedgerError> {
        if let Some(model) = self.working.read().models.get(id) {
            return Ok(Some(model.clone()));
        }
        self.get(&model_key(id))
    }

    fn save_model(&self, model: ModelInfo) -> Result<(), LedgerError> {
        let id = model.id;
        let prior = self.working.write().models.insert(id, model);
        if let Some(top) = self.checkpoints.lock().last_mut() {
            top.models.entry(id).or_insert(prior);
        }
        Ok(())
    }

    fn load_data(&self, id: &ObjectId) -> Result<Option<DataInfo>, LedgerError> {
        if let Some(data) = self.working.read().data.get(id) {
            return Ok(Some(data.clone()));
        }
        self.get(&data_key(id))
    }

    fn save_data(&self, data: DataInfo) -> Result<(), LedgerError> {
        let id = data.id;
        let prior = self.working.write().data.insert(id, data);
        if let Some(top) = self.checkpoints.lock().last_mut() {
            top.data.entry(id).or_insert(prior);
        }
        Ok(())
    }

    fn resolve_name(&self, name: &str) -> Result<Option<Address>, LedgerError> {
        Ok(self.names.read().get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenSymbol;
    use num_bigint::BigUint;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    #[test]
    fn test_accounts_materialize_once() {
        let state = MemoryState::new();
        let a = state.load_account(addr(1)).unwrap();
        let b = state.load_account(addr(1)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.snapshot(), AccountState::new(addr(1)));
    }

    #[test]
    fn test_revert_restores_and_forgets() {
        let state = MemoryState::new();
        let native = TokenSymbol::native();
        state.load_account(addr(1)).unwrap().write().add(&native, &BigUint::from(5u8));

        state.checkpoint();
        state.load_account(addr(1)).unwrap().write().add(&native, &BigUint::from(5u8));
        state.load_account(addr(2)).unwrap().write().add(&native, &BigUint::from(1u8));
        state.revert();

        assert_eq!(state.load_account(addr(1)).unwrap().read().balance, BigUint::from(5u8));
        assert_eq!(state.load_account(addr(2)).unwrap().read().balance, BigUint::from(0u8));
    }

    #[test]
    fn test_checkpoint_records_only_touched_accounts() {
        let state = MemoryState::new();
        let native = TokenSymbol::native();
        for b in 1..=5 {
            state.load_account(addr(b)).unwrap().write().add(&native, &BigUint::from(b));
        }

        state.checkpoint();
        state.load_account(addr(3)).unwrap().write().add(&native, &BigUint::from(10u8));
        state.load_account(addr(3)).unwrap().write().add(&native, &BigUint::from(10u8));
        assert_eq!(state.checkpoints.lock().last().map(|c| c.accounts.len()), Some(1));

        state.revert();
        assert_eq!(state.load_account(addr(3)).unwrap().read().balance, BigUint::from(3u8));
        assert_eq!(state.load_account(addr(5)).unwrap().read().balance, BigUint::from(5u8));
    }

    #[test]
    fn test_released_checkpoint_folds_into_outer() {
        let state = MemoryState::new();
        let native = TokenSymbol::native();
        state.load_account(addr(1)).unwrap().write().add(&native, &BigUint::from(1u8));

        state.checkpoint();
        state.load_account(addr(1)).unwrap().write().add(&native, &BigUint::from(1u8));
        state.checkpoint();
        state.load_account(addr(2)).unwrap().write().add(&native, &BigUint::from(1u8));
        let model = ModelInfo {
            id: ObjectId([1u8; 20]),
            name: "m".to_string(),
            policy: SigningPolicy::default(),
            schema: vec![],
        };
        state.save_model(model.clone()).unwrap();
        state.release();
        assert_eq!(state.load_model(&model.id).unwrap(), Some(model.clone()));

        state.revert();
        assert_eq!(state.load_account(addr(1)).unwrap().read().balance, BigUint::from(1u8));
        assert_eq!(state.load_account(addr(2)).unwrap().read().balance, BigUint::from(0u8));
        assert_eq!(state.load_model(&model.id).unwrap(), None);
    }

    #[test]
    fn test_commit_and_discard() {
        let state = MemoryState::new();
        let native = TokenSymbol::native();
        state.load_account(addr(1)).unwrap().write().add(&native, &BigUint::from(7u8));
        state.commit().unwrap();

        let durable = state.durable_account(&addr(1)).unwrap().unwrap();
        assert_eq!(durable.balance, BigUint::from(7u8));

        state.load_account(addr(1)).unwrap().write().add(&native, &BigUint::from(1u8));
        state.discard();
        assert_eq!(state.load_account(addr(1)).unwrap().read().balance, BigUint::from(7u8));
    }

    #[test]
    fn test_records_and_names() {
        let state = MemoryState::new();
        let model = ModelInfo {
            id: ObjectId([1u8; 20]),
            name: "profile".to_string(),
            policy: SigningPolicy::new(1, vec![addr(1)]),
            schema: b"{}".to_vec(),
        };
        state.save_model(model.clone()).unwrap();
        state.commit().unwrap();
        assert_eq!(state.load_model(&model.id).unwrap(), Some(model));
        assert_eq!(state.load_data(&ObjectId([2u8; 20])).unwrap(), None);

        state.register_name("alice", addr(9));
        assert_eq!(state.resolve_name("alice").unwrap(), Some(addr(9)));
        assert_eq!(state.resolve_name("bob").unwrap(), None);
    }
}
