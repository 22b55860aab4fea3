//! Nonce table: pre-authorized, unordered nonces grouped by expiry

use num_bigint::BigUint;
use std::collections::BTreeSet;

use super::types::AccountState;
use crate::error::LedgerError;
use crate::types::TokenSymbol;

pub const MAX_NONCE_GROUPS: usize = 1024;
pub const MAX_NONCES_PER_BATCH: usize = 1024;

impl AccountState {
    pub fn check_add_nonce_table(&self, expire: u64, nonces: &[u64], now: u64) -> Result<(), LedgerError> {
        let existing = self.nonce_table.get(&expire);
        let mut seen: BTreeSet<u64> = existing.map(|g| g.iter().copied().collect()).unwrap_or_default();
        for nonce in nonces {
            if !seen.insert(*nonce) {
                return Err(LedgerError::NonceExists {
                    account: self.id,
                    nonce: *nonce,
                    expire,
                });
            }
        }
        if existing.is_none() {
            // expired groups are pruned by this insert
            let live = self.nonce_table.keys().filter(|e| **e > now).count();
            if live + 1 > MAX_NONCE_GROUPS {
                return Err(LedgerError::NonceTableFull {
                    account: self.id,
                    max: MAX_NONCE_GROUPS,
                });
            }
        }
        Ok(())
    }

    pub fn add_nonce_table(&mut self, expire: u64, nonces: &[u64], now: u64) -> Result<(), LedgerError> {
        self.check_add_nonce_table(expire, nonces, now)?;
        let group = self.nonce_table.entry(expire).or_default();
        group.extend_from_slice(nonces);
        group.sort_unstable();
        self.nonce_table.retain(|e, _| *e > now);
        Ok(())
    }

    pub fn check_consume_nonce(&self, expire: u64, nonce: u64) -> Result<(), LedgerError> {
        match self.nonce_table.get(&expire) {
            Some(group) if group.binary_search(&nonce).is_ok() => Ok(()),
            _ => Err(LedgerError::NonceNotExists {
                account: self.id,
                nonce,
                expire,
            }),
        }
    }

    pub fn consume_nonce(&mut self, expire: u64, nonce: u64) -> Result<(), LedgerError> {
        self.check_consume_nonce(expire, nonce)?;
        if let Some(group) = self.nonce_table.get_mut(&expire) {
            if let Ok(i) = group.binary_search(&nonce) {
                group.remove(i);
            }
            if group.is_empty() {
                self.nonce_table.remove(&expire);
            }
        }
        Ok(())
    }

    /// Debit authorized by a nonce from the table instead of the sequential
    /// nonce; used when the payer is not the transaction sender.
    pub fn check_sub_by_nonce_table(
        &self,
        token: &TokenSymbol,
        expire: u64,
        nonce: u64,
        amount: &BigUint,
    ) -> Result<(), LedgerError> {
        self.check_consume_nonce(expire, nonce)?;
        self.check_balance(token, amount, true)
    }

    pub fn sub_by_nonce_table(
        &mut self,
        token: &TokenSymbol,
        expire: u64,
        nonce: u64,
        amount: &BigUint,
    ) -> Result<(), LedgerError> {
        self.check_sub_by_nonce_table(token, expire, nonce, amount)?;
        self.consume_nonce(expire, nonce)?;
        self.debit(token, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    const NOW: u64 = 1_000;

    fn account() -> AccountState {
        AccountState::new(Address([5u8; 20]))
    }

    #[test]
    fn test_merge_and_duplicates() {
        let mut state = account();
        let expire = NOW + 1;
        state.add_nonce_table(expire, &[1, 3, 7, 5], NOW).unwrap();
        assert_eq!(state.nonce_table[&expire], vec![1, 3, 5, 7]);

        let err = state.add_nonce_table(expire, &[2, 4, 1], NOW).unwrap_err();
        assert_eq!(err.to_string(), format!("{} nonce 1 exists at {}", state.id, expire));
        assert_eq!(state.nonce_table[&expire], vec![1, 3, 5, 7]);

        state.add_nonce_table(expire, &[2, 4, 6], NOW).unwrap();
        assert_eq!(state.nonce_table[&expire], vec![1, 2, 3, 4, 5, 6, 7]);

        // duplicates inside one batch
        assert!(state.add_nonce_table(expire + 1, &[9, 9], NOW).is_err());
    }

    #[test]
    fn test_consume_is_exclusive() {
        let mut state = account();
        state.add_nonce_table(NOW + 10, &[1, 2], NOW).unwrap();

        state.consume_nonce(NOW + 10, 1).unwrap();
        let err = state.consume_nonce(NOW + 10, 1).unwrap_err();
        assert_eq!(err.to_string(), format!("{} nonce 1 not exists at {}", state.id, NOW + 10));

        state.consume_nonce(NOW + 10, 2).unwrap();
        assert!(state.nonce_table.is_empty());
        assert!(state.check_consume_nonce(NOW + 10, 2).is_err());
    }

    #[test]
    fn test_expired_groups_pruned_on_insert() {
        let mut state = account();
        state.add_nonce_table(NOW + 5, &[1], NOW).unwrap();
        state.add_nonce_table(NOW + 50, &[1], NOW).unwrap();

        state.add_nonce_table(NOW + 100, &[1], NOW + 5).unwrap();
        assert_eq!(state.nonce_table.keys().copied().collect::<Vec<_>>(), vec![NOW + 50, NOW + 100]);
    }

    #[test]
    fn test_group_cap() {
        let mut state = account();
        for i in 0..MAX_NONCE_GROUPS as u64 {
            state.nonce_table.insert(NOW + 1 + i, vec![0]);
        }
        let err = state.add_nonce_table(NOW + 5_000, &[1], NOW).unwrap_err();
        assert!(matches!(err, LedgerError::NonceTableFull { .. }));
        // an existing group can still grow
        assert!(state.add_nonce_table(NOW + 1, &[1], NOW).is_ok());
        // expired groups do not count
        assert!(state.add_nonce_table(NOW + 5_000, &[1], NOW + 10).is_ok());
    }

    #[test]
    fn test_sub_by_nonce_table() {
        let mut state = account();
        state.add(&TokenSymbol::native(), &BigUint::from(100u32));
        state.add_nonce_table(NOW + 10, &[4], NOW).unwrap();

        assert!(state
            .sub_by_nonce_table(&TokenSymbol::native(), NOW + 10, 4, &BigUint::from(101u32))
            .is_err());
        assert_eq!(state.nonce_table[&(NOW + 10)], vec![4]);

        state
            .sub_by_nonce_table(&TokenSymbol::native(), NOW + 10, 4, &BigUint::from(60u32))
            .unwrap();
        assert_eq!(state.balance, BigUint::from(40u32));
        assert!(state.nonce_table.is_empty());
        assert_eq!(state.nonce, 0);
    }
}
