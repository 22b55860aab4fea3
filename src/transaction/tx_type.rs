use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction kinds. The discriminant is the `type` field on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum TxType {
    Transfer = 0,
    TransferPay = 1,
    TransferCash = 2,
    TransferMultiple = 3,
    Exchange = 4,
    UpdateAccountInfo = 5,
    AddNonceTable = 6,
    CreateToken = 7,
    DestroyToken = 8,
    CreateStake = 9,
    ResetStake = 10,
    DestroyStake = 11,
    TakeStake = 12,
    WithdrawStake = 13,
    UpdateStakeApprover = 14,
    OpenLending = 15,
    CloseLending = 16,
    Borrow = 17,
    Repay = 18,
    CreateModel = 19,
    CreateData = 20,
    UpdateDataInfo = 21,
    DeleteData = 22,
}

impl TxType {
    pub const ALL: [TxType; 23] = [
        TxType::Transfer,
        TxType::TransferPay,
        TxType::TransferCash,
        TxType::TransferMultiple,
        TxType::Exchange,
        TxType::UpdateAccountInfo,
        TxType::AddNonceTable,
        TxType::CreateToken,
        TxType::DestroyToken,
        TxType::CreateStake,
        TxType::ResetStake,
        TxType::DestroyStake,
        TxType::TakeStake,
        TxType::WithdrawStake,
        TxType::UpdateStakeApprover,
        TxType::OpenLending,
        TxType::CloseLending,
        TxType::Borrow,
        TxType::Repay,
        TxType::CreateModel,
        TxType::CreateData,
        TxType::UpdateDataInfo,
        TxType::DeleteData,
    ];

    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Kinds that change who may sign for an account or record. They are
    /// checked with the approver-aware policy.
    pub fn changes_policy(self) -> bool {
        matches!(
            self,
            TxType::UpdateAccountInfo
                | TxType::DestroyToken
                | TxType::ResetStake
                | TxType::DestroyStake
                | TxType::UpdateDataInfo
                | TxType::DeleteData
        )
    }

    /// Kinds allowed to spend the sender's pledge.
    pub fn releases_pledge(self) -> bool {
        matches!(self, TxType::DestroyToken | TxType::DestroyStake)
    }

    /// Kinds with a genesis entry point.
    pub fn has_genesis(self) -> bool {
        matches!(
            self,
            TxType::Transfer | TxType::CreateToken | TxType::CreateStake | TxType::CreateModel
        )
    }
}

impl TryFrom<u16> for TxType {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        TxType::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("unknown tx type {}", value))
    }
}

impl From<TxType> for u16 {
    fn from(value: TxType) -> Self {
        value.code()
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type{:?}", self)
    }
}

/// Set of transaction kinds stored as a bitset.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxTypes(u64);

impl TxTypes {
    pub const fn empty() -> Self {
        TxTypes(0)
    }

    pub const fn of(types: &[TxType]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < types.len() {
            bits |= 1u64 << types[i].code();
            i += 1;
        }
        TxTypes(bits)
    }

    pub fn insert(&mut self, ty: TxType) {
        self.0 |= 1u64 << ty.code();
    }

    pub fn contains(&self, ty: TxType) -> bool {
        self.0 & (1u64 << ty.code()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: TxTypes) -> TxTypes {
        TxTypes(self.0 | other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = TxType> + '_ {
        TxType::ALL.into_iter().filter(move |ty| self.contains(*ty))
    }
}

impl fmt::Debug for TxTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_table() {
        for (i, ty) in TxType::ALL.iter().enumerate() {
            assert_eq!(ty.code() as usize, i);
            assert_eq!(TxType::try_from(i as u16).unwrap(), *ty);
        }
        assert!(TxType::try_from(TxType::ALL.len() as u16).is_err());
    }

    #[test]
    fn test_tx_types_set() {
        let mut set = TxTypes::of(&[TxType::Transfer, TxType::Repay]);
        assert!(set.contains(TxType::Transfer));
        assert!(set.contains(TxType::Repay));
        assert!(!set.contains(TxType::Borrow));

        set.insert(TxType::Borrow);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![TxType::Transfer, TxType::Borrow, TxType::Repay]
        );
        assert!(TxTypes::empty().is_empty());
        assert_eq!(format!("{}", TxType::TakeStake), "TypeTakeStake");
    }
}
