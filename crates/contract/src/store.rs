use crate::id::EntryId;
use crate::model::Contract;
use std::collections::BTreeMap;

/// Keyed collection of contracts, one per module.
///
/// Contracts are replaced wholesale on re-extraction, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct ContractStore {
    contracts: BTreeMap<EntryId, Contract>,
}

impl ContractStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a contract, returning the previous one.
    pub fn insert(&mut self, contract: Contract) -> Option<Contract> {
        self.contracts.insert(contract.entry_id.clone(), contract)
    }

    pub fn remove(&mut self, id: &EntryId) -> Option<Contract> {
        self.contracts.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &EntryId) -> Option<&Contract> {
        self.contracts.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &EntryId) -> bool {
        self.contracts.contains_key(id)
    }

    /// Look up the stored id matching `key` (already lower-cased).
    #[must_use]
    pub fn resolve_key(&self, key: &str) -> Option<&EntryId> {
        let lookup = EntryId::new(key);
        self.contracts.get_key_value(&lookup).map(|(id, _)| id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntryId> {
        self.contracts.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntryId, &Contract)> {
        self.contracts.iter()
    }
}

impl FromIterator<Contract> for ContractStore {
    fn from_iter<I: IntoIterator<Item = Contract>>(iter: I) -> Self {
        let mut store = Self::new();
        for contract in iter {
            store.insert(contract);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModuleSummary;

    fn contract(id: &str, body: &str) -> Contract {
        Contract::build(EntryId::new(id), body.as_bytes(), ModuleSummary::default(), None)
    }

    #[test]
    fn insert_replaces_by_case_insensitive_id() {
        let mut store = ContractStore::new();
        assert!(store.insert(contract("src/App.tsx", "a")).is_none());
        let previous = store.insert(contract("src/app.tsx", "b"));
        assert!(previous.is_some());
        assert_eq!(store.len(), 1);
        assert!(store.resolve_key("SRC/APP.TSX").is_some());
    }

    #[test]
    fn remove_drops_contract() {
        let mut store: ContractStore = vec![contract("a.ts", "a"), contract("b.ts", "b")]
            .into_iter()
            .collect();
        store.remove(&EntryId::new("a.ts"));
        assert_eq!(store.ids().map(EntryId::as_str).collect::<Vec<_>>(), vec!["b.ts"]);
    }
}
