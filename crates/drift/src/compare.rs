use crate::fields::FieldDiff;
use context_contract::{Contract, Digest, EntryId};
use context_graph::Bundle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Drift,
}

impl Verdict {
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Pass => 0,
            Self::Drift => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Drift => "DRIFT",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contract present on both sides whose hashes differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractChange {
    pub entry_id: EntryId,
    pub old_file_hash: Digest,
    pub new_file_hash: Digest,
    pub old_semantic_hash: Digest,
    pub new_semantic_hash: Digest,
    /// Present only when the semantic hash changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldDiff>,
}

impl ContractChange {
    #[must_use]
    pub fn is_semantic(&self) -> bool {
        self.old_semantic_hash != self.new_semantic_hash
    }
}

/// A bundle whose hash differs, or that exists on one side only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleChange {
    pub entry_id: EntryId,
    pub old_hash: Option<Digest>,
    pub new_hash: Option<Digest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub verdict: Verdict,
    pub added: Vec<EntryId>,
    pub removed: Vec<EntryId>,
    pub changed: Vec<ContractChange>,
    pub bundles: Vec<BundleChange>,
}

/// Counts-only view for logs and `--json` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSummary {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
    pub bundles_changed: usize,
    pub verdict: Verdict,
}

impl DriftReport {
    #[must_use]
    pub fn summary(&self) -> DriftSummary {
        DriftSummary {
            added: self.added.len(),
            removed: self.removed.len(),
            changed: self.changed.len(),
            bundles_changed: self.bundles.len(),
            verdict: self.verdict,
        }
    }

    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Compare two bundle collections. Pure; the order of either input does not
/// matter.
#[must_use]
pub fn compare(old: &[Bundle], new: &[Bundle]) -> DriftReport {
    let old_contracts = index_contracts(old);
    let new_contracts = index_contracts(new);

    let added: Vec<EntryId> = new_contracts
        .keys()
        .filter(|id| !old_contracts.contains_key(*id))
        .map(|id| (*id).clone())
        .collect();
    let removed: Vec<EntryId> = old_contracts
        .keys()
        .filter(|id| !new_contracts.contains_key(*id))
        .map(|id| (*id).clone())
        .collect();

    let mut changed = Vec::new();
    for (id, before) in &old_contracts {
        let Some(after) = new_contracts.get(id) else {
            continue;
        };
        if before.file_hash == after.file_hash && before.semantic_hash == after.semantic_hash {
            continue;
        }
        let fields = (before.semantic_hash != after.semantic_hash)
            .then(|| FieldDiff::between(before, after));
        changed.push(ContractChange {
            entry_id: after.entry_id.clone(),
            old_file_hash: before.file_hash.clone(),
            new_file_hash: after.file_hash.clone(),
            old_semantic_hash: before.semantic_hash.clone(),
            new_semantic_hash: after.semantic_hash.clone(),
            fields,
        });
    }

    let bundles = diff_bundles(old, new);

    let verdict = if added.is_empty() && removed.is_empty() && changed.is_empty() && bundles.is_empty()
    {
        Verdict::Pass
    } else {
        Verdict::Drift
    };

    log::debug!(
        "Drift compare: {} added, {} removed, {} changed, {} bundles changed",
        added.len(),
        removed.len(),
        changed.len(),
        bundles.len()
    );

    DriftReport {
        verdict,
        added,
        removed,
        changed,
        bundles,
    }
}

/// Contracts by id across all bundles. A module shared by several bundles
/// normally carries one contract; if copies disagree the smallest file hash
/// wins so the result never depends on input order.
fn index_contracts(bundles: &[Bundle]) -> BTreeMap<&EntryId, &Contract> {
    let mut out: BTreeMap<&EntryId, &Contract> = BTreeMap::new();
    for contract in bundles.iter().flat_map(Bundle::contracts) {
        out.entry(&contract.entry_id)
            .and_modify(|kept| {
                if contract.file_hash.as_str() < kept.file_hash.as_str() {
                    *kept = contract;
                }
            })
            .or_insert(contract);
    }
    out
}

fn diff_bundles(old: &[Bundle], new: &[Bundle]) -> Vec<BundleChange> {
    let old_hashes: BTreeMap<&EntryId, &Digest> =
        old.iter().map(|b| (&b.entry_id, &b.bundle_hash)).collect();
    let new_hashes: BTreeMap<&EntryId, &Digest> =
        new.iter().map(|b| (&b.entry_id, &b.bundle_hash)).collect();

    let ids: BTreeSet<&EntryId> = old_hashes.keys().chain(new_hashes.keys()).copied().collect();
    ids.into_iter()
        .filter_map(|id| {
            let before = old_hashes.get(id).copied();
            let after = new_hashes.get(id).copied();
            (before != after).then(|| BundleChange {
                entry_id: id.clone(),
                old_hash: before.cloned(),
                new_hash: after.cloned(),
            })
        })
        .collect()
}
