use context_contract::{Contract, Exports, FieldSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Keyed field category diff (props, events, state).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<ValueChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub name: String,
    pub old: String,
    pub new: String,
}

/// Name-set category diff (hooks, components, functions, variables, imports).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportsChange {
    pub old: Exports,
    pub new: Exports,
}

/// Field-level differences between two versions of one contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDiff {
    pub props: MapDiff,
    pub events: MapDiff,
    pub state: MapDiff,
    pub hooks: SetDiff,
    pub components: SetDiff,
    pub functions: SetDiff,
    pub variables: SetDiff,
    pub imports: SetDiff,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<ExportsChange>,
}

impl MapDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    fn between(old: &BTreeMap<String, FieldSpec>, new: &BTreeMap<String, FieldSpec>) -> Self {
        let mut diff = Self::default();
        for (name, spec) in new {
            match old.get(name) {
                None => diff.added.push(name.clone()),
                Some(prev) => {
                    let (before, after) = (prev.normalized(), spec.normalized());
                    if before != after {
                        diff.changed.push(ValueChange {
                            name: name.clone(),
                            old: before,
                            new: after,
                        });
                    }
                }
            }
        }
        diff.removed = old
            .keys()
            .filter(|name| !new.contains_key(*name))
            .cloned()
            .collect();
        diff
    }
}

impl SetDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    fn between(old: &BTreeSet<String>, new: &BTreeSet<String>) -> Self {
        Self {
            added: new.difference(old).cloned().collect(),
            removed: old.difference(new).cloned().collect(),
        }
    }
}

impl FieldDiff {
    #[must_use]
    pub fn between(old: &Contract, new: &Contract) -> Self {
        let (ol, nl) = (&old.logic_signature, &new.logic_signature);
        let (ov, nv) = (&old.version, &new.version);
        Self {
            props: MapDiff::between(&ol.props, &nl.props),
            events: MapDiff::between(&ol.events, &nl.events),
            state: MapDiff::between(&ol.state, &nl.state),
            hooks: SetDiff::between(&ov.hooks, &nv.hooks),
            components: SetDiff::between(&ov.components, &nv.components),
            functions: SetDiff::between(&ov.functions, &nv.functions),
            variables: SetDiff::between(&ov.variables, &nv.variables),
            imports: SetDiff::between(&ov.imports, &nv.imports),
            exports: (old.exports != new.exports).then(|| ExportsChange {
                old: old.exports.clone(),
                new: new.exports.clone(),
            }),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
            && self.events.is_empty()
            && self.state.is_empty()
            && self.hooks.is_empty()
            && self.components.is_empty()
            && self.functions.is_empty()
            && self.variables.is_empty()
            && self.imports.is_empty()
            && self.exports.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_contract::{EntryId, LogicSignature, ModuleSummary};
    use pretty_assertions::assert_eq;

    fn with_state(state: &[(&str, &str, bool)]) -> Contract {
        let mut logic = LogicSignature::default();
        for (name, ty, optional) in state {
            logic
                .state
                .insert((*name).to_string(), FieldSpec::parse(ty, *optional));
        }
        let summary = ModuleSummary {
            logic,
            ..ModuleSummary::default()
        };
        Contract::build(EntryId::new("Form.tsx"), b"", summary, None)
    }

    #[test]
    fn optional_flag_counts_as_changed_value() {
        let old = with_state(&[("open", "boolean", false), ("items", "string[]", false)]);
        let new = with_state(&[("open", "boolean", true), ("count", "number", false)]);

        let diff = FieldDiff::between(&old, &new);

        assert_eq!(diff.state.added, vec!["count".to_string()]);
        assert_eq!(diff.state.removed, vec!["items".to_string()]);
        assert_eq!(
            diff.state.changed,
            vec![ValueChange {
                name: "open".to_string(),
                old: "boolean".to_string(),
                new: "boolean?".to_string(),
            }]
        );
        assert!(diff.props.is_empty());
    }

    #[test]
    fn identical_contracts_have_empty_diff() {
        let a = with_state(&[("open", "boolean", false)]);
        assert!(FieldDiff::between(&a, &a.clone()).is_empty());
    }
}
