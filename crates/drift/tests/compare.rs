//! Drift comparisons over packed bundles

use context_contract::{
    Contract, ContractStore, EntryId, Exports, FieldSpec, LogicSignature, ModuleSummary,
    VersionFingerprint,
};
use context_drift::{compare, Verdict};
use context_graph::{Bundle, BundlePacker, GraphBuilder, PackOptions};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

struct Module<'a> {
    id: &'a str,
    imports: &'a [&'a str],
    props: &'a [(&'a str, &'a str)],
    source: &'a str,
}

fn module<'a>(id: &'a str, imports: &'a [&'a str]) -> Module<'a> {
    Module {
        id,
        imports,
        props: &[],
        source: id,
    }
}

fn contract(m: &Module<'_>) -> Contract {
    let mut logic = LogicSignature::default();
    for (name, ty) in m.props {
        logic
            .props
            .insert((*name).to_string(), FieldSpec::parse(ty, false));
    }
    let summary = ModuleSummary {
        exports: Exports::Default,
        version: VersionFingerprint {
            imports: m.imports.iter().map(|s| (*s).to_string()).collect(),
            ..VersionFingerprint::default()
        },
        logic,
        ..ModuleSummary::default()
    };
    Contract::build(EntryId::new(m.id), m.source.as_bytes(), summary, None)
}

fn snapshot(modules: &[Module<'_>]) -> Vec<Bundle> {
    let store: ContractStore = modules.iter().map(contract).collect();
    let graph = GraphBuilder::default().build(&store);
    let roots = graph.entry_points();
    let (bundles, _) = BundlePacker::new(&graph, &store).pack_all(roots.iter(), &PackOptions::default());
    bundles
}

#[test]
fn test_self_compare_passes() {
    let bundles = snapshot(&[
        module("App.tsx", &["./Card"]),
        module("Card.tsx", &[]),
    ]);

    let report = compare(&bundles, &bundles);

    assert_eq!(report.verdict, Verdict::Pass);
    assert!(report.added.is_empty());
    assert!(report.removed.is_empty());
    assert!(report.changed.is_empty());
    assert!(report.bundles.is_empty());
    assert_eq!(report.verdict.exit_code(), 0);
}

#[test]
fn test_added_prop_is_drift() {
    let old = snapshot(&[Module {
        props: &[("a", "string")],
        ..module("Button.tsx", &[])
    }]);
    let new = snapshot(&[Module {
        props: &[("a", "string"), ("b", "number")],
        ..module("Button.tsx", &[])
    }]);

    let report = compare(&old, &new);

    assert_eq!(report.verdict, Verdict::Drift);
    assert_eq!(report.verdict.exit_code(), 1);
    assert_eq!(report.changed.len(), 1);
    let fields = report.changed[0].fields.as_ref().unwrap();
    assert_eq!(fields.props.added, vec!["b".to_string()]);
    assert!(fields.props.removed.is_empty());
    assert_eq!(report.bundles.len(), 1);
}

#[test]
fn test_cosmetic_edit_reports_file_hash_only() {
    let old = snapshot(&[Module {
        source: "export default 1",
        ..module("Logo.tsx", &[])
    }]);
    let new = snapshot(&[Module {
        source: "export default 1 // tidy",
        ..module("Logo.tsx", &[])
    }]);

    let report = compare(&old, &new);

    assert_eq!(report.changed.len(), 1);
    assert!(!report.changed[0].is_semantic());
    assert!(report.changed[0].fields.is_none());
    // bundle hashes cover semantic hashes only
    assert!(report.bundles.is_empty());
    assert_eq!(report.verdict, Verdict::Drift);
}

#[test]
fn test_added_and_removed_modules() {
    let old = snapshot(&[module("App.tsx", &["./Old"]), module("Old.tsx", &[])]);
    let new = snapshot(&[module("App.tsx", &["./New"]), module("New.tsx", &[])]);

    let report = compare(&old, &new);

    assert_eq!(report.added, vec![EntryId::new("New.tsx")]);
    assert_eq!(report.removed, vec![EntryId::new("Old.tsx")]);
    let changed: Vec<_> = report.changed.iter().map(|c| c.entry_id.as_str()).collect();
    assert_eq!(changed, vec!["App.tsx"]);
    let imports = &report.changed[0].fields.as_ref().unwrap().imports;
    assert_eq!(imports.added, vec!["./New".to_string()]);
    assert_eq!(imports.removed, vec!["./Old".to_string()]);
}

#[test]
fn test_bundle_only_on_one_side_is_recorded() {
    let old = snapshot(&[module("A.tsx", &[])]);
    let new = snapshot(&[module("A.tsx", &[]), module("B.tsx", &[])]);

    let report = compare(&old, &new);
    let bundle_ids: BTreeSet<_> = report.bundles.iter().map(|b| b.entry_id.clone()).collect();

    assert_eq!(bundle_ids, BTreeSet::from([EntryId::new("B.tsx")]));
    assert!(report.bundles[0].old_hash.is_none());
}

#[test]
fn test_input_order_does_not_matter() {
    let old = snapshot(&[module("A.tsx", &["./B"]), module("B.tsx", &[]), module("C.tsx", &[])]);
    let new = snapshot(&[Module {
        props: &[("x", "number")],
        ..module("B.tsx", &[])
    }, module("A.tsx", &["./B"]), module("D.tsx", &[])]);

    let forward = compare(&old, &new);
    let mut old_rev = old.clone();
    old_rev.reverse();
    let mut new_rev = new.clone();
    new_rev.reverse();

    assert_eq!(forward, compare(&old_rev, &new_rev));
}

#[test]
fn test_summary_counts() {
    let old = snapshot(&[module("A.tsx", &[])]);
    let new = snapshot(&[module("B.tsx", &[])]);

    let summary = compare(&old, &new).summary();
    let json = serde_json::to_value(summary).unwrap();

    assert_eq!(
        json,
        serde_json::json!({
            "added": 1,
            "removed": 1,
            "changed": 0,
            "bundlesChanged": 2,
            "verdict": "DRIFT",
        })
    );
}
