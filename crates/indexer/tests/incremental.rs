//! Incremental rebuilds against a small component tree on disk

use context_contract::EntryId;
use context_extract::ScriptExtractor;
use context_indexer::{ChangeKind, ContextConfig, FileChange, IncrementalCache, Project};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const APP: &str = "import { Mid } from './Mid';\n\nexport default function App() {\n  return <Mid />;\n}\n";
const MID: &str = "import { Leaf } from './Leaf';\n\nexport function Mid() {\n  return <Leaf label=\"x\" />;\n}\n";
const LEAF: &str = "interface LeafProps {\n  label: string;\n}\n\nexport function Leaf({ label }: LeafProps) {\n  return <span>{label}</span>;\n}\n";

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// App -> Mid -> Leaf, packed at depth 1.
fn setup() -> (TempDir, Project) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/App.tsx", APP);
    write(dir.path(), "src/Mid.tsx", MID);
    write(dir.path(), "src/Leaf.tsx", LEAF);
    let config = ContextConfig {
        depth: 1,
        ..ContextConfig::default()
    };
    let project = Project::new(dir.path(), config, Arc::new(ScriptExtractor::default())).unwrap();
    (dir, project)
}

fn bundle_bytes(cache: &IncrementalCache, root: &str) -> Vec<u8> {
    serde_json::to_vec(cache.bundle(&EntryId::new(root)).unwrap()).unwrap()
}

fn modified(project: &Project, rel: &str) -> FileChange {
    FileChange::new(project.root().join(rel), ChangeKind::Modified)
}

#[test]
fn test_full_build_packs_entry_points() {
    let (_dir, project) = setup();

    let (cache, report) = IncrementalCache::build(&project);

    assert_eq!(report.contracts, 3);
    assert_eq!(report.bundles, 1);
    assert!(report.failures.is_empty());
    let app = cache.bundle(&EntryId::new("src/App.tsx")).unwrap();
    let nodes: Vec<_> = app.node_ids().map(EntryId::as_str).collect();
    assert_eq!(nodes, vec!["src/App.tsx", "src/Mid.tsx"]);
}

#[test]
fn test_change_beyond_depth_keeps_bundle() {
    let (_dir, project) = setup();
    let (mut cache, _) = IncrementalCache::build(&project);
    let before = bundle_bytes(&cache, "src/App.tsx");

    write(
        project.root(),
        "src/Leaf.tsx",
        &LEAF.replace("label: string;", "label: string;\n  size: number;"),
    );
    let report = cache
        .apply_changes(&project, &[modified(&project, "src/Leaf.tsx")])
        .unwrap();

    assert_eq!(report.modified, vec![EntryId::new("src/Leaf.tsx")]);
    assert!(report.repacked.is_empty());
    assert!(report.touched_folders.is_empty());
    assert_eq!(bundle_bytes(&cache, "src/App.tsx"), before);
}

#[test]
fn test_change_within_depth_repacks_bundle() {
    let (_dir, project) = setup();
    let (mut cache, _) = IncrementalCache::build(&project);
    let before = bundle_bytes(&cache, "src/App.tsx");

    write(
        project.root(),
        "src/Mid.tsx",
        &MID.replace("export function Mid()", "export function Mid({ tone }: MidProps)")
            .replace("import { Leaf }", "interface MidProps { tone: string }\nimport { Leaf }"),
    );
    let report = cache
        .apply_changes(&project, &[modified(&project, "src/Mid.tsx")])
        .unwrap();

    assert_eq!(report.repacked, vec![EntryId::new("src/App.tsx")]);
    assert_eq!(report.touched_folders.into_iter().collect::<Vec<_>>(), vec!["src".to_string()]);
    assert_ne!(bundle_bytes(&cache, "src/App.tsx"), before);
}

#[test]
fn test_identical_bytes_are_skipped() {
    let (_dir, project) = setup();
    let (mut cache, _) = IncrementalCache::build(&project);

    let report = cache
        .apply_changes(&project, &[modified(&project, "src/Mid.tsx")])
        .unwrap();

    assert_eq!(report.unchanged, 1);
    assert!(report.modified.is_empty());
    assert!(report.is_noop());
}

#[test]
fn test_added_and_removed_files_relink_importers() {
    let (_dir, project) = setup();
    write(
        project.root(),
        "src/App.tsx",
        &APP.replace("import { Mid } from './Mid';", "import { Mid } from './Mid';\nimport { Badge } from './Badge';"),
    );
    let (mut cache, _) = IncrementalCache::build(&project);
    let app = EntryId::new("src/App.tsx");
    let missing = |cache: &IncrementalCache| -> Vec<String> {
        cache.bundle(&app).unwrap().meta.missing.iter().map(|m| m.name.clone()).collect()
    };
    assert_eq!(missing(&cache), vec!["./Badge".to_string()]);

    write(project.root(), "src/Badge.tsx", "export const Badge = () => <b />;\n");
    let added = cache
        .apply_changes(
            &project,
            &[FileChange::new(project.root().join("src/Badge.tsx"), ChangeKind::Added)],
        )
        .unwrap();

    assert_eq!(added.added, vec![EntryId::new("src/Badge.tsx")]);
    assert_eq!(added.repacked, vec![app.clone()]);
    assert!(missing(&cache).is_empty());
    assert!(cache.bundle(&app).unwrap().contains(&EntryId::new("src/Badge.tsx")));

    std::fs::remove_file(project.root().join("src/Badge.tsx")).unwrap();
    let removed = cache
        .apply_changes(
            &project,
            &[FileChange::new(project.root().join("src/Badge.tsx"), ChangeKind::Removed)],
        )
        .unwrap();

    assert_eq!(removed.removed, vec![EntryId::new("src/Badge.tsx")]);
    assert_eq!(removed.repacked, vec![app.clone()]);
    assert_eq!(missing(&cache), vec!["./Badge".to_string()]);
}

#[test]
fn test_extraction_failure_drops_module() {
    let (_dir, project) = setup();
    let (mut cache, _) = IncrementalCache::build(&project);

    std::fs::write(project.root().join("src/Mid.tsx"), [0xff, 0xfe, 0x00]).unwrap();
    let report = cache
        .apply_changes(&project, &[modified(&project, "src/Mid.tsx")])
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.removed, vec![EntryId::new("src/Mid.tsx")]);
    assert!(!cache.store().contains(&EntryId::new("src/Mid.tsx")));
    assert_eq!(cache.failures().count(), 1);
    // Leaf lost its only importer and now gets its own bundle
    assert!(cache.bundle(&EntryId::new("src/Leaf.tsx")).is_some());
    assert!(report.repacked.contains(&EntryId::new("src/App.tsx")));
}

#[test]
fn test_new_root_gets_bundle_and_lost_root_is_dropped() {
    let (_dir, project) = setup();
    let (mut cache, _) = IncrementalCache::build(&project);

    // nothing imports Mid any more, so it becomes a root
    write(project.root(), "src/App.tsx", "export default function App() {\n  return null;\n}\n");
    let report = cache
        .apply_changes(&project, &[modified(&project, "src/App.tsx")])
        .unwrap();

    assert_eq!(
        report.repacked,
        vec![EntryId::new("src/App.tsx"), EntryId::new("src/Mid.tsx")]
    );
    assert!(report.dropped.is_empty());

    std::fs::remove_file(project.root().join("src/App.tsx")).unwrap();
    let report = cache
        .apply_changes(
            &project,
            &[FileChange::new(project.root().join("src/App.tsx"), ChangeKind::Removed)],
        )
        .unwrap();

    assert_eq!(report.dropped, vec![EntryId::new("src/App.tsx")]);
    assert!(cache.bundle(&EntryId::new("src/App.tsx")).is_none());
}

const ROOT: &str = "import { P } from './P';\nimport { Card } from './Card/index';\n\nexport default function R() {\n  return <P><Card /></P>;\n}\n";
const P: &str = "import { Card } from './Card';\n\nexport function P() {\n  return <Card />;\n}\n";
const CARD: &str = "export function Card() {\n  return <div />;\n}\n";

/// Bundle hashes by root, plus graph edges, of a from-scratch build.
fn fresh_state(project: &Project) -> (Vec<(String, String)>, Vec<(EntryId, EntryId)>) {
    let (cache, _) = IncrementalCache::build(project);
    state(&cache)
}

fn state(cache: &IncrementalCache) -> (Vec<(String, String)>, Vec<(EntryId, EntryId)>) {
    let hashes = cache
        .bundles()
        .iter()
        .map(|b| (b.entry_id.as_str().to_string(), b.bundle_hash.as_str().to_string()))
        .collect();
    (hashes, cache.graph().edges())
}

/// R -> {P, Card/index}, P -> ./Card, packed at depth 1.
fn shadow_setup(with_card_file: bool) -> (TempDir, Project) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/R.tsx", ROOT);
    write(dir.path(), "src/P.tsx", P);
    write(dir.path(), "src/Card/index.tsx", CARD);
    if with_card_file {
        write(dir.path(), "src/Card.tsx", CARD);
    }
    let config = ContextConfig {
        depth: 1,
        ..ContextConfig::default()
    };
    let project = Project::new(dir.path(), config, Arc::new(ScriptExtractor::default())).unwrap();
    (dir, project)
}

#[test]
fn test_removal_falling_back_to_index_matches_full_build() {
    let (_dir, project) = shadow_setup(true);
    let (mut cache, _) = IncrementalCache::build(&project);

    std::fs::remove_file(project.root().join("src/Card.tsx")).unwrap();
    let report = cache
        .apply_changes(
            &project,
            &[FileChange::new(project.root().join("src/Card.tsx"), ChangeKind::Removed)],
        )
        .unwrap();

    assert!(report.repacked.contains(&EntryId::new("src/R.tsx")));
    assert_eq!(state(&cache), fresh_state(&project));
}

#[test]
fn test_added_file_shadowing_index_matches_full_build() {
    let (_dir, project) = shadow_setup(false);
    let (mut cache, _) = IncrementalCache::build(&project);

    write(project.root(), "src/Card.tsx", CARD);
    let report = cache
        .apply_changes(
            &project,
            &[FileChange::new(project.root().join("src/Card.tsx"), ChangeKind::Added)],
        )
        .unwrap();

    assert!(report.repacked.contains(&EntryId::new("src/R.tsx")));
    assert!(cache
        .graph()
        .forward_edges(&EntryId::new("src/P.tsx"))
        .contains(&EntryId::new("src/Card.tsx")));
    assert_eq!(state(&cache), fresh_state(&project));
}

#[test]
fn test_change_sequence_matches_full_build() {
    let (_dir, project) = setup();
    let (mut cache, _) = IncrementalCache::build(&project);

    let steps: [(&str, Option<String>); 4] = [
        // deeper than depth 1 from App: closes a Mid <-> Leaf cycle
        ("src/Leaf.tsx", Some(format!("import {{ Mid }} from './Mid';\n{LEAF}"))),
        ("src/Badge.tsx", Some("export const Badge = () => <b />;\n".to_string())),
        ("src/Mid.tsx", Some(MID.replace("import { Leaf } from './Leaf';", "import { Badge } from './Badge';"))),
        ("src/Leaf.tsx", None),
    ];
    for (rel, contents) in steps {
        let kind = match &contents {
            Some(text) => {
                write(project.root(), rel, text);
                ChangeKind::Modified
            }
            None => {
                std::fs::remove_file(project.root().join(rel)).unwrap();
                ChangeKind::Removed
            }
        };
        cache
            .apply_changes(&project, &[FileChange::new(project.root().join(rel), kind)])
            .unwrap();

        assert_eq!(state(&cache), fresh_state(&project), "after changing {rel}");
    }
}
