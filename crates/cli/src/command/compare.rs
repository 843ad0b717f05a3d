use anyhow::{Context, Result};
use clap::Args;
use context_drift::{compare, ContractChange, DriftReport, FieldDiff, MapDiff, SetDiff};
use context_snapshot::SnapshotReader;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Previous snapshot: output directory, context_main.json, or a context file
    pub old: PathBuf,

    /// Current snapshot
    pub new: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: CompareArgs) -> Result<ExitCode> {
    let old = SnapshotReader::read(&args.old)
        .await
        .with_context(|| format!("Failed to read snapshot {}", args.old.display()))?;
    let new = SnapshotReader::read(&args.new)
        .await
        .with_context(|| format!("Failed to read snapshot {}", args.new.display()))?;

    let report = compare(&old.bundles, &new.bundles);
    if args.json {
        println!("{}", serde_json::to_string(&report.summary())?);
    } else {
        print_report(&report);
    }

    Ok(if report.is_pass() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_report(report: &DriftReport) {
    println!("{}", report.verdict);
    for id in &report.added {
        println!("  + {id}");
    }
    for id in &report.removed {
        println!("  - {id}");
    }
    for change in &report.changed {
        print_change(change);
    }
    if !report.bundles.is_empty() {
        println!("  {} bundle hashes changed", report.bundles.len());
    }
}

fn print_change(change: &ContractChange) {
    let Some(fields) = &change.fields else {
        println!("  ~ {} (source only)", change.entry_id);
        return;
    };
    println!("  ~ {}", change.entry_id);
    for line in field_lines(fields) {
        println!("      {line}");
    }
}

fn field_lines(fields: &FieldDiff) -> Vec<String> {
    let mut lines = Vec::new();
    let maps: [(&str, &MapDiff); 3] = [
        ("props", &fields.props),
        ("events", &fields.events),
        ("state", &fields.state),
    ];
    for (label, diff) in maps {
        lines.extend(diff.added.iter().map(|n| format!("{label} +{n}")));
        lines.extend(diff.removed.iter().map(|n| format!("{label} -{n}")));
        lines.extend(
            diff.changed
                .iter()
                .map(|c| format!("{label} {}: {} -> {}", c.name, c.old, c.new)),
        );
    }
    let sets: [(&str, &SetDiff); 5] = [
        ("hooks", &fields.hooks),
        ("components", &fields.components),
        ("functions", &fields.functions),
        ("variables", &fields.variables),
        ("imports", &fields.imports),
    ];
    for (label, diff) in sets {
        lines.extend(diff.added.iter().map(|n| format!("{label} +{n}")));
        lines.extend(diff.removed.iter().map(|n| format!("{label} -{n}")));
    }
    if let Some(exports) = &fields.exports {
        lines.push(format!("exports {:?} -> {:?}", exports.old, exports.new));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_drift::ValueChange;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_lines_list_each_difference() {
        let fields = FieldDiff {
            props: MapDiff {
                added: vec!["b".to_string()],
                removed: Vec::new(),
                changed: vec![ValueChange {
                    name: "a".to_string(),
                    old: "string".to_string(),
                    new: "number".to_string(),
                }],
            },
            hooks: SetDiff {
                added: Vec::new(),
                removed: vec!["useMemo".to_string()],
            },
            ..FieldDiff::default()
        };

        assert_eq!(
            field_lines(&fields),
            vec![
                "props +b".to_string(),
                "props a: string -> number".to_string(),
                "hooks -useMemo".to_string(),
            ]
        );
    }
}
