use crate::source::{bracket_body, split_members, strip_comments};
use context_contract::{
    BackendMeta, EntryId, ExtractError, Exports, Extractor, FieldSpec, LogicSignature,
    ModuleSummary, StyleMeta, TypeShape, VersionFingerprint,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    re(r#"\b(?:import|export)\s+(?:type\s+)?(?:[\w$*{}\s,]+?\s+from\s+)?["']([^"'\n]+)["']"#)
});
static IMPORT_CALL: Lazy<Regex> =
    Lazy::new(|| re(r#"\b(?:require|import)\s*\(\s*["'`]([^"'`\n]+)["'`]\s*\)"#));

static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| re(r"\bexport\s+default\b"));
static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    re(r"\bexport\s+(?:declare\s+)?(?:async\s+)?(?:abstract\s+)?(?:const|let|var|function\*?|class|interface|type|enum)\s+([A-Za-z_$][\w$]*)")
});
static EXPORT_LIST: Lazy<Regex> = Lazy::new(|| re(r"\bexport\s+(?:type\s+)?\{([^}]*)\}"));

static HOOK_CALL: Lazy<Regex> =
    Lazy::new(|| re(r"(?:^|[^\w$.]|\bReact\.)(use[A-Z][\w$]*)\s*(?:<[^()]*?>)?\s*\("));
static COMPONENT_TAG: Lazy<Regex> =
    Lazy::new(|| re(r"(?:^|[^\w$.])<([A-Z][\w$]*(?:\.[A-Z][\w$]*)*)[\s/>]"));
static KEBAB_TAG: Lazy<Regex> = Lazy::new(|| re(r"<([a-z][a-z0-9]*(?:-[a-z0-9]+)+)[\s/>]"));

static FUNCTION_DECL: Lazy<Regex> =
    Lazy::new(|| re(r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\("));
static ARROW_DECL: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|(?:\([^()]*\)|[A-Za-z_$][\w$]*)\s*(?::\s*[^=]+)?=>)")
});
static VARIABLE_DECL: Lazy<Regex> =
    Lazy::new(|| re(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=;]+)?="));

static PROPS_TYPE: Lazy<Regex> =
    Lazy::new(|| re(r"\b(?:interface|type)\s+[A-Za-z_$]*Props\b[^{=]*(?:=[^{]*)?\{"));
static DEFINE_PROPS_TYPED: Lazy<Regex> = Lazy::new(|| re(r"\bdefineProps\s*<\s*\{"));
static DEFINE_PROPS_OBJECT: Lazy<Regex> = Lazy::new(|| re(r"\bdefineProps\s*\(\s*\{"));
static DEFINE_EMITS_TYPED: Lazy<Regex> = Lazy::new(|| re(r"\bdefineEmits\s*<\s*\{"));
static DEFINE_EMITS_LIST: Lazy<Regex> = Lazy::new(|| re(r"\bdefineEmits\s*\(\s*\["));
static EMIT_CALL: Lazy<Regex> =
    Lazy::new(|| re(r#"\$?\bemit\s*\(\s*["']([\w:.-]+)["']"#));
static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| re(r#"["']([^"']+)["']"#));

static PROP_MEMBER: Lazy<Regex> =
    Lazy::new(|| re(r#"(?s)^(?:readonly\s+)?["']?([A-Za-z_$][\w$-]*)["']?\s*(\?)?\s*:\s*(.+)$"#));
static METHOD_MEMBER: Lazy<Regex> =
    Lazy::new(|| re(r"(?s)^([A-Za-z_$][\w$]*)\s*(\?)?\s*\((.*)\)\s*:\s*(.+)$"));
static CALL_SIGNATURE: Lazy<Regex> =
    Lazy::new(|| re(r#"(?s)^\(\s*\w+\s*:\s*["']([\w:.-]+)["']\s*(?:,(.*))?\)\s*:\s*(.+)$"#));
static EVENT_NAME: Lazy<Regex> = Lazy::new(|| re(r"^on[A-Z]"));

static USE_STATE: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:const|let)\s*\[\s*([A-Za-z_$][\w$]*)\s*,\s*[A-Za-z_$][\w$]*\s*\]\s*=\s*(?:React\.)?(useState|useReducer)\s*(?:<([^()]*?)>)?\s*\(")
});
static VUE_REF: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:const|let)\s+([A-Za-z_$][\w$]*)\s*=\s*(ref|reactive|shallowRef)\s*(?:<([^()]*?)>)?\s*\(")
});

static CLASS_ATTR: Lazy<Regex> = Lazy::new(|| re(r"(?:^|[\s:])(?:class|className)\s*="));
static CLASS_VALUE: Lazy<Regex> =
    Lazy::new(|| re(r#"\b(?:class|className)\s*=\s*\{?\s*["'`]([^"'`]*)["'`]"#));
static UTILITY_CLASS: Lazy<Regex> = Lazy::new(|| {
    re(r"^(?:[a-z]+:)*-?(?:flex|grid|block|inline|hidden|container|(?:p|m)[trblxy]?-\S+|(?:text|bg|border|rounded|shadow|gap|space|items|justify|w|h|min-w|max-w|min-h|max-h|font|leading|tracking)-\S+|rounded|shadow|border)$")
});
static ROUTE: Lazy<Regex> = Lazy::new(|| {
    re(r#"\b(?:app|router|server|fastify|api)\.(get|post|put|patch|delete|all)\s*\(\s*["'`]([^"'`]+)["'`]"#)
});

static VUE_SCRIPT: Lazy<Regex> = Lazy::new(|| re(r"(?s)<script\b[^>]*>(.*?)</script>"));
static VUE_TEMPLATE: Lazy<Regex> = Lazy::new(|| re(r"(?s)<template\b[^>]*>(.*)</template>"));
static VUE_STYLE: Lazy<Regex> = Lazy::new(|| re(r"<style\b([^>]*)>"));

const BACKEND_FRAMEWORKS: &[&str] = &["express", "fastify", "koa", "hono", "next/server"];

/// Regex-based extractor for script and component sources
/// (`.ts`, `.tsx`, `.js`, `.jsx`, `.vue`).
///
/// Not a parser: it recognises the common declaration shapes of React and
/// Vue components and ignores everything else.
#[derive(Debug, Clone)]
pub struct ScriptExtractor {
    extensions: Vec<String>,
}

impl Default for ScriptExtractor {
    fn default() -> Self {
        Self::new(["ts", "tsx", "js", "jsx", "vue"].iter().map(|e| (*e).to_string()))
    }
}

impl ScriptExtractor {
    pub fn new(extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn extension_of(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
    }
}

impl Extractor for ScriptExtractor {
    fn supports(&self, path: &Path) -> bool {
        Self::extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn extract(&self, entry_id: &EntryId, contents: &str) -> Result<ModuleSummary, ExtractError> {
        let path = Path::new(entry_id.as_str());
        let ext = Self::extension_of(path)
            .filter(|ext| self.extensions.contains(ext))
            .ok_or_else(|| ExtractError::Unsupported(entry_id.to_string()))?;
        if contents.contains('\0') {
            return Err(ExtractError::Parse("binary content".to_string()));
        }

        let text = strip_comments(contents);
        let summary = if ext == "vue" {
            extract_vue(&text)
        } else {
            extract_script(&text, &text)
        };
        log::trace!("Extracted {entry_id}: {} imports", summary.version.imports.len());
        Ok(summary)
    }
}

fn extract_vue(text: &str) -> ModuleSummary {
    let script: String = VUE_SCRIPT
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let template = VUE_TEMPLATE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or("", |m| m.as_str());

    let mut summary = extract_script(&script, template);
    // a single-file component always default-exports itself
    summary.exports = Exports::Default;
    summary.version.components.extend(
        KEBAB_TAG
            .captures_iter(template)
            .map(|c| pascal_case(&c[1])),
    );

    let mut style = summary.style.take().unwrap_or_default();
    for attrs in VUE_STYLE.captures_iter(text) {
        let attrs = &attrs[1];
        if attrs.contains("module") {
            style.frameworks.insert("css-modules".to_string());
        } else if attrs.contains("scoped") {
            style.frameworks.insert("scoped-css".to_string());
        } else {
            style.frameworks.insert("css".to_string());
        }
    }
    summary.style = (!style.frameworks.is_empty() || style.class_names > 0).then_some(style);
    summary
}

/// `script` holds declarations; `markup` is where component tags and class
/// attributes live (the same text for JSX modules).
fn extract_script(script: &str, markup: &str) -> ModuleSummary {
    let imports = collect_imports(script);
    let functions = collect_functions(script);
    let variables: BTreeSet<String> = VARIABLE_DECL
        .captures_iter(script)
        .map(|c| c[1].to_string())
        .filter(|name| !functions.contains(name))
        .collect();

    let mut props = collect_props(script);
    let mut events = collect_events(script);
    let callbacks: Vec<String> = props
        .iter()
        .filter(|(name, spec)| {
            EVENT_NAME.is_match(name) && matches!(spec.ty, TypeShape::Function { .. })
        })
        .map(|(name, _)| name.clone())
        .collect();
    for name in callbacks {
        if let Some(spec) = props.remove(&name) {
            events.insert(name, spec);
        }
    }

    let version = VersionFingerprint {
        hooks: collect_hooks(script),
        components: COMPONENT_TAG
            .captures_iter(markup)
            .map(|c| c[1].to_string())
            .collect(),
        functions,
        variables,
        imports,
    };

    ModuleSummary {
        exports: collect_exports(script),
        logic: LogicSignature {
            props,
            events,
            state: collect_state(script),
        },
        style: collect_style(markup, &version.imports),
        backend: collect_backend(script, &version.imports),
        version,
    }
}

fn collect_imports(text: &str) -> BTreeSet<String> {
    IMPORT_FROM
        .captures_iter(text)
        .chain(IMPORT_CALL.captures_iter(text))
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn collect_exports(text: &str) -> Exports {
    if EXPORT_DEFAULT.is_match(text) {
        return Exports::Default;
    }
    let mut names: BTreeSet<String> = EXPORT_DECL
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();
    for list in EXPORT_LIST.captures_iter(text) {
        for item in list[1].split(',') {
            let exported = item.rsplit(" as ").next().unwrap_or(item).trim();
            if exported == "default" {
                return Exports::Default;
            }
            if !exported.is_empty() {
                names.insert(exported.trim_start_matches("type ").to_string());
            }
        }
    }
    if names.is_empty() {
        Exports::None
    } else {
        Exports::Named { names }
    }
}

fn collect_hooks(text: &str) -> BTreeSet<String> {
    HOOK_CALL
        .captures_iter(text)
        .filter_map(|c| {
            let name = c.get(1)?;
            // `function useThing(` declares the hook, it does not call it
            let before = text[..name.start()].trim_end().trim_end_matches('*').trim_end();
            (!before.ends_with("function")).then(|| name.as_str().to_string())
        })
        .collect()
}

fn collect_functions(text: &str) -> BTreeSet<String> {
    FUNCTION_DECL
        .captures_iter(text)
        .chain(ARROW_DECL.captures_iter(text))
        .map(|c| c[1].to_string())
        .collect()
}

fn collect_props(text: &str) -> BTreeMap<String, FieldSpec> {
    let mut props = BTreeMap::new();
    for m in PROPS_TYPE
        .find_iter(text)
        .chain(DEFINE_PROPS_TYPED.find_iter(text))
    {
        if let Some(body) = bracket_body(text, m.end() - 1) {
            props.extend(parse_type_members(body));
        }
    }
    for m in DEFINE_PROPS_OBJECT.find_iter(text) {
        if let Some(body) = bracket_body(text, m.end() - 1) {
            props.extend(parse_runtime_props(body));
        }
    }
    props
}

fn collect_events(text: &str) -> BTreeMap<String, FieldSpec> {
    let mut events = BTreeMap::new();
    for m in DEFINE_EMITS_TYPED.find_iter(text) {
        let Some(body) = bracket_body(text, m.end() - 1) else {
            continue;
        };
        for member in split_members(body) {
            if let Some(c) = CALL_SIGNATURE.captures(&member) {
                let params = c.get(2).map_or("", |p| p.as_str());
                let ty = TypeShape::parse(&format!("({params}) => {}", &c[3]));
                events.insert(c[1].to_string(), FieldSpec::new(ty, false));
            } else if let Some((name, spec)) = parse_member(&member) {
                events.insert(name, spec);
            }
        }
    }
    for m in DEFINE_EMITS_LIST.find_iter(text) {
        if let Some(body) = bracket_body(text, m.end() - 1) {
            for c in STRING_LITERAL.captures_iter(body) {
                events
                    .entry(c[1].to_string())
                    .or_insert_with(|| FieldSpec::new(TypeShape::Unknown, false));
            }
        }
    }
    for c in EMIT_CALL.captures_iter(text) {
        events
            .entry(c[1].to_string())
            .or_insert_with(|| FieldSpec::new(TypeShape::Unknown, false));
    }
    events
}

fn parse_type_members(body: &str) -> Vec<(String, FieldSpec)> {
    split_members(body)
        .iter()
        .filter_map(|member| parse_member(member))
        .collect()
}

fn parse_member(member: &str) -> Option<(String, FieldSpec)> {
    if let Some(c) = METHOD_MEMBER.captures(member) {
        let ty = TypeShape::parse(&format!("({}) => {}", &c[3], &c[4]));
        return Some((c[1].to_string(), FieldSpec::new(ty, c.get(2).is_some())));
    }
    let c = PROP_MEMBER.captures(member)?;
    Some((c[1].to_string(), FieldSpec::parse(&c[3], c.get(2).is_some())))
}

/// `defineProps({ title: String, size: { type: Number, required: true } })`
fn parse_runtime_props(body: &str) -> Vec<(String, FieldSpec)> {
    split_members(body)
        .iter()
        .filter_map(|member| {
            let (name, value) = member.split_once(':')?;
            let name = name.trim().trim_matches(['"', '\'']).to_string();
            let value = value.trim();
            let (ctor, required) = match value.strip_prefix('{') {
                Some(inner) => {
                    let ctor = inner
                        .split(['}', ','])
                        .find_map(|part| part.trim().strip_prefix("type:"))
                        .map_or("", str::trim);
                    (ctor.to_string(), inner.contains("required: true"))
                }
                None => (value.to_string(), false),
            };
            let ty = match ctor.as_str() {
                "" => TypeShape::Unknown,
                "String" => TypeShape::simple("string"),
                "Number" => TypeShape::simple("number"),
                "Boolean" => TypeShape::simple("boolean"),
                "Array" => TypeShape::simple("unknown[]"),
                "Object" => TypeShape::simple("object"),
                "Function" => TypeShape::Function {
                    params: Vec::new(),
                    returns: None,
                },
                other => TypeShape::parse(other),
            };
            Some((name, FieldSpec::new(ty, !required)))
        })
        .collect()
}

fn collect_state(text: &str) -> BTreeMap<String, FieldSpec> {
    let mut state = BTreeMap::new();
    for c in USE_STATE.captures_iter(text).chain(VUE_REF.captures_iter(text)) {
        let Some(whole) = c.get(0) else {
            continue;
        };
        let explicit = c.get(3).map(|m| m.as_str().trim()).filter(|t| !t.is_empty());
        let ty = match (explicit, &c[2]) {
            (Some(ty), _) => TypeShape::parse(ty),
            (None, "useReducer") => TypeShape::Unknown,
            (None, _) => bracket_body(text, whole.end() - 1)
                .map_or(TypeShape::Unknown, infer_literal_type),
        };
        state.insert(c[1].to_string(), FieldSpec::new(ty, false));
    }
    state
}

fn infer_literal_type(init: &str) -> TypeShape {
    let init = init.trim();
    let name = match init.chars().next() {
        None => return TypeShape::Unknown,
        Some('"' | '\'' | '`') => "string",
        Some('[') => "unknown[]",
        Some('{') => "object",
        _ if init == "true" || init == "false" => "boolean",
        _ if init.parse::<f64>().is_ok() => "number",
        _ => return TypeShape::Unknown,
    };
    TypeShape::simple(name)
}

fn collect_style(markup: &str, imports: &BTreeSet<String>) -> Option<StyleMeta> {
    let mut frameworks = BTreeSet::new();
    for spec in imports {
        let lower = spec.to_lowercase();
        let sheet = [".css", ".scss", ".sass", ".less"]
            .iter()
            .any(|ext| lower.ends_with(ext));
        if sheet && lower.contains(".module.") {
            frameworks.insert("css-modules".to_string());
        } else if sheet {
            frameworks.insert("css".to_string());
        } else if lower == "styled-components" {
            frameworks.insert("styled-components".to_string());
        } else if lower.starts_with("@emotion/") {
            frameworks.insert("emotion".to_string());
        }
    }

    let tailwind = CLASS_VALUE.captures_iter(markup).any(|c| {
        c[1].split_whitespace()
            .any(|token| UTILITY_CLASS.is_match(token))
    });
    if tailwind {
        frameworks.insert("tailwind".to_string());
    }

    let class_names = CLASS_ATTR.find_iter(markup).count();
    (!frameworks.is_empty() || class_names > 0).then_some(StyleMeta {
        frameworks,
        class_names,
    })
}

fn collect_backend(text: &str, imports: &BTreeSet<String>) -> Option<BackendMeta> {
    let framework = BACKEND_FRAMEWORKS
        .iter()
        .find(|f| imports.contains(**f))?;
    let routes: BTreeSet<String> = ROUTE
        .captures_iter(text)
        .map(|c| format!("{} {}", c[1].to_uppercase(), &c[2]))
        .collect();
    Some(BackendMeta {
        framework: (*framework).to_string(),
        routes: routes.into_iter().collect(),
    })
}

fn pascal_case(kebab: &str) -> String {
    kebab
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(id: &str, src: &str) -> ModuleSummary {
        ScriptExtractor::default()
            .extract(&EntryId::new(id), src)
            .unwrap()
    }

    #[test]
    fn react_component_summary() {
        let src = r#"
import React, { useState } from 'react';
import styles from './Button.module.css';
import { Icon } from '../Icon';

export interface ButtonProps {
  label: string;
  variant?: 'primary' | 'secondary';
  onClick: (event: MouseEvent) => void;
}

export const Button = ({ label, variant, onClick }: ButtonProps) => {
  const [pressed, setPressed] = useState(false);
  const theme = useTheme();
  return <button className={styles.root} onClick={onClick}><Icon name="x" />{label}</button>;
};
"#;
        let summary = extract("src/Button.tsx", src);

        assert_eq!(
            summary.version.imports.iter().collect::<Vec<_>>(),
            vec!["../Icon", "./Button.module.css", "react"]
        );
        assert_eq!(
            summary.exports,
            Exports::Named {
                names: BTreeSet::from(["Button".to_string(), "ButtonProps".to_string()])
            }
        );
        assert_eq!(
            summary.logic.props.keys().collect::<Vec<_>>(),
            vec!["label", "variant"]
        );
        assert_eq!(
            summary.logic.props["variant"].normalized(),
            "\"primary\" | \"secondary\"?"
        );
        assert_eq!(
            summary.logic.events["onClick"].normalized(),
            "(event: MouseEvent) => void"
        );
        assert_eq!(summary.logic.state["pressed"].normalized(), "boolean");
        assert_eq!(
            summary.version.hooks.iter().collect::<Vec<_>>(),
            vec!["useState", "useTheme"]
        );
        assert_eq!(
            summary.version.components.iter().collect::<Vec<_>>(),
            vec!["Icon"]
        );
        assert!(summary.version.functions.contains("Button"));
        assert!(summary.version.variables.contains("theme"));
        let style = summary.style.unwrap();
        assert!(style.frameworks.contains("css-modules"));
        assert_eq!(style.class_names, 1);
    }

    #[test]
    fn generic_type_arguments_are_not_components() {
        let src = "const [items, setItems] = useState<Array<Item>>([]);\nexport default function List() { return <Row />; }";
        let summary = extract("List.tsx", src);
        assert_eq!(
            summary.version.components.iter().collect::<Vec<_>>(),
            vec!["Row"]
        );
        assert_eq!(summary.logic.state["items"].normalized(), "Array<Item>");
        assert_eq!(summary.exports, Exports::Default);
    }

    #[test]
    fn hook_definitions_are_not_hook_calls() {
        let src = "export function useAuth() { return useContext(AuthContext); }";
        let summary = extract("useAuth.ts", src);
        assert_eq!(
            summary.version.hooks.iter().collect::<Vec<_>>(),
            vec!["useContext"]
        );
        assert!(summary.version.functions.contains("useAuth"));
    }

    #[test]
    fn vue_single_file_component() {
        let src = r#"
<template>
  <div class="flex items-center p-4">
    <base-card :title="title" />
    <AppIcon />
  </div>
</template>

<script setup lang="ts">
import { ref } from 'vue';
import BaseCard from './BaseCard.vue';

const props = defineProps<{ title: string; count?: number }>();
const emit = defineEmits(['close', 'save']);
const open = ref(false);
</script>

<style scoped>
.root { color: red; }
</style>
"#;
        let summary = extract("components/Panel.vue", src);

        assert_eq!(summary.exports, Exports::Default);
        assert_eq!(
            summary.logic.props.keys().collect::<Vec<_>>(),
            vec!["count", "title"]
        );
        assert_eq!(
            summary.logic.events.keys().collect::<Vec<_>>(),
            vec!["close", "save"]
        );
        assert_eq!(summary.logic.state["open"].normalized(), "boolean");
        assert_eq!(
            summary.version.components.iter().collect::<Vec<_>>(),
            vec!["AppIcon", "BaseCard"]
        );
        let style = summary.style.unwrap();
        assert_eq!(
            style.frameworks.iter().collect::<Vec<_>>(),
            vec!["scoped-css", "tailwind"]
        );
    }

    #[test]
    fn express_routes_become_backend_meta() {
        let src = "import express from 'express';\nconst app = express();\napp.get('/users', list);\napp.post(\"/users\", create);";
        let backend = extract("server/api.js", src).backend.unwrap();
        assert_eq!(backend.framework, "express");
        assert_eq!(backend.routes, vec!["GET /users", "POST /users"]);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = ScriptExtractor::default()
            .extract(&EntryId::new("README.md"), "# hi")
            .unwrap_err();
        assert_eq!(err, ExtractError::Unsupported("README.md".to_string()));
    }
}
