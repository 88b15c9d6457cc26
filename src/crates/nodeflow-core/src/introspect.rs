//! Schema introspection over an operations tree
//!
//! A nodepack is a directory the introspector scans for three structural
//! file names: `ops.yaml` (plain operations), `progress_ops.yaml`
//! (progress operations), and `stream_ops.yaml` (stream operations). Each
//! file declares units:
//!
//! ```yaml
//! - name: add
//!   impl: math::add
//!   doc: "Add two numbers."
//!   params:
//!     - { name: a, type: float, default: 0 }
//!     - { name: b, type: float, default: 0 }
//!   returns:
//!     - { name: output, type: float }
//! ```
//!
//! `impl` binds the declaration to a callable in the [`OpLibrary`]; the
//! file name fixes the kind, and the binding must exist under that kind.
//! `returns` defaults to a single `output` of type `any`; two or more
//! entries declare the multi-key dict contract. Names with a leading
//! underscore are private and skipped.
//!
//! # Failure policy
//!
//! A unit that cannot be resolved (unknown type tag, `literal` parameter
//! without values, a default outside the admissible literal set, an `impl`
//! reference missing from the library, a duplicate name within the kind)
//! is skipped with a logged diagnostic and does not abort introspection.
//! Likewise an unparseable manifest file skips only that file. Only an
//! unreadable root directory fails the build.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{GraphError, Result};
use crate::registry::{OpLibrary, Registry};
use crate::schema::{FunctionSchema, OpKind, ParamSchema, ReturnSchema, TypeTag};

/// Manifest declaration of one operation unit
#[derive(Debug, Deserialize)]
struct UnitDecl {
    name: String,
    #[serde(rename = "impl")]
    implementation: String,
    #[serde(default)]
    doc: String,
    #[serde(default)]
    params: Vec<ParamDecl>,
    #[serde(default)]
    returns: Vec<ReturnDecl>,
}

#[derive(Debug, Deserialize)]
struct ParamDecl {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    values: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ReturnDecl {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

/// Build a [`Registry`] by scanning `root` and binding against `library`
///
/// Files are visited in a stable name-sorted order, so the schema listing
/// is reproducible for a given tree.
pub fn introspect(root: &Path, library: &OpLibrary) -> Result<Registry> {
    if !root.is_dir() {
        return Err(GraphError::Introspection(format!(
            "operations root '{}' is not a directory",
            root.display()
        )));
    }

    let mut registry = Registry::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry in operations tree");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(kind) = manifest_kind(entry.path()) else {
            continue;
        };
        load_manifest(entry.path(), root, kind, library, &mut registry);
    }

    debug!(operations = registry.len(), root = %root.display(), "introspection complete");
    Ok(registry)
}

/// Kind encoded by a manifest file name, if it is one of the three
fn manifest_kind(path: &Path) -> Option<OpKind> {
    let ext = path.extension()?.to_str()?;
    if ext != "yaml" && ext != "yml" {
        return None;
    }
    match path.file_stem()?.to_str()? {
        "ops" => Some(OpKind::Plain),
        "progress_ops" => Some(OpKind::Progress),
        "stream_ops" => Some(OpKind::Stream),
        _ => None,
    }
}

fn load_manifest(
    path: &Path,
    root: &Path,
    kind: OpKind,
    library: &OpLibrary,
    registry: &mut Registry,
) {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "cannot read manifest");
            return;
        }
    };
    let units: Vec<UnitDecl> = match serde_yaml::from_str(&text) {
        Ok(units) => units,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "cannot parse manifest");
            return;
        }
    };

    let filepath = path
        .strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string();

    for unit in units {
        if unit.name.starts_with('_') {
            debug!(unit = %unit.name, file = %filepath, "skipping private unit");
            continue;
        }
        let Some(schema) = build_schema(&unit, kind, &filepath) else {
            continue;
        };
        if let Err(err) = bind(schema, &unit, kind, library, registry) {
            warn!(unit = %unit.name, file = %filepath, error = %err, "skipping unit");
        }
    }
}

/// Resolve a declaration into a schema; `None` logs the reason and skips
fn build_schema(unit: &UnitDecl, kind: OpKind, filepath: &str) -> Option<FunctionSchema> {
    let mut params = Vec::with_capacity(unit.params.len());
    for decl in &unit.params {
        let Some(ty) = TypeTag::parse(&decl.ty) else {
            warn!(unit = %unit.name, param = %decl.name, ty = %decl.ty,
                  "skipping unit: unknown type tag");
            return None;
        };
        let literal_values = match (ty, &decl.values) {
            (TypeTag::Literal, Some(values)) if !values.is_empty() => Some(values.clone()),
            (TypeTag::Literal, _) => {
                warn!(unit = %unit.name, param = %decl.name,
                      "skipping unit: literal parameter without admissible values");
                return None;
            }
            (_, _) => None,
        };
        if let (Some(values), Some(Value::String(default))) = (&literal_values, &decl.default) {
            if !values.contains(default) {
                warn!(unit = %unit.name, param = %decl.name, default = %default,
                      "skipping unit: default outside the admissible literal set");
                return None;
            }
        }
        params.push(ParamSchema {
            name: decl.name.clone(),
            ty,
            default: decl.default.clone(),
            literal_values,
        });
    }

    let returns = if unit.returns.is_empty() {
        vec![ReturnSchema {
            name: "output".into(),
            ty: TypeTag::Any,
        }]
    } else {
        let mut returns = Vec::with_capacity(unit.returns.len());
        for decl in &unit.returns {
            let Some(ty) = TypeTag::parse(&decl.ty) else {
                warn!(unit = %unit.name, ret = %decl.name, ty = %decl.ty,
                      "skipping unit: unknown return type tag");
                return None;
            };
            returns.push(ReturnSchema {
                name: decl.name.clone(),
                ty,
            });
        }
        returns
    };

    Some(FunctionSchema {
        name: unit.name.clone(),
        params,
        returns,
        docstring: unit.doc.clone(),
        filepath: filepath.to_string(),
        kind,
    })
}

fn bind(
    schema: FunctionSchema,
    unit: &UnitDecl,
    kind: OpKind,
    library: &OpLibrary,
    registry: &mut Registry,
) -> Result<()> {
    let missing = || {
        GraphError::Introspection(format!(
            "implementation '{}' not found in library for its kind",
            unit.implementation
        ))
    };
    match kind {
        OpKind::Plain => {
            let op = library.get_plain(&unit.implementation).ok_or_else(missing)?;
            registry.register_plain(schema, op)
        }
        OpKind::Progress => {
            let op = library.get_progress(&unit.implementation).ok_or_else(missing)?;
            registry.register_progress(schema, op)
        }
        OpKind::Stream => {
            let op = library.get_stream(&unit.implementation).ok_or_else(missing)?;
            registry.register_stream(schema, op)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OpInputs;
    use crate::reporter::{ProgressReporter, StreamReporter};
    use serde_json::json;
    use std::fs;

    fn library() -> OpLibrary {
        let mut library = OpLibrary::new();
        library.register_plain("math::add", |_: OpInputs| -> anyhow::Result<Value> {
            Ok(json!(0))
        });
        library.register_progress(
            "progress::ticker",
            |_: OpInputs, _: &ProgressReporter| -> anyhow::Result<Value> { Ok(json!(0)) },
        );
        library.register_stream(
            "stream::spell",
            |_: OpInputs, _: &StreamReporter| -> anyhow::Result<Value> { Ok(json!("")) },
        );
        library
    }

    #[test]
    fn discovers_all_three_manifest_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let pack = dir.path().join("builtin");
        fs::create_dir(&pack).unwrap();
        fs::write(
            pack.join("ops.yaml"),
            r#"
- name: add
  impl: math::add
  doc: "Add two numbers."
  params:
    - { name: a, type: float, default: 0 }
    - { name: b, type: float, default: 0 }
  returns:
    - { name: output, type: float }
"#,
        )
        .unwrap();
        fs::write(
            pack.join("progress_ops.yaml"),
            r#"
- name: ticker
  impl: progress::ticker
  params:
    - { name: ticks, type: int, default: 10 }
"#,
        )
        .unwrap();
        fs::write(
            pack.join("stream_ops.yaml"),
            r#"
- name: spell
  impl: stream::spell
  params:
    - { name: text, type: str }
"#,
        )
        .unwrap();

        let registry = introspect(dir.path(), &library()).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.plain("add").is_some());
        assert!(registry.progress("ticker").is_some());
        assert!(registry.stream("spell").is_some());

        let add = &registry.plain("add").unwrap().schema;
        assert_eq!(add.docstring, "Add two numbers.");
        assert_eq!(add.filepath, "builtin/ops.yaml");
        assert_eq!(add.params.len(), 2);
        // ticker got the implicit single `output: any` return
        let ticker = &registry.progress("ticker").unwrap().schema;
        assert_eq!(ticker.returns.len(), 1);
        assert_eq!(ticker.returns[0].name, "output");
    }

    #[test]
    fn bad_units_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ops.yaml"),
            r#"
- name: good
  impl: math::add
- name: _private
  impl: math::add
- name: bad_type
  impl: math::add
  params:
    - { name: x, type: quaternion }
- name: bad_literal
  impl: math::add
  params:
    - { name: mode, type: literal }
- name: bad_impl
  impl: math::missing
- name: good
  impl: math::add
"#,
        )
        .unwrap();

        let registry = introspect(dir.path(), &library()).unwrap();
        // one survivor: the first `good`; the duplicate and the broken ones drop
        assert_eq!(registry.len(), 1);
        assert!(registry.plain("good").is_some());
    }

    #[test]
    fn literal_default_must_be_admissible() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ops.yaml"),
            r#"
- name: round_bad
  impl: math::add
  params:
    - { name: mode, type: literal, values: [floor, ceil], default: nearest }
- name: round_good
  impl: math::add
  params:
    - { name: mode, type: literal, values: [floor, ceil], default: ceil }
"#,
        )
        .unwrap();

        let registry = introspect(dir.path(), &library()).unwrap();
        assert_eq!(registry.len(), 1);
        let schema = &registry.plain("round_good").unwrap().schema;
        assert_eq!(
            schema.params[0].literal_values,
            Some(vec!["floor".to_string(), "ceil".to_string()])
        );
    }

    #[test]
    fn unparseable_manifest_skips_only_that_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ops.yaml"), ": not [ yaml").unwrap();
        let nested = dir.path().join("other");
        fs::create_dir(&nested).unwrap();
        fs::write(
            nested.join("ops.yaml"),
            "- { name: add, impl: math::add }\n",
        )
        .unwrap();

        let registry = introspect(dir.path(), &library()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = introspect(Path::new("/definitely/not/here"), &library()).unwrap_err();
        assert!(matches!(err, GraphError::Introspection(_)));
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# pack docs").unwrap();
        fs::write(dir.path().join("ops.json"), "[]").unwrap();
        let registry = introspect(dir.path(), &library()).unwrap();
        assert!(registry.is_empty());
    }
}
