//! Cross-checks the shipped `nodepacks/builtin` tree against the library:
//! every declared unit must bind, so a manifest typo fails here instead of
//! silently dropping an operation at server start.

use std::path::Path;

use nodeflow_core::introspect::introspect;
use nodeflow_core::schema::OpKind;
use nodeflow_ops::builtin_library;

fn nodepacks_root() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../../nodepacks"))
}

#[test]
fn every_shipped_unit_binds() {
    let registry = introspect(nodepacks_root(), &builtin_library()).unwrap();

    let plain = registry
        .schemas()
        .iter()
        .filter(|s| s.kind == OpKind::Plain)
        .count();
    let progress = registry
        .schemas()
        .iter()
        .filter(|s| s.kind == OpKind::Progress)
        .count();
    let stream = registry
        .schemas()
        .iter()
        .filter(|s| s.kind == OpKind::Stream)
        .count();

    assert_eq!(plain, 12, "plain units in ops.yaml");
    assert_eq!(progress, 2, "units in progress_ops.yaml");
    assert_eq!(stream, 2, "units in stream_ops.yaml");
}

#[test]
fn shipped_schemas_carry_their_metadata() {
    let registry = introspect(nodepacks_root(), &builtin_library()).unwrap();

    let split = &registry.plain("split_name").unwrap().schema;
    assert_eq!(split.docstring, "Split a full name into first and last.");
    assert_eq!(split.filepath, "builtin/ops.yaml");
    assert!(split.is_multi_output());
    assert_eq!(split.returns[0].name, "first");
    assert_eq!(split.returns[1].name, "last");

    let round = &registry.plain("round_number").unwrap().schema;
    let mode = round.param("mode").unwrap();
    assert_eq!(
        mode.literal_values,
        Some(vec![
            "floor".to_string(),
            "ceil".to_string(),
            "nearest".to_string()
        ])
    );

    assert!(registry.progress("ticker").is_some());
    assert!(registry.stream("chunked_echo").is_some());
}
