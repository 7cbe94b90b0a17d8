// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use pretty_assertions::assert_eq;
use ryt_yaml::{ErrorKind, PackEnv, ParseOptions, parse_file};

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn pack_inline(
    dir: &Path,
    root: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let doc = parse_file(&dir.join(root), &ParseOptions::default())?;
    Ok(PackEnv::new().pack_to_string(&doc)?)
}

#[test]
fn test_include_with_override_packs_merged()
-> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    write(tmp.path(), "inner.yml", "a: 3\nb: { c: c }\nc:\n  - 3\n  - 4");
    write(
        tmp.path(),
        "root.yml",
        "- !include inner.yml\n  a: 4\n\n  b: { new: true, c: ~ }\n  c: [ 5, 6 ] # array\n  d: ~",
    );
    assert_eq!(
        pack_inline(tmp.path(), "root.yml")?,
        "- a: 4\n  b: { c: ~, new: true }\n  c:\n    - 3\n    - 4\n    - 5\n    - 6\n  d: ~\n"
    );
    Ok(())
}

#[test]
fn test_variables_bound_through_two_levels()
-> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    write(tmp.path(), "grandchild.yml", "addr: \"$host:$port\"\n");
    write(tmp.path(), "child.yml", "!include grandchild.yml\n$port: 80\n");
    write(
        tmp.path(),
        "root.yml",
        "!include child.yml\n$host: website.org\n",
    );
    assert_eq!(
        pack_inline(tmp.path(), "root.yml")?,
        "addr: \"website.org:80\"\n"
    );
    Ok(())
}

#[test]
fn test_whole_value_variable_takes_any_kind()
-> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    write(tmp.path(), "sub.yml", "servers: $list\n");
    write(
        tmp.path(),
        "root.yml",
        "!include sub.yml\n$list:\n  - alpha\n  - beta\n",
    );
    assert_eq!(
        pack_inline(tmp.path(), "root.yml")?,
        "servers:\n  - alpha\n  - beta\n"
    );
    Ok(())
}

#[test]
fn test_unknown_variable_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "sub.yml", "a: 1\n");
    write(tmp.path(), "root.yml", "!include sub.yml\n$nope: 2\n");
    let e = parse_file(&tmp.path().join("root.yml"), &ParseOptions::default())
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnknownVariable);
    assert!(e.msg().contains("$nope"));
}

#[test]
fn test_unbound_variable_rejected_unless_allowed() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "sub.yml", "a: $missing\n");
    write(tmp.path(), "root.yml", "!include sub.yml\n");
    let e = parse_file(&tmp.path().join("root.yml"), &ParseOptions::default())
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnboundVariables);
    assert!(e.msg().contains("$missing"));

    let opts = ParseOptions {
        allow_unbound_variables: true,
        ..Default::default()
    };
    let doc = parse_file(&tmp.path().join("root.yml"), &opts).unwrap();
    assert_eq!(doc.unbound_variables, vec!["missing".to_string()]);
}

#[test]
fn test_inclusion_loop_detected_with_full_chain() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "loop-1.yml", "!include loop-2.yml\n");
    write(tmp.path(), "loop-2.yml", "!include loop-3.yml\n");
    write(tmp.path(), "loop-3.yml", "!include loop-1.yml\n");
    let e =
        parse_file(&tmp.path().join("loop-1.yml"), &ParseOptions::default())
            .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidInclude);
    let rendered = e.to_string();
    assert_eq!(rendered.matches("error in included file").count(), 3);
    assert!(rendered.contains("inclusion loop detected"));
    // Outermost include site renders first.
    assert!(rendered.starts_with(
        tmp.path().join("loop-1.yml").to_string_lossy().as_ref()
    ));
}

#[test]
fn test_self_inclusion_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "me.yml", "!include me.yml\n");
    let e = parse_file(&tmp.path().join("me.yml"), &ParseOptions::default())
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidInclude);
    assert!(e.to_string().contains("inclusion loop detected"));
}

#[test]
fn test_parent_escape_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "root.yml", "!include ../outside.yml\n");
    let e = parse_file(&tmp.path().join("root.yml"), &ParseOptions::default())
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidInclude);
    assert!(e.msg().contains("escapes"));
}

#[test]
fn test_missing_subfile_reports_include_site() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "root.yml", "a: 1\nb: !include nowhere.yml\n");
    let e = parse_file(&tmp.path().join("root.yml"), &ParseOptions::default())
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidInclude);
    assert_eq!(e.pos().line, 2);
}

#[test]
fn test_error_inside_subfile_prepends_chain() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "bad.yml", "a: 1\na: 2\n");
    write(tmp.path(), "root.yml", "!include bad.yml\n");
    let e = parse_file(&tmp.path().join("root.yml"), &ParseOptions::default())
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidKey);
    let rendered = e.to_string();
    assert_eq!(rendered.matches("error in included file").count(), 1);
    assert!(rendered.contains("duplicate key `a`"));
}

#[test]
fn test_override_type_mismatch_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "sub.yml", "a: 1\n");
    write(tmp.path(), "root.yml", "!include sub.yml\na: [ 2 ]\n");
    let e = parse_file(&tmp.path().join("root.yml"), &ParseOptions::default())
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::OverrideTypeMismatch);
}

#[test]
fn test_raw_include_is_verbatim_string()
-> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    write(tmp.path(), "blob.txt", "not: [ yaml\n\ttabs ok here\n");
    write(tmp.path(), "root.yml", "data: !includeraw blob.txt\n");
    let doc =
        parse_file(&tmp.path().join("root.yml"), &ParseOptions::default())?;
    let map = doc.root.as_map()?;
    assert_eq!(
        map.get("data").unwrap().value.as_str()?,
        "not: [ yaml\n\ttabs ok here\n"
    );
    Ok(())
}

#[test]
fn test_nested_include_in_sequence() -> Result<(), Box<dyn std::error::Error>>
{
    let tmp = tempfile::tempdir()?;
    write(tmp.path(), "item.yml", "kind: widget\nsize: 3\n");
    write(
        tmp.path(),
        "root.yml",
        "- !include item.yml\n- !include item.yml\n  size: 5\n",
    );
    assert_eq!(
        pack_inline(tmp.path(), "root.yml")?,
        "- kind: widget\n  size: 3\n- kind: widget\n  size: 5\n"
    );
    Ok(())
}
