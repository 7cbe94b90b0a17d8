// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use pretty_assertions::assert_eq;
use ryt_yaml::{PackEnv, ParseOptions, YamlNodeData, parse_file};

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

#[test]
fn test_subfile_recreated_with_override_block()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "inner.yml", "a: 3\nb: { c: c }\nc:\n  - 3\n  - 4");
    write(
        src.path(),
        "root.yml",
        "- !include inner.yml\n  a: 4\n  b: { new: true, c: ~ }\n  c: [ 5, 6 ]\n  d: ~",
    );
    let doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    let stream = env.pack_to_string(&doc)?;

    // The subfile on disk holds the pre-override content.
    assert_eq!(
        read(out.path(), "inner.yml"),
        "a: 3\nb: { c: c }\nc:\n  - 3\n  - 4\n"
    );
    // The stream replays the include line and the override block.
    assert_eq!(
        stream,
        "- !include inner.yml\n  a: 4\n  b:\n    new: true\n    c: ~\n  c:\n    - 5\n    - 6\n  d: ~\n"
    );
    Ok(())
}

#[test]
fn test_directory_pack_round_trips()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "inner.yml", "a: 3\nb: { c: c }\nc:\n  - 3\n  - 4");
    write(
        src.path(),
        "root.yml",
        "- !include inner.yml\n  a: 4\n  b: { new: true, c: ~ }\n  c: [ 5, 6 ]\n  d: ~",
    );
    let doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;
    let inline_once = PackEnv::new().pack_to_string(&doc)?;

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    env.pack_to_file(&doc, &out.path().join("root.yml"))?;

    // Parsing the recreated tree gives the same merged document back.
    let reparsed =
        parse_file(&out.path().join("root.yml"), &ParseOptions::default())?;
    assert_eq!(PackEnv::new().pack_to_string(&reparsed)?, inline_once);
    Ok(())
}

#[test]
fn test_unchanged_override_entries_are_not_replayed()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "inner.yml", "a: 3\nb: 4\n");
    // Overriding with the value already present records an entry whose
    // original equals the current data.
    write(src.path(), "root.yml", "!include inner.yml\na: 3\nb: 9\n");
    let doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    assert_eq!(
        env.pack_to_string(&doc)?,
        "!include inner.yml\nb: 9\n"
    );
    Ok(())
}

#[test]
fn test_divergent_shared_subfiles_get_suffixes()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "shared.yml", "v: 1\n");
    write(
        src.path(),
        "root.yml",
        "- !include shared.yml\n- !include shared.yml\n- !include shared.yml\n",
    );
    let mut doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;
    if let YamlNodeData::Sequence(items) = &mut doc.root.data {
        for (i, item) in items.iter_mut().enumerate().skip(1) {
            if let YamlNodeData::Map(map) = &mut item.data {
                map.get_mut("v").unwrap().value.data =
                    YamlNodeData::Uint(1 + i as u64);
            }
        }
    }

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    let stream = env.pack_to_string(&doc)?;
    assert_eq!(
        stream,
        "- !include shared.yml\n- !include shared~1.yml\n- !include shared~2.yml\n"
    );
    assert_eq!(read(out.path(), "shared.yml"), "v: 1\n");
    assert_eq!(read(out.path(), "shared~1.yml"), "v: 2\n");
    assert_eq!(read(out.path(), "shared~2.yml"), "v: 3\n");
    Ok(())
}

#[test]
fn test_identical_content_collapses_to_one_subfile()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "shared.yml", "v: 1\n");
    write(
        src.path(),
        "root.yml",
        "- !include shared.yml\n- !include shared.yml\n- !include shared.yml\n",
    );
    let mut doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;
    if let YamlNodeData::Sequence(items) = &mut doc.root.data {
        // Two of the three diverge the same way.
        for item in items.iter_mut().skip(1) {
            if let YamlNodeData::Map(map) = &mut item.data {
                map.get_mut("v").unwrap().value.data = YamlNodeData::Uint(9);
            }
        }
    }

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    let stream = env.pack_to_string(&doc)?;
    assert_eq!(
        stream,
        "- !include shared.yml\n- !include shared~1.yml\n- !include shared~1.yml\n"
    );
    assert!(!out.path().join("shared~2.yml").exists());
    Ok(())
}

#[test]
fn test_variable_templates_rebuilt_in_subfiles()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "grandchild.yml", "addr: \"$host:$port\"\n");
    write(src.path(), "child.yml", "!include grandchild.yml\n$port: 80\n");
    write(
        src.path(),
        "root.yml",
        "!include child.yml\n$host: website.org\n",
    );
    let doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    let stream = env.pack_to_string(&doc)?;

    assert_eq!(stream, "!include child.yml\n$host: website.org\n");
    assert_eq!(
        read(out.path(), "child.yml"),
        "!include grandchild.yml\n$port: 80\n"
    );
    assert_eq!(
        read(out.path(), "grandchild.yml"),
        "addr: \"$host:$port\"\n"
    );
    Ok(())
}

#[test]
fn test_raw_subfile_written_verbatim()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "blob.txt", "anything at all\n\teven tabs\n");
    write(src.path(), "root.yml", "data: !includeraw blob.txt\n");
    let doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    let stream = env.pack_to_string(&doc)?;
    assert_eq!(stream, "data: !includeraw blob.txt\n");
    assert_eq!(
        read(out.path(), "blob.txt"),
        "anything at all\n\teven tabs\n"
    );
    Ok(())
}

#[test]
fn test_raw_include_downgrades_when_not_a_string()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "blob.txt", "plain text\n");
    write(src.path(), "root.yml", "data: !includeraw blob.txt\n");
    let mut doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;
    if let YamlNodeData::Map(map) = &mut doc.root.data {
        map.get_mut("data").unwrap().value.data = YamlNodeData::Uint(5);
    }

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    let stream = env.pack_to_string(&doc)?;
    assert_eq!(stream, "data: !include blob.txt\n");
    assert_eq!(read(out.path(), "blob.txt"), "5\n");
    Ok(())
}

#[test]
fn test_no_subfiles_flag_inlines()
-> Result<(), Box<dyn std::error::Error>> {
    let src = tempfile::tempdir()?;
    write(src.path(), "inner.yml", "a: 3\n");
    write(src.path(), "root.yml", "!include inner.yml\na: 4\n");
    let doc =
        parse_file(&src.path().join("root.yml"), &ParseOptions::default())?;

    let out = tempfile::tempdir()?;
    let mut env = PackEnv::new();
    env.set_output_dir(out.path())?;
    env.set_no_subfiles(true);
    assert_eq!(env.pack_to_string(&doc)?, "a: 4\n");
    assert!(!out.path().join("inner.yml").exists());
    Ok(())
}
