use assert_cmd::Command;
use cxxgraph_ast::{Ast, CursorKind, NodeData};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const MAIN_CPP: &str = "int helper() { return 1; }\n\nint main() {\n    return helper();\n}\n";

#[allow(deprecated)]
fn cxxgraph(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cxxgraph").expect("binary");
    cmd.current_dir(workdir).env_remove("RUST_LOG");
    cmd
}

fn has_edge(body: &Value, source: &str, target: &str, relation: &str) -> bool {
    body["edges"].as_array().is_some_and(|edges| {
        edges.iter().any(|edge| {
            edge["source"] == source && edge["target"] == target && edge["relation"] == relation
        })
    })
}

fn node_ids(body: &Value) -> Vec<String> {
    body["nodes"]
        .as_array()
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|node| node["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn graph_prints_json_to_stdout() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("main.cpp"), MAIN_CPP).unwrap();

    let output = cxxgraph(root)
        .args(["--quiet", "graph", "main.cpp", "--format", "json", "--project-root"])
        .arg(root)
        .output()
        .expect("command run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let ids = node_ids(&body);
    assert!(ids.contains(&"main.cpp".to_string()), "nodes: {ids:?}");
    assert!(has_edge(&body, "main.cpp", "main.cpp#main()", "contains_function"));
    assert!(has_edge(&body, "main.cpp#main()", "main.cpp#helper()", "calls_function"));
}

#[test]
fn graph_defaults_to_gml() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("main.cpp"), MAIN_CPP).unwrap();

    cxxgraph(root)
        .args(["-q", "graph", "main.cpp", "--project-root"])
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph [\n  directed 1\n"))
        .stdout(predicate::str::contains("relation \"calls_function\""))
        .stdout(predicate::str::contains("label \"main.cpp#helper()\""));
}

#[test]
fn graph_writes_output_file_and_ast_dump() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("main.cpp"), MAIN_CPP).unwrap();

    cxxgraph(root)
        .args(["-q", "graph", "main.cpp", "-o", "out/main.graphml", "--dump-ast", "main.ast.txt"])
        .arg("--project-root")
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let graphml = fs::read_to_string(root.join("out/main.graphml")).unwrap();
    assert!(graphml.contains("edgedefault=\"directed\""));
    assert!(graphml.contains("<node id=\"main.cpp#helper()\">"));

    let dump = fs::read_to_string(root.join("main.ast.txt")).unwrap();
    assert!(dump.contains("FUNCTION_DECL 'helper'"), "dump:\n{dump}");
    assert!(dump.contains("[in]"));
}

#[test]
fn graph_reads_json_ast_dumps() {
    let temp = tempdir().unwrap();
    let root = temp.path();

    let file = "/proj/app.cpp";
    let mut ast = Ast::for_translation_unit(file);
    let tu = ast.root_id();
    let helper = ast.add_child(tu, NodeData::new(CursorKind::FunctionDecl, "helper").at(file, 1, 5));
    let main = ast.add_child(
        tu,
        NodeData::new(CursorKind::FunctionDecl, "main").at(file, 3, 5).spanning(3, 5),
    );
    let call = ast.add_child(main, NodeData::new(CursorKind::CallExpr, "helper").at(file, 4, 12));
    ast.set_referenced(call, helper);
    ast.to_writer(fs::File::create(root.join("app.json")).unwrap()).unwrap();

    let output = cxxgraph(root)
        .args(["-q", "graph", "app.json", "-f", "json", "--project-root", "/proj"])
        .output()
        .expect("command run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let mut ids = node_ids(&body);
    ids.sort();
    assert_eq!(ids, vec!["app.cpp", "app.cpp#helper()", "app.cpp#main()"]);
    assert!(has_edge(&body, "app.cpp#main()", "app.cpp#helper()", "calls_function"));
}

#[test]
fn graph_rejects_unknown_format() {
    let temp = tempdir().unwrap();
    cxxgraph(temp.path())
        .args(["graph", "main.cpp", "--format", "dot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dot"));
}

#[test]
fn graph_fails_on_missing_input() {
    let temp = tempdir().unwrap();
    cxxgraph(temp.path())
        .args(["-q", "graph", "missing.cpp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.cpp"));
}

#[test]
fn config_file_selects_format() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("main.cpp"), MAIN_CPP).unwrap();
    fs::write(root.join("cxxgraph.toml"), "[output]\nformat = \"json\"\n").unwrap();

    let output = cxxgraph(root)
        .args(["-q", "graph", "main.cpp", "--project-root"])
        .arg(root)
        .output()
        .expect("command run");
    assert!(output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert!(body["nodes"].is_array());
}

fn setup_batch_project(root: &Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("build")).unwrap();
    fs::write(root.join("src/a.cpp"), MAIN_CPP).unwrap();
    fs::write(
        root.join("src/b.cpp"),
        "int helper();\n\nint twice() {\n    return helper() + helper();\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("build/compile_commands.json"),
        r#"[
            {"directory": ".", "file": "../src/a.cpp", "command": "c++ -c ../src/a.cpp"},
            {"directory": ".", "file": "../src/b.cpp", "arguments": ["c++", "-c", "../src/b.cpp"]},
            {"directory": ".", "file": "../src/gone.cpp", "command": "c++ -c ../src/gone.cpp"}
        ]"#,
    )
    .unwrap();
}

#[test]
fn batch_writes_per_unit_and_merged_graphs() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    setup_batch_project(root);

    cxxgraph(root)
        .args(["-q", "batch", ".", "--out-dir", "graphs", "--merge", "all.json", "-j", "2"])
        .assert()
        .success();

    assert!(root.join("graphs/src#a.cpp.json").is_file());
    assert!(root.join("graphs/src#b.cpp.json").is_file());
    assert!(!root.join("graphs/src#gone.cpp.json").exists());

    let merged: Value = serde_json::from_str(&fs::read_to_string(root.join("all.json")).unwrap()).unwrap();
    let ids = node_ids(&merged);
    assert!(ids.contains(&"src/a.cpp".to_string()), "nodes: {ids:?}");
    assert!(ids.contains(&"src/b.cpp".to_string()), "nodes: {ids:?}");
    assert!(has_edge(&merged, "src/a.cpp#main()", "src/a.cpp#helper()", "calls_function"));
}

#[test]
fn batch_requires_an_output_target() {
    let temp = tempdir().unwrap();
    cxxgraph(temp.path()).args(["batch", "."]).assert().failure();
}

#[test]
fn batch_fails_without_databases() {
    let temp = tempdir().unwrap();
    cxxgraph(temp.path())
        .args(["-q", "batch", ".", "--merge", "all.gml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("compile_commands.json"));
}
