//! Dependency graph scenarios, including the containment boundary.

use pretty_assertions::assert_eq;
use weave_conformance::{capture_logs, ProjectFixture};
use weave_graph::{build_graph, generate_dependency_graph};

#[test]
fn document_script_and_sourced_script() {
    let fx = ProjectFixture::with_inputs(&[
        ("ci.yml", "build:\n  script:\n    - ./a.sh\n"),
        ("a.sh", "#!/bin/bash\nsource ./b.sh\nmake\n"),
        ("b.sh", "export READY=1\n"),
    ]);
    let graph = build_graph(&fx.input_dir()).unwrap();
    assert_eq!(graph.edges(), vec![("a.sh", "b.sh"), ("ci.yml", "a.sh")]);
}

#[test]
fn sources_outside_the_root_are_not_followed() {
    let fx = ProjectFixture::with_inputs(&[
        ("ci.yml", "build:\n  script:\n    - ./a.sh\n"),
        ("a.sh", "source ./b.sh\n"),
        ("b.sh", "source ../etc/profile.sh\necho b\n"),
    ]);
    fx.write("etc/profile.sh", "echo outside\n");

    let (graph, logs) = capture_logs(|| build_graph(&fx.input_dir()).unwrap());
    assert_eq!(graph.edges(), vec![("a.sh", "b.sh"), ("ci.yml", "a.sh")]);
    assert!(graph.dependencies_of("b.sh").is_empty());
    assert!(logs.contains("Refusing to trace source outside the root"), "{logs}");
}

#[test]
fn dot_output_lists_every_edge() {
    let fx = ProjectFixture::with_inputs(&[
        ("ci.yml", "build:\n  script:\n    - bash scripts/a.sh\n"),
        ("scripts/a.sh", ". ./lib.sh\n"),
        ("scripts/lib.sh", "true\n"),
    ]);
    let dot = generate_dependency_graph(&fx.input_dir()).unwrap();
    assert!(dot.starts_with("digraph weave {"));
    assert!(dot.contains("    \"ci.yml\" -> \"scripts/a.sh\";\n"));
    assert!(dot.contains("    \"scripts/a.sh\" -> \"scripts/lib.sh\";\n"));
}

#[test]
fn missing_dependencies_are_logged_and_skipped() {
    let fx = ProjectFixture::with_inputs(&[("ci.yml", "build:\n  script:\n    - ./gone.sh\n")]);
    let (graph, logs) = capture_logs(|| build_graph(&fx.input_dir()).unwrap());
    assert_eq!(graph.edges(), vec![("ci.yml", "gone.sh")]);
    assert!(logs.contains("Dependency not found and will be skipped"), "{logs}");
}

#[test]
fn no_documents_means_empty_output() {
    let fx = ProjectFixture::with_inputs(&[("a.sh", "echo a\n")]);
    assert_eq!(generate_dependency_graph(&fx.input_dir()).unwrap(), "");
}
