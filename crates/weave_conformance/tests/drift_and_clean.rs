//! Drift detection and cleaning against real baselines on disk.

use pretty_assertions::assert_eq;
use weave_cache::{clean_outputs, detect_drift, DriftProblem, FsHashStore};
use weave_compile::CompileError;
use weave_conformance::ProjectFixture;

fn compiled_project() -> ProjectFixture {
    let fx = ProjectFixture::with_inputs(&[
        ("ci.yml", "build:\n  script:\n    - ./build.sh\n"),
        ("deploy.yml", "deploy:\n  script: make deploy\n"),
        ("build.sh", "make all\n"),
    ]);
    fx.compile();
    fx
}

#[test]
fn fresh_outputs_have_no_drift() {
    let fx = compiled_project();
    let report = detect_drift(&FsHashStore::new(fx.output_dir())).unwrap();
    assert_eq!(report.checked, 2);
    assert!(!report.has_drift());
}

#[test]
fn hand_edit_is_reported_with_a_diff() {
    let fx = compiled_project();
    let path = fx.output_dir().join("deploy.yml");
    std::fs::write(&path, "deploy:\n  script: make deploy-now\n").unwrap();

    let report = detect_drift(&FsHashStore::new(fx.output_dir())).unwrap();
    assert_eq!(report.drifted.len(), 1);
    let drifted = &report.drifted[0];
    assert_eq!(drifted.path, path);
    assert!(drifted.diff.contains("-  script: make deploy\n"));
    assert!(drifted.diff.contains("+  script: make deploy-now\n"));
}

#[test]
fn deleted_output_is_a_problem_not_drift() {
    let fx = compiled_project();
    std::fs::remove_file(fx.output_dir().join("deploy.yml")).unwrap();

    let report = detect_drift(&FsHashStore::new(fx.output_dir())).unwrap();
    assert!(report.drifted.is_empty());
    assert_eq!(report.problems.len(), 1);
    assert_eq!(report.problems[0].1, DriftProblem::MissingOutput);
}

#[test]
fn compile_refuses_to_overwrite_a_hand_edit() {
    let fx = compiled_project();
    let path = fx.output_dir().join("deploy.yml");
    std::fs::write(&path, "deploy:\n  script: make hotfix\n").unwrap();
    fx.write_input("deploy.yml", "deploy:\n  script: make deploy --all\n");

    let err = fx.try_compile().unwrap_err();
    let CompileError::DocumentsFailed { failures, .. } = err else {
        panic!("expected DocumentsFailed");
    };
    assert!(matches!(failures[0].1, CompileError::ManualEdit { .. }));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "deploy:\n  script: make hotfix\n"
    );

    let mut options = fx.options();
    options.force = true;
    weave_compile::run_compile(&options).unwrap();
    assert_eq!(fx.read_output("deploy.yml"), "deploy:\n  script: make deploy --all\n");
}

#[test]
fn clean_keeps_hand_edited_outputs() {
    let fx = compiled_project();
    let edited = fx.output_dir().join("deploy.yml");
    std::fs::write(&edited, "deploy:\n  script: make hotfix\n").unwrap();

    let store = FsHashStore::new(fx.output_dir());
    let preview = clean_outputs(&store, true).unwrap();
    assert_eq!(preview.removed, vec![fx.output_dir().join("ci.yml")]);
    assert!(fx.output_dir().join("ci.yml").exists());

    let report = clean_outputs(&store, false).unwrap();
    assert_eq!(report.removed, vec![fx.output_dir().join("ci.yml")]);
    assert_eq!(report.skipped, vec![edited.clone()]);
    assert!(!fx.output_dir().join("ci.yml").exists());
    assert!(edited.exists());
}
