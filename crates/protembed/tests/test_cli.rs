//! CLI binary tests using assert_cmd.
//!
//! These exercise the compiled `protembed` binary: argument parsing, help
//! text and the failure paths that do not need a model checkpoint.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("protembed").unwrap()
}

#[test]
fn no_args_shows_usage() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_embedding_kinds() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mean_pooled"))
        .stdout(predicate::str::contains("per_token"))
        .stdout(predicate::str::contains("substring_pooled"))
        .stdout(predicate::str::contains("attention_head"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("protembed"));
}

#[test]
fn missing_required_flags_fail() {
    cmd()
        .args(["--experiment_name", "exp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--model_name"));
}

#[test]
fn rejects_unknown_embedding_kind() {
    cmd()
        .args([
            "--experiment_name",
            "exp",
            "--model_name",
            "esm2_t6_8M_UR50D",
            "--fasta_path",
            "seqs.fasta",
            "--output_path",
            "out",
            "--extract_embeddings",
            "max_pooled",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn unknown_model_fails_before_output_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("seqs.fasta");
    fs::write(&fasta, ">p1\nMKT\n").unwrap();
    let out = dir.path().join("out");
    cmd()
        .args(["--experiment_name", "exp", "--model_name", "esm9000"])
        .arg("--fasta_path")
        .arg(&fasta)
        .arg("--output_path")
        .arg(&out)
        .args(["--extract_embeddings", "mean_pooled"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown model"));
    assert!(!out.exists());
}

#[test]
fn substring_pooled_without_table_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("seqs.fasta");
    fs::write(&fasta, ">p1\nMKT\n").unwrap();
    cmd()
        .args(["--experiment_name", "exp", "--model_name", "esm2_t6_8M_UR50D"])
        .arg("--fasta_path")
        .arg(&fasta)
        .arg("--output_path")
        .arg(dir.path().join("out"))
        .args(["--extract_embeddings", "substring_pooled"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("substring_path"));
}

// Downloads the smallest ESM2 checkpoint from the Hub. Run explicitly with
// `cargo test -- --ignored` when network access is available.
#[test]
#[ignore]
fn end_to_end_with_smallest_esm2() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("seqs.fasta");
    fs::write(&fasta, ">p1\nMKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQ\n").unwrap();
    let out = dir.path().join("out");
    cmd()
        .args([
            "--experiment_name",
            "exp",
            "--model_name",
            "esm2_t6_8M_UR50D",
            "--cpu",
        ])
        .arg("--fasta_path")
        .arg(&fasta)
        .arg("--output_path")
        .arg(&out)
        .args(["--extract_embeddings", "mean_pooled", "per_token"])
        .assert()
        .success();
    assert!(out.join("exp/mean_pooled/p1.safetensors").exists());
    assert!(out.join("exp/per_token/p1.safetensors").exists());
}
