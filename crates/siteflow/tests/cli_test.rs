#![allow(deprecated)] // TODO: move from cargo_bin to cargo_bin_cmd!

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;

fn siteflow() -> Command {
    let mut cmd = Command::cargo_bin("siteflow").unwrap();
    cmd.env_remove("SITEFLOW_CONFIG_PATH");
    cmd
}

#[test]
fn test_cli_help() {
    siteflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("single-page site"))
        .stdout(predicate::str::contains("synth"))
        .stdout(predicate::str::contains("pipeline"))
        .stdout(predicate::str::contains("invalidate"));
}

#[test]
fn test_cli_version() {
    siteflow()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("siteflow"));
}

#[test]
fn test_invalid_command() {
    siteflow().arg("invalid-command").assert().failure();
}

#[test]
fn test_rewrite_paths() {
    siteflow()
        .args(["rewrite", "/about", "/assets/app.js", "/users/42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/about -> /index.html"))
        .stdout(predicate::str::contains("/assets/app.js -> /assets/app.js"))
        .stdout(predicate::str::contains("/users/42 -> /index.html"));
}

#[test]
fn test_rewrite_requires_uri() {
    siteflow().arg("rewrite").assert().failure();
}

#[test]
fn test_stages_lists_registry() {
    let project = TestProject::with_site();

    siteflow()
        .current_dir(project.path())
        .arg("stages")
        .assert()
        .success()
        .stdout(predicate::str::contains("dev"))
        .stdout(predicate::str::contains("dev.example.com"))
        .stdout(predicate::str::contains("(production)"))
        .stdout(predicate::str::contains("prod-example-static-assets"));
}

#[test]
fn test_stages_without_site_file() {
    let project = TestProject::new();

    siteflow()
        .current_dir(project.path())
        .env("HOME", project.path())
        .env("XDG_CONFIG_HOME", project.path())
        .arg("stages")
        .assert()
        .failure();
}

#[test]
fn test_duplicate_stage_is_rejected() {
    let project = TestProject::new();
    project.write_site_kdl(
        r#"
        application "ExampleSite"
        domain "example.com"
        account "123456789012"
        stage "prod" { bucket "prod-assets"; }
        stage "prod" { bucket "other-assets"; }
        "#,
    );

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .arg("stages")
        .assert()
        .failure()
        .stderr(predicate::str::contains("declared more than once"));
}

#[test]
fn test_region_outside_us_east_1_is_rejected() {
    let project = TestProject::new();
    project.write_site_kdl(
        r#"
        application "ExampleSite"
        domain "example.com"
        account "123456789012"
        region "eu-west-1"
        stage "dev" { bucket "dev-assets"; }
        stage "prod" { bucket "prod-assets"; }
        "#,
    );

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .arg("synth")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must deploy to us-east-1"));
}

#[test]
fn test_synth_requires_bucket_per_stage() {
    let project = TestProject::new();
    project.write_site_kdl(
        r#"
        application "ExampleSite"
        domain "example.com"
        account "123456789012"
        stage "dev" { bucket "dev-assets"; }
        "#,
    );

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .args(["synth", "--hosted-zone-id", "Z123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no assets bucket"));
}

#[test]
fn test_synth_writes_templates() {
    let project = TestProject::with_site();

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .args(["synth", "--hosted-zone-id", "Z123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 templates written"));

    let out = project.path().join("siteflow.out");
    for name in [
        "ExampleSitePipelineStack",
        "dev-ExampleSiteCloudFrontStack-dev",
        "dev-ExampleSiteLambdaStack-dev",
        "prod-ExampleSiteCloudFrontStack-prod",
    ] {
        let path = out.join(format!("{name}.template.json"));
        assert!(path.exists(), "{} missing", path.display());
    }

    let hosting = std::fs::read_to_string(
        out.join("prod-ExampleSiteCloudFrontStack-prod.template.json"),
    )
    .unwrap();
    let body: serde_json::Value = serde_json::from_str(&hosting).unwrap();
    assert_eq!(body["AWSTemplateFormatVersion"], "2010-09-09");
    assert!(body["Outputs"]["CloudFrontDistributionId"].is_object());
}

#[test]
fn test_synth_yaml_to_custom_dir() {
    let project = TestProject::with_site();
    let out = project.path().join("rendered");

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .args(["synth", "--hosted-zone-id", "Z123", "--format", "yaml", "--out"])
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("ExampleSitePipelineStack.template.yaml").exists());
}

#[test]
fn test_synth_rejects_unknown_format() {
    let project = TestProject::with_site();

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .args(["synth", "--hosted-zone-id", "Z123", "--format", "toml"])
        .assert()
        .failure();
}

#[test]
fn test_plan_json() {
    let project = TestProject::with_site();

    let output = siteflow()
        .arg("--config")
        .arg(project.site_file())
        .args(["plan", "--json", "--hosted-zone-id", "Z123"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["application"], "ExampleSite");

    let stages = plan["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 2);

    let prod_steps: Vec<_> = stages[1]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        prod_steps,
        vec!["manual_approval", "build", "deploy", "invalidate"]
    );
}

#[test]
fn test_plan_text_lists_steps() {
    let project = TestProject::with_site();

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .args(["plan", "--hosted-zone-id", "Z123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ApproveIfStable"))
        .stdout(predicate::str::contains("Build-FrontEnd-dev"))
        .stdout(predicate::str::contains("InvalidateCache-prod"));
}

#[test]
fn test_status_before_first_run() {
    let project = TestProject::with_site();

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("never run"));
}

#[test]
fn test_deploy_rejects_unknown_stage() {
    let project = TestProject::with_site();

    siteflow()
        .arg("--config")
        .arg(project.site_file())
        .args(["deploy", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage 'staging'"));
}
