//! Integration tests for the synthesis commands
//!
//! Each test writes a config file the way an operator would and runs the
//! command against it, checking what lands on stdout.

use std::io::Write as _;

use karpenter_cli::commands::render::{self, OutputFormat, RenderArgs};
use karpenter_cli::commands::validate::{self, ValidateArgs};
use karpenter_cli::Error;

const CONFIG: &str = r#"
cluster:
  name: prod
  endpoint: https://ABC.gr7.us-west-2.eks.amazonaws.com
  oidcIssuer: https://oidc.eks.us-west-2.amazonaws.com/id/ABC
network:
  availabilityZones: [us-west-2a, us-west-2b]
  privateSubnetIds: [subnet-1, subnet-2]
karpenter:
  version: v0.27.3
  tags:
    team: platform
provisioners:
  - name: default
  - name: gpu
    requirements:
      instanceTypes: [g5.xlarge]
    consolidation: true
    limits:
      cpu: "64"
"#;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn render_json_lists_resources_in_dependency_order() {
    let file = write_config(CONFIG);
    let args = RenderArgs {
        file: file.path().to_path_buf(),
        output: OutputFormat::Json,
    };

    let mut out = Vec::new();
    render::run(&args, &mut out).expect("render");
    let rendered: serde_json::Value = serde_json::from_slice(&out).expect("json output");

    let ids: Vec<&str> = rendered["resources"]
        .as_array()
        .expect("resources")
        .iter()
        .filter_map(|r| r["id"].as_str())
        .collect();
    let position = |id: &str| ids.iter().position(|i| *i == id).expect("declared");

    assert!(position("NodeRole") < position("InstanceProfile"));
    assert!(position("HelmChart") < position("default-node-template"));
    assert!(position("gpu-node-template") < position("gpu"));
    assert_eq!(rendered["outputs"]["clusterName"], "prod");
    assert_eq!(rendered["outputs"]["interruptionQueueName"], "prod");
}

#[test]
fn render_yaml_is_the_default() {
    let file = write_config(CONFIG);
    let args = RenderArgs {
        file: file.path().to_path_buf(),
        output: OutputFormat::default(),
    };

    let mut out = Vec::new();
    render::run(&args, &mut out).expect("render");
    let rendered: serde_yaml::Value =
        serde_yaml::from_slice(&out).expect("yaml output");
    assert!(rendered["resources"].as_sequence().is_some_and(|r| !r.is_empty()));
}

#[test]
fn validate_reports_a_summary() {
    let file = write_config(CONFIG);
    let args = ValidateArgs {
        file: file.path().to_path_buf(),
    };

    let mut out = Vec::new();
    validate::run(&args, &mut out).expect("valid config");
    let summary = String::from_utf8(out).expect("utf8");
    assert!(summary.contains("valid"));
    assert!(summary.contains("4 provisioning documents"));
    assert!(summary.contains("0.27.3"));
}

#[test]
fn validate_returns_the_first_construct_error() {
    let broken = CONFIG.replace("consolidation: true", "consolidation: true\n    ttlSecondsAfterEmpty: 30");
    let file = write_config(&broken);
    let args = ValidateArgs {
        file: file.path().to_path_buf(),
    };

    let mut out = Vec::new();
    let err = validate::run(&args, &mut out).expect_err("timers conflict");
    match err {
        Error::Construct(inner) => {
            assert!(inner.is_configuration());
            assert_eq!(inner.policy(), Some("gpu"));
        }
        other => panic!("expected construct error, got {other}"),
    }
    assert!(out.is_empty());
}

#[test]
fn malformed_config_names_the_file() {
    let file = write_config("cluster: [not, a, map]\n");
    let args = ValidateArgs {
        file: file.path().to_path_buf(),
    };

    let err = validate::run(&args, &mut Vec::new()).expect_err("bad yaml");
    assert!(matches!(err, Error::ConfigParse { .. }));
    assert!(err
        .to_string()
        .contains(&file.path().display().to_string()));
}
