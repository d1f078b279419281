//! Helm release for the Karpenter controller
//!
//! Chart coordinates and values move between controller releases: the
//! repository switched to OCI at 0.17, and from 0.19 cluster settings live
//! under `settings.aws` next to the interruption queue name.

use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use karpenter_common::KARPENTER_NAMESPACE;

use crate::constants::{
    CHART_NAME, CHART_TIMEOUT, LEGACY_CHART_REPOSITORY, OCI_CHART_REPOSITORY, ROLE_ARN_ANNOTATION,
};
use crate::version::ControllerVersion;

/// A Helm release to install
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChart {
    /// Chart name
    pub chart: String,
    /// Release name
    pub release: String,
    /// Target namespace
    pub namespace: String,
    /// Chart repository URL
    pub repository: String,
    /// Chart version
    pub version: String,
    /// Create the namespace if missing
    pub create_namespace: bool,
    /// Wait for the release's resources to become ready
    pub wait: bool,
    /// How long to wait
    #[serde(serialize_with = "as_seconds")]
    pub timeout: Duration,
    /// Chart values
    pub values: serde_json::Value,
}

fn as_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Cluster facts the chart values are rendered from
#[derive(Clone, Debug)]
pub struct ChartSettings<'a> {
    /// EKS cluster name
    pub cluster_name: &'a str,
    /// API server endpoint
    pub cluster_endpoint: &'a str,
    /// ARN of the controller role, annotated on the service account
    pub controller_role_arn: &'a str,
    /// Instance profile nodes launch with unless a template overrides it
    pub instance_profile: &'a str,
    /// Interruption queue, only used by releases that support it
    pub interruption_queue: Option<&'a str>,
}

impl HelmChart {
    /// Karpenter controller release for `version`
    pub fn karpenter(version: ControllerVersion, settings: &ChartSettings<'_>) -> Self {
        let repository = if version.uses_oci_chart() {
            OCI_CHART_REPOSITORY
        } else {
            LEGACY_CHART_REPOSITORY
        };

        Self {
            chart: CHART_NAME.to_string(),
            release: CHART_NAME.to_string(),
            namespace: KARPENTER_NAMESPACE.to_string(),
            repository: repository.to_string(),
            version: version.chart_version(),
            create_namespace: true,
            wait: true,
            timeout: CHART_TIMEOUT,
            values: chart_values(version, settings),
        }
    }
}

fn chart_values(version: ControllerVersion, settings: &ChartSettings<'_>) -> serde_json::Value {
    let service_account = json!({
        "annotations": { ROLE_ARN_ANNOTATION: settings.controller_role_arn }
    });

    if !version.supports_interruption() {
        return json!({
            "clusterName": settings.cluster_name,
            "clusterEndpoint": settings.cluster_endpoint,
            "serviceAccount": service_account,
            "aws": { "defaultInstanceProfile": settings.instance_profile },
        });
    }

    let mut aws = json!({
        "clusterName": settings.cluster_name,
        "clusterEndpoint": settings.cluster_endpoint,
        "defaultInstanceProfile": settings.instance_profile,
    });
    if let Some(queue) = settings.interruption_queue {
        aws["interruptionQueueName"] = json!(queue);
    }

    json!({
        "serviceAccount": service_account,
        "settings": { "aws": aws },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ChartSettings<'static> {
        ChartSettings {
            cluster_name: "prod",
            cluster_endpoint: "https://ABC.gr7.us-west-2.eks.amazonaws.com",
            controller_role_arn: "arn:aws:iam::000000000000:role/prod-ControllerRole",
            instance_profile: "KarpenterNodeInstanceProfile-prod",
            interruption_queue: Some("prod"),
        }
    }

    #[test]
    fn legacy_release_uses_http_repository_and_flat_values() {
        let chart = HelmChart::karpenter(ControllerVersion::new(0, 6, 3), &settings());
        assert_eq!(chart.repository, "https://charts.karpenter.sh");
        assert_eq!(chart.version, "0.6.3");
        assert_eq!(chart.values["clusterName"], "prod");
        assert_eq!(
            chart.values["aws"]["defaultInstanceProfile"],
            "KarpenterNodeInstanceProfile-prod"
        );
        assert!(chart.values.get("settings").is_none());
    }

    #[test]
    fn current_release_uses_oci_and_settings_block() {
        let chart = HelmChart::karpenter(ControllerVersion::DEFAULT, &settings());
        assert_eq!(chart.repository, "oci://public.ecr.aws/karpenter/karpenter");
        assert_eq!(chart.version, "v0.27.3");

        let aws = &chart.values["settings"]["aws"];
        assert_eq!(aws["clusterName"], "prod");
        assert_eq!(aws["interruptionQueueName"], "prod");
        assert!(chart.values.get("clusterName").is_none());
    }

    #[test]
    fn every_release_annotates_the_service_account() {
        for version in [ControllerVersion::new(0, 6, 3), ControllerVersion::DEFAULT] {
            let chart = HelmChart::karpenter(version, &settings());
            assert_eq!(
                chart.values["serviceAccount"]["annotations"]["eks.amazonaws.com/role-arn"],
                "arn:aws:iam::000000000000:role/prod-ControllerRole"
            );
        }
    }

    #[test]
    fn release_settings_are_fixed() {
        let chart = HelmChart::karpenter(ControllerVersion::DEFAULT, &settings());
        assert_eq!(chart.namespace, "karpenter");
        assert_eq!(chart.release, "karpenter");
        assert!(chart.create_namespace);
        assert!(chart.wait);

        let json = serde_json::to_value(&chart).expect("serialize");
        assert_eq!(json["timeout"], 900);
        assert_eq!(json["createNamespace"], true);
    }
}
