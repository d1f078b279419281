//! IAM documents for the controller and the nodes it launches
//!
//! Everything here is data: policy documents and role specs handed to the
//! [`IdentityProvisioner`](crate::engine::IdentityProvisioner). Documents
//! serialize to the IAM JSON policy grammar.

use std::collections::BTreeMap;

use serde::Serialize;

use karpenter_common::{KARPENTER_NAMESPACE, KARPENTER_SERVICE_ACCOUNT};

use crate::constants::{EC2_SERVICE_PRINCIPAL, NODE_MANAGED_POLICIES, STS_AUDIENCE};
use crate::engine::ManagedPolicyRef;
use crate::version::ControllerVersion;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Actions the controller needs on every supported release
const CONTROLLER_ACTIONS: &[&str] = &[
    // write
    "ec2:CreateLaunchTemplate",
    "ec2:CreateFleet",
    "ec2:RunInstances",
    "ec2:CreateTags",
    "iam:PassRole",
    "ec2:TerminateInstances",
    "ec2:DeleteLaunchTemplate",
    // read
    "ec2:DescribeLaunchTemplates",
    "ec2:DescribeInstances",
    "ec2:DescribeSecurityGroups",
    "ec2:DescribeSubnets",
    "ec2:DescribeInstanceTypes",
    "ec2:DescribeInstanceTypeOfferings",
    "ec2:DescribeAvailabilityZones",
    "ssm:GetParameter",
];

/// Read actions added alongside interruption handling
const INTERRUPTION_ERA_ACTIONS: &[&str] = &[
    "pricing:GetProducts",
    "eks:DescribeCluster",
    "ec2:DescribeImages",
    "ec2:DescribeSpotPriceHistory",
];

/// Queue actions scoped to the interruption queue
const QUEUE_CONSUMER_ACTIONS: &[&str] = &[
    "sqs:DeleteMessage",
    "sqs:GetQueueAttributes",
    "sqs:GetQueueUrl",
    "sqs:ReceiveMessage",
];

/// Statement effect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Effect {
    /// Grant
    Allow,
    /// Explicit deny
    Deny,
}

/// Who a statement applies to
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Principal {
    /// AWS service principals (e.g. `ec2.amazonaws.com`)
    Service(Vec<String>),
    /// Web identity federated through an OIDC provider ARN
    Federated(String),
}

/// Condition block: operator -> (key -> value)
pub type Conditions = BTreeMap<String, BTreeMap<String, String>>;

/// One IAM policy statement
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// Allow or deny
    pub effect: Effect,
    /// Principal, only set in trust and resource policies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    /// Actions
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    /// Resources, omitted in trust policies
    #[serde(rename = "Resource", skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Conditions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Conditions>,
}

impl PolicyStatement {
    /// Allow `actions` with no resource or principal set yet
    pub fn allow<S: AsRef<str>>(actions: &[S]) -> Self {
        Self {
            effect: Effect::Allow,
            principal: None,
            actions: actions.iter().map(|a| a.as_ref().to_string()).collect(),
            resources: Vec::new(),
            condition: None,
        }
    }

    /// Scope the statement to resources
    pub fn on(mut self, resources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the principal
    pub fn for_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Add a condition under `operator` (e.g. `StringEquals`)
    pub fn with_condition(
        mut self,
        operator: impl Into<String>,
        values: BTreeMap<String, String>,
    ) -> Self {
        self.condition
            .get_or_insert_with(BTreeMap::new)
            .entry(operator.into())
            .or_default()
            .extend(values);
        self
    }
}

/// IAM policy document
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Policy language version
    pub version: String,
    /// Statements
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    /// Document with the given statements
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    /// Every action across statements, in order
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.statement
            .iter()
            .flat_map(|s| s.actions.iter().map(String::as_str))
    }
}

/// Policy attached to a role
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManagedPolicy {
    /// AWS managed policy by name
    Aws(String),
    /// Customer managed policy declared earlier
    Customer(ManagedPolicyRef),
}

impl ManagedPolicy {
    /// Policy ARN
    pub fn arn(&self) -> String {
        match self {
            Self::Aws(name) => format!("arn:aws:iam::aws:policy/{name}"),
            Self::Customer(policy) => policy.arn.clone(),
        }
    }
}

/// Role to declare
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleSpec {
    /// Human readable description
    pub description: String,
    /// Trust (assume role) policy
    pub trust_policy: PolicyDocument,
    /// Attached managed policies
    pub managed_policies: Vec<ManagedPolicy>,
}

/// Service account subject the controller's web identity token carries
pub fn controller_subject() -> String {
    format!("system:serviceaccount:{KARPENTER_NAMESPACE}:{KARPENTER_SERVICE_ACCOUNT}")
}

/// ARN pattern for the interruption queue of a cluster
///
/// The queue is named after the cluster; region and account are wildcarded
/// so the controller policy can be declared before the queue exists.
pub fn queue_arn_pattern(queue_name: &str) -> String {
    format!("arn:aws:sqs:*:*:{queue_name}")
}

/// Managed policy attached to the controller role
pub fn controller_policy(version: ControllerVersion, queue_name: &str) -> PolicyDocument {
    let mut statements = vec![PolicyStatement::allow(CONTROLLER_ACTIONS).on(["*"])];

    if version.supports_interruption() {
        statements.push(PolicyStatement::allow(INTERRUPTION_ERA_ACTIONS).on(["*"]));
        statements
            .push(PolicyStatement::allow(QUEUE_CONSUMER_ACTIONS).on([queue_arn_pattern(queue_name)]));
    }

    PolicyDocument::new(statements)
}

/// Role assumed by nodes the controller launches
pub fn node_role(cluster_name: &str) -> RoleSpec {
    RoleSpec {
        description: format!(
            "This is the IAM role Karpenter uses to give compute permissions for {cluster_name}"
        ),
        trust_policy: PolicyDocument::new(vec![PolicyStatement::allow(&["sts:AssumeRole"])
            .for_principal(Principal::Service(vec![EC2_SERVICE_PRINCIPAL.to_string()]))]),
        managed_policies: NODE_MANAGED_POLICIES
            .iter()
            .map(|name| ManagedPolicy::Aws(name.to_string()))
            .collect(),
    }
}

/// Role the controller assumes through the cluster's OIDC provider
///
/// `oidc_issuer` is the issuer without scheme; the trust policy only admits
/// tokens minted for the controller's service account.
pub fn controller_role(
    cluster_name: &str,
    oidc_issuer: &str,
    oidc_provider_arn: &str,
    policy: &ManagedPolicyRef,
) -> RoleSpec {
    let conditions = BTreeMap::from([
        (format!("{oidc_issuer}:aud"), STS_AUDIENCE.to_string()),
        (format!("{oidc_issuer}:sub"), controller_subject()),
    ]);

    RoleSpec {
        description: format!(
            "This is the IAM role Karpenter uses to allocate compute for {cluster_name}"
        ),
        trust_policy: PolicyDocument::new(vec![PolicyStatement::allow(&[
            "sts:AssumeRoleWithWebIdentity",
        ])
        .for_principal(Principal::Federated(oidc_provider_arn.to_string()))
        .with_condition("StringEquals", conditions)]),
        managed_policies: vec![ManagedPolicy::Customer(policy.clone())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ResourceRef;

    const ISSUER: &str = "oidc.eks.us-west-2.amazonaws.com/id/ABC";

    fn policy_ref() -> ManagedPolicyRef {
        ManagedPolicyRef {
            resource: ResourceRef::new("ControllerPolicy"),
            name: "prod-ControllerPolicy".to_string(),
            arn: "arn:aws:iam::000000000000:policy/prod-ControllerPolicy".to_string(),
        }
    }

    #[test]
    fn legacy_controller_policy_is_one_wildcard_statement() {
        let doc = controller_policy(ControllerVersion::new(0, 6, 3), "prod");
        assert_eq!(doc.statement.len(), 1);
        assert_eq!(doc.statement[0].resources, vec!["*"]);
        assert!(doc.actions().any(|a| a == "iam:PassRole"));
        assert!(!doc.actions().any(|a| a.starts_with("sqs:")));
        assert!(!doc.actions().any(|a| a == "pricing:GetProducts"));
    }

    #[test]
    fn interruption_era_policy_scopes_queue_actions() {
        let doc = controller_policy(ControllerVersion::DEFAULT, "prod");
        assert_eq!(doc.statement.len(), 3);
        assert!(doc.actions().any(|a| a == "eks:DescribeCluster"));
        assert!(doc.actions().any(|a| a == "ec2:DescribeSpotPriceHistory"));

        let sqs = &doc.statement[2];
        assert!(sqs.actions.iter().all(|a| a.starts_with("sqs:")));
        assert_eq!(sqs.resources, vec!["arn:aws:sqs:*:*:prod"]);
    }

    #[test]
    fn policy_document_serializes_to_iam_grammar() {
        let doc = controller_policy(ControllerVersion::new(0, 6, 3), "prod");
        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["Version"], POLICY_VERSION);
        assert_eq!(json["Statement"][0]["Effect"], "Allow");
        assert_eq!(json["Statement"][0]["Resource"][0], "*");
        assert!(json["Statement"][0].get("Principal").is_none());
        assert!(json["Statement"][0].get("Condition").is_none());
    }

    #[test]
    fn node_role_trusts_ec2_and_attaches_worker_policies() {
        let role = node_role("prod");
        let json = serde_json::to_value(&role.trust_policy).expect("serialize");
        assert_eq!(
            json["Statement"][0]["Principal"]["Service"][0],
            "ec2.amazonaws.com"
        );
        assert!(json["Statement"][0].get("Resource").is_none());

        let arns: Vec<_> = role.managed_policies.iter().map(ManagedPolicy::arn).collect();
        assert_eq!(arns.len(), 4);
        assert!(arns.contains(&"arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy".to_string()));
        assert!(role.description.ends_with("prod"));
    }

    #[test]
    fn controller_role_only_trusts_the_controller_service_account() {
        let role = controller_role("prod", ISSUER, "arn:aws:iam::0:oidc-provider/x", &policy_ref());
        let json = serde_json::to_value(&role.trust_policy).expect("serialize");
        let statement = &json["Statement"][0];

        assert_eq!(statement["Action"][0], "sts:AssumeRoleWithWebIdentity");
        assert_eq!(
            statement["Principal"]["Federated"],
            "arn:aws:iam::0:oidc-provider/x"
        );
        let equals = &statement["Condition"]["StringEquals"];
        assert_eq!(equals[format!("{ISSUER}:aud")], "sts.amazonaws.com");
        assert_eq!(
            equals[format!("{ISSUER}:sub")],
            "system:serviceaccount:karpenter:karpenter"
        );

        assert_eq!(
            role.managed_policies,
            vec![ManagedPolicy::Customer(policy_ref())]
        );
    }
}
