//! Interruption queue and the event rules that feed it
//!
//! Controllers from 0.19 watch a queue for spot interruption warnings,
//! rebalance recommendations, scheduled maintenance and instance state
//! changes, and drain affected nodes ahead of time.

use std::time::Duration;

use serde::Serialize;

use crate::constants::{QUEUE_RETENTION, QUEUE_SENDER_PRINCIPALS};
use crate::iam::{queue_arn_pattern, PolicyDocument, PolicyStatement, Principal};

/// Queue to declare
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name
    pub name: String,
    /// How long undelivered messages are kept
    pub retention: Duration,
    /// Resource policy admitting the event senders
    pub policy: PolicyDocument,
}

impl QueueSpec {
    /// Interruption queue for a cluster, named after it
    pub fn for_cluster(cluster_name: &str) -> Self {
        let senders = QUEUE_SENDER_PRINCIPALS
            .iter()
            .map(|p| p.to_string())
            .collect();

        Self {
            name: cluster_name.to_string(),
            retention: QUEUE_RETENTION,
            policy: PolicyDocument::new(vec![PolicyStatement::allow(&["sqs:SendMessage"])
                .for_principal(Principal::Service(senders))
                .on([queue_arn_pattern(cluster_name)])]),
        }
    }
}

/// EventBridge pattern matching on source and detail type
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventPattern {
    /// Event sources (e.g. `aws.ec2`)
    pub source: Vec<String>,
    /// Detail types
    #[serde(rename = "detail-type")]
    pub detail_type: Vec<String>,
}

/// Rule routing matching events to the interruption queue
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRuleSpec {
    /// Logical id of the rule
    pub id: String,
    /// Pattern to match
    pub pattern: EventPattern,
}

impl EventRuleSpec {
    fn new(id: &str, source: &str, detail_type: &str) -> Self {
        Self {
            id: id.to_string(),
            pattern: EventPattern {
                source: vec![source.to_string()],
                detail_type: vec![detail_type.to_string()],
            },
        }
    }
}

/// The four rules every interruption queue receives, in declaration order
pub fn interruption_rules() -> Vec<EventRuleSpec> {
    vec![
        EventRuleSpec::new("ScheduledChangeRule", "aws.health", "AWS Health Event"),
        EventRuleSpec::new(
            "SpotInterruptionRule",
            "aws.ec2",
            "EC2 Spot Instance Interruption Warning",
        ),
        EventRuleSpec::new(
            "RebalanceRule",
            "aws.ec2",
            "EC2 Instance Rebalance Recommendation",
        ),
        EventRuleSpec::new(
            "InstanceStateChangeRule",
            "aws.ec2",
            "EC2 Instance State-change Notification",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_is_named_after_cluster_and_admits_event_senders() {
        let queue = QueueSpec::for_cluster("prod");
        assert_eq!(queue.name, "prod");
        assert_eq!(queue.retention, Duration::from_secs(300));

        let json = serde_json::to_value(&queue.policy).expect("serialize");
        let statement = &json["Statement"][0];
        assert_eq!(statement["Action"][0], "sqs:SendMessage");
        assert_eq!(
            statement["Principal"]["Service"],
            serde_json::json!(["events.amazonaws.com", "sqs.amazonaws.com"])
        );
        assert_eq!(statement["Resource"][0], "arn:aws:sqs:*:*:prod");
    }

    #[test]
    fn four_rules_cover_health_and_ec2_events() {
        let rules = interruption_rules();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].pattern.source, vec!["aws.health"]);
        assert!(rules[1..].iter().all(|r| r.pattern.source == vec!["aws.ec2"]));

        let json = serde_json::to_value(&rules[1].pattern).expect("serialize");
        assert_eq!(
            json["detail-type"][0],
            "EC2 Spot Instance Interruption Warning"
        );
    }
}
