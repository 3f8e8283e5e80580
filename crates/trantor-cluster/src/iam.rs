//! IAM documents for the load-balancer controller.

use serde::Serialize;
use trantor_core::{OutputRef, PropertyValue};

pub const POLICY_VERSION: &str = "2012-10-17";

/// Namespace and name of the controller's service account.
pub const CONTROLLER_NAMESPACE: &str = "kube-system";
pub const CONTROLLER_NAME: &str = "aws-load-balancer-controller";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: String,
    pub action: Vec<String>,
    pub resource: Vec<String>,
}

impl Statement {
    fn allow_all(actions: &[&str]) -> Self {
        Self {
            effect: "Allow".to_string(),
            action: actions.iter().map(|a| a.to_string()).collect(),
            resource: vec!["*".to_string()],
        }
    }
}

const EC2_ACTIONS: &[&str] = &[
    "ec2:DescribeAccountAttributes",
    "ec2:DescribeAddresses",
    "ec2:DescribeAvailabilityZones",
    "ec2:DescribeInternetGateways",
    "ec2:DescribeVpcs",
    "ec2:DescribeSubnets",
    "ec2:DescribeSecurityGroups",
    "ec2:DescribeInstances",
    "ec2:DescribeNetworkInterfaces",
    "ec2:DescribeTags",
    "ec2:CreateTags",
    "ec2:DeleteTags",
    "ec2:CreateSecurityGroup",
    "ec2:DeleteSecurityGroup",
    "ec2:AuthorizeSecurityGroupIngress",
    "ec2:RevokeSecurityGroupIngress",
];

const ELB_ACTIONS: &[&str] = &[
    "elasticloadbalancing:DescribeLoadBalancers",
    "elasticloadbalancing:DescribeLoadBalancerAttributes",
    "elasticloadbalancing:DescribeListeners",
    "elasticloadbalancing:DescribeListenerCertificates",
    "elasticloadbalancing:DescribeRules",
    "elasticloadbalancing:DescribeTargetGroups",
    "elasticloadbalancing:DescribeTargetGroupAttributes",
    "elasticloadbalancing:DescribeTargetHealth",
    "elasticloadbalancing:DescribeTags",
    "elasticloadbalancing:CreateLoadBalancer",
    "elasticloadbalancing:CreateListener",
    "elasticloadbalancing:CreateRule",
    "elasticloadbalancing:CreateTargetGroup",
    "elasticloadbalancing:ModifyLoadBalancerAttributes",
    "elasticloadbalancing:ModifyTargetGroupAttributes",
    "elasticloadbalancing:RegisterTargets",
    "elasticloadbalancing:DeregisterTargets",
    "elasticloadbalancing:DeleteLoadBalancer",
    "elasticloadbalancing:DeleteListener",
    "elasticloadbalancing:DeleteRule",
    "elasticloadbalancing:DeleteTargetGroup",
    "elasticloadbalancing:AddTags",
    "elasticloadbalancing:RemoveTags",
];

const IAM_ACTIONS: &[&str] = &[
    "iam:CreateServiceLinkedRole",
    "iam:GetServerCertificate",
    "iam:ListServerCertificates",
];

/// Permissions the controller needs to manage load balancers.
pub fn controller_policy() -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statement: vec![
            Statement::allow_all(EC2_ACTIONS),
            Statement::allow_all(ELB_ACTIONS),
            Statement::allow_all(IAM_ACTIONS),
        ],
    }
}

/// Trust policy letting the controller's service account assume the role
/// through the cluster's OIDC provider.
///
/// The condition key embeds the provider URL without its scheme, which is
/// only known once the cluster exists, so the document is assembled as an
/// interpolated string rather than a JSON map.
pub fn controller_trust_policy(provider_url: OutputRef, provider_arn: OutputRef) -> PropertyValue {
    let subject = format!("system:serviceaccount:{CONTROLLER_NAMESPACE}:{CONTROLLER_NAME}");
    PropertyValue::concat([
        PropertyValue::from(format!(
            r#"{{"Version":"{POLICY_VERSION}","Statement":[{{"Effect":"Allow","Principal":{{"Federated":""#
        )),
        provider_arn.into(),
        PropertyValue::from(
            r#""},"Action":"sts:AssumeRoleWithWebIdentity","Condition":{"StringEquals":{""#,
        ),
        PropertyValue::trim_prefix(provider_url, "https://"),
        PropertyValue::from(format!(r#":sub":"{subject}"}}}}}}]}}"#)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use trantor_core::resolve::{Attributes, OutputLookup, resolve};
    use trantor_core::StackOutputRef;

    struct Cluster(HashMap<String, Attributes>);

    impl OutputLookup for Cluster {
        fn resource_outputs(&self, resource: &str) -> Option<&Attributes> {
            self.0.get(resource)
        }

        fn stack_output(&self, _: &StackOutputRef) -> Option<&serde_json::Value> {
            None
        }
    }

    #[test]
    fn controller_policy_shape() {
        let doc = serde_json::to_value(controller_policy()).unwrap();
        assert_eq!(doc["Version"], "2012-10-17");
        let statements = doc["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 3);
        assert!(statements.iter().all(|s| s["Effect"] == "Allow" && s["Resource"][0] == "*"));
        assert_eq!(statements[1]["Action"].as_array().unwrap().len(), 23);
    }

    #[test]
    fn trust_policy_resolves_to_valid_json() {
        let policy = controller_trust_policy(
            OutputRef::new("dawn-cluster", "oidcProviderUrl"),
            OutputRef::new("dawn-cluster", "oidcProviderArn"),
        );
        let lookup = Cluster(HashMap::from([(
            "dawn-cluster".to_string(),
            Attributes::from([
                (
                    "oidcProviderUrl".to_string(),
                    serde_json::json!("https://oidc.eks.us-east-1.amazonaws.com/id/ABC123"),
                ),
                (
                    "oidcProviderArn".to_string(),
                    serde_json::json!("arn:aws:iam::123456789012:oidc-provider/oidc.eks.us-east-1.amazonaws.com/id/ABC123"),
                ),
            ]),
        )]));

        let resolved = resolve(&policy, &lookup).unwrap();
        let text = resolved.value.as_str().unwrap();
        let doc: serde_json::Value = serde_json::from_str(text).unwrap();
        let statement = &doc["Statement"][0];
        assert_eq!(statement["Action"], "sts:AssumeRoleWithWebIdentity");
        assert!(statement["Principal"]["Federated"].as_str().unwrap().starts_with("arn:aws:iam::"));
        assert_eq!(
            statement["Condition"]["StringEquals"]["oidc.eks.us-east-1.amazonaws.com/id/ABC123:sub"],
            "system:serviceaccount:kube-system:aws-load-balancer-controller"
        );
    }
}
