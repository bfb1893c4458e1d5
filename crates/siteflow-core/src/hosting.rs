//! Site-hosting unit
//!
//! One stack per stage: private assets bucket, origin access control,
//! distribution, DNS record and the distribution id output the invalidate
//! step reads back.

use crate::cfn::{StackTemplate, get_att, import_value, reference, sub};
use crate::edge::{CLOUDFRONT_FUNCTION_CODE, INDEX_DOCUMENT};
use crate::model::{HostedZone, StageName, TargetEnvironment};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Stack output holding the distribution id
pub const DISTRIBUTION_ID_OUTPUT: &str = "CloudFrontDistributionId";
pub const DISTRIBUTION_DOMAIN_OUTPUT: &str = "CloudFrontDomainName";
pub const BUCKET_NAME_OUTPUT: &str = "BucketName";

/// Managed "CachingOptimized" cache policy
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// Hosted zone id shared by every CloudFront distribution alias target
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

const CNAME_TTL: &str = "300";
const ORIGIN_ID: &str = "AssetsOrigin";

const BUCKET: &str = "AssetsBucket";
const BUCKET_POLICY: &str = "AssetsBucketPolicy";
const ORIGIN_ACCESS_CONTROL: &str = "OriginAccessControl";
const REWRITE_FUNCTION: &str = "SpaRewriteFunction";
const DISTRIBUTION: &str = "Distribution";
const RECORD: &str = "SiteRecord";

/// Name of the hosting stack for a stage
pub fn hosting_stack_name(application: &str, stage: StageName) -> String {
    format!("{stage}-{application}CloudFrontStack-{stage}")
}

/// DNS record shape pointing the stage domain at its distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsRecord {
    /// `A` alias record (the apex cannot hold a CNAME)
    Alias,
    /// `CNAME` to the distribution domain name
    Cname,
}

impl DnsRecord {
    pub fn for_domain(domain: &str, apex_domain: &str) -> Self {
        if domain.eq_ignore_ascii_case(apex_domain) {
            DnsRecord::Alias
        } else {
            DnsRecord::Cname
        }
    }

    pub fn record_type(&self) -> &'static str {
        match self {
            DnsRecord::Alias => "A",
            DnsRecord::Cname => "CNAME",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteHostingUnit {
    pub application: String,

    pub stage: StageName,

    pub environment: TargetEnvironment,

    /// Domain served by this stage
    pub domain: String,

    pub apex_domain: String,

    pub hosted_zone: HostedZone,

    pub bucket_name: String,

    /// Export name of the shared certificate ARN
    pub certificate_export: String,

    /// Attach the SPA rewrite function on viewer requests
    pub edge_rewrite: bool,
}

impl SiteHostingUnit {
    pub fn stack_name(&self) -> String {
        hosting_stack_name(&self.application, self.stage)
    }

    pub fn dns_record(&self) -> DnsRecord {
        DnsRecord::for_domain(&self.domain, &self.apex_domain)
    }

    /// Export name of the distribution id output
    pub fn distribution_export(&self) -> String {
        format!("{DISTRIBUTION_ID_OUTPUT}-{}", self.stage)
    }

    fn rewrite_function_name(&self) -> String {
        // CloudFront function names: 64 chars of [a-zA-Z0-9-_]
        let name: String = format!("{}-{}-spa-rewrite", self.application, self.stage)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        name.chars().take(64).collect()
    }

    pub fn template(&self) -> StackTemplate {
        let mut template = StackTemplate::new(
            self.stack_name(),
            self.environment.clone(),
            format!("Create {} S3, CloudFront", self.application),
        );

        template.add_raw_resource(
            BUCKET,
            json!({
                "Type": "AWS::S3::Bucket",
                "DeletionPolicy": "Delete",
                "UpdateReplacePolicy": "Delete",
                "Properties": {
                    "BucketName": self.bucket_name,
                    "PublicAccessBlockConfiguration": {
                        "BlockPublicAcls": true,
                        "BlockPublicPolicy": true,
                        "IgnorePublicAcls": true,
                        "RestrictPublicBuckets": true
                    },
                    "BucketEncryption": {
                        "ServerSideEncryptionConfiguration": [{
                            "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                        }]
                    }
                }
            }),
        );

        template.add_resource(
            BUCKET_POLICY,
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": reference(BUCKET),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [
                        {
                            "Sid": "EnforceTls",
                            "Effect": "Deny",
                            "Principal": { "AWS": "*" },
                            "Action": "s3:*",
                            "Resource": [
                                get_att(BUCKET, "Arn"),
                                sub(&format!("${{{BUCKET}.Arn}}/*"))
                            ],
                            "Condition": { "Bool": { "aws:SecureTransport": "false" } }
                        },
                        {
                            "Sid": "AllowCloudFrontRead",
                            "Effect": "Allow",
                            "Principal": { "Service": "cloudfront.amazonaws.com" },
                            "Action": "s3:GetObject",
                            "Resource": sub(&format!("${{{BUCKET}.Arn}}/*")),
                            "Condition": {
                                "StringEquals": {
                                    "AWS:SourceArn": sub(&format!(
                                        "arn:aws:cloudfront::${{AWS::AccountId}}:distribution/${{{DISTRIBUTION}}}"
                                    ))
                                }
                            }
                        }
                    ]
                }
            }),
        );

        template.add_resource(
            ORIGIN_ACCESS_CONTROL,
            "AWS::CloudFront::OriginAccessControl",
            json!({
                "OriginAccessControlConfig": {
                    "Name": format!("{}-{}-oac", self.application, self.stage),
                    "OriginAccessControlOriginType": "s3",
                    "SigningBehavior": "no-override",
                    "SigningProtocol": "sigv4"
                }
            }),
        );

        let mut default_behavior = json!({
            "TargetOriginId": ORIGIN_ID,
            "ViewerProtocolPolicy": "redirect-to-https",
            "AllowedMethods": ["GET", "HEAD"],
            "CachedMethods": ["GET", "HEAD"],
            "Compress": true,
            "CachePolicyId": CACHING_OPTIMIZED_POLICY_ID
        });

        if self.edge_rewrite {
            template.add_resource(
                REWRITE_FUNCTION,
                "AWS::CloudFront::Function",
                json!({
                    "Name": self.rewrite_function_name(),
                    "AutoPublish": true,
                    "FunctionCode": CLOUDFRONT_FUNCTION_CODE,
                    "FunctionConfig": {
                        "Comment": format!("SPA rewrite for {}", self.domain),
                        "Runtime": "cloudfront-js-2.0"
                    }
                }),
            );
            default_behavior["FunctionAssociations"] = json!([{
                "EventType": "viewer-request",
                "FunctionARN": get_att(REWRITE_FUNCTION, "FunctionMetadata.FunctionARN")
            }]);
        }

        template.add_resource(
            DISTRIBUTION,
            "AWS::CloudFront::Distribution",
            json!({
                "DistributionConfig": {
                    "Enabled": true,
                    "Comment": format!("{} static site in {}", self.application, self.stage),
                    "Aliases": [self.domain],
                    "HttpVersion": "http2",
                    "Origins": [{
                        "Id": ORIGIN_ID,
                        "DomainName": get_att(BUCKET, "RegionalDomainName"),
                        "OriginAccessControlId": get_att(ORIGIN_ACCESS_CONTROL, "Id"),
                        "S3OriginConfig": { "OriginAccessIdentity": "" }
                    }],
                    "DefaultCacheBehavior": default_behavior,
                    "CustomErrorResponses": [{
                        "ErrorCode": 403,
                        "ResponseCode": 200,
                        "ResponsePagePath": INDEX_DOCUMENT,
                        "ErrorCachingMinTTL": 0
                    }],
                    "ViewerCertificate": {
                        "AcmCertificateArn": import_value(&self.certificate_export),
                        "SslSupportMethod": "sni-only",
                        "MinimumProtocolVersion": "TLSv1.2_2021"
                    },
                    "PriceClass": "PriceClass_All"
                }
            }),
        );

        let record = match self.dns_record() {
            DnsRecord::Alias => json!({
                "HostedZoneId": self.hosted_zone.id,
                "Name": self.domain,
                "Type": DnsRecord::Alias.record_type(),
                "AliasTarget": {
                    "DNSName": get_att(DISTRIBUTION, "DomainName"),
                    "HostedZoneId": CLOUDFRONT_HOSTED_ZONE_ID
                }
            }),
            DnsRecord::Cname => json!({
                "HostedZoneId": self.hosted_zone.id,
                "Name": self.domain,
                "Type": DnsRecord::Cname.record_type(),
                "TTL": CNAME_TTL,
                "ResourceRecords": [get_att(DISTRIBUTION, "DomainName")]
            }),
        };
        template.add_resource(RECORD, "AWS::Route53::RecordSet", record);

        template
            .add_output(
                DISTRIBUTION_ID_OUTPUT,
                reference(DISTRIBUTION),
                Some(self.distribution_export()),
            )
            .add_output(
                DISTRIBUTION_DOMAIN_OUTPUT,
                get_att(DISTRIBUTION, "DomainName"),
                None,
            )
            .add_output(BUCKET_NAME_OUTPUT, reference(BUCKET), None);

        template
    }
}
