use std::future::Future;
use std::time::Duration;

use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{
    AttributeBooleanValue, HttpTokensState, IamInstanceProfileSpecification,
    InstanceMetadataOptionsRequest, InstanceNetworkInterfaceSpecification, InstanceType,
    IpPermission, IpRange, Ipv6Range, Placement, ResourceType, Tag, TagSpecification,
};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use lazyvpn_core::network::{IngressRule, IngressSource, RouteDestination};
use lazyvpn_lambda::adapters::bucket_store::BucketStore;
use lazyvpn_lambda::adapters::network::{
    InstanceSpec, NetworkProvisioner, ResourceTags, SubnetSpec,
};
use lazyvpn_lambda::adapters::pause::Pause;
use lazyvpn_lambda::handlers::launch::{
    confirmation_message, handle_launch_request, parse_launch_event, LaunchHandlerConfig,
};
use lazyvpn_lambda::logging::log_error;
use lazyvpn_lambda::settings::LaunchSettings;
use serde_json::{json, Value};

fn run_blocking<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

fn provider_error(action: &str, error: impl std::error::Error) -> String {
    format!("failed to {action}: {}", DisplayErrorContext(error))
}

fn missing_id(action: &str, field: &str) -> String {
    format!("{action} response did not include {field}")
}

fn tag_specification(resource_type: ResourceType, tags: &ResourceTags) -> TagSpecification {
    let tags = tags
        .iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect();
    TagSpecification::builder()
        .resource_type(resource_type)
        .set_tags(Some(tags))
        .build()
}

fn ip_permission(rule: &IngressRule) -> IpPermission {
    let mut permission = IpPermission::builder().ip_protocol(rule.protocol);
    if let Some((from_port, to_port)) = rule.port_range {
        permission = permission.from_port(from_port).to_port(to_port);
    }
    match &rule.source {
        IngressSource::Ipv4Cidr(cidr) => permission
            .ip_ranges(
                IpRange::builder()
                    .cidr_ip(cidr)
                    .set_description(rule.description.map(str::to_string))
                    .build(),
            )
            .build(),
        IngressSource::Ipv6Cidr(cidr) => permission
            .ipv6_ranges(
                Ipv6Range::builder()
                    .cidr_ipv6(cidr)
                    .set_description(rule.description.map(str::to_string))
                    .build(),
            )
            .build(),
    }
}

struct Ec2NetworkProvisioner {
    ec2_client: aws_sdk_ec2::Client,
}

impl NetworkProvisioner for Ec2NetworkProvisioner {
    fn create_vpc(&self, cidr_block: &str, tags: &ResourceTags) -> Result<String, String> {
        let output = run_blocking(
            self.ec2_client
                .create_vpc()
                .cidr_block(cidr_block)
                .amazon_provided_ipv6_cidr_block(false)
                .tag_specifications(tag_specification(ResourceType::Vpc, tags))
                .send(),
        )
        .map_err(|error| provider_error("create vpc", error))?;

        output
            .vpc()
            .and_then(|vpc| vpc.vpc_id())
            .map(str::to_string)
            .ok_or_else(|| missing_id("CreateVpc", "a vpc id"))
    }

    fn request_ipv6_cidr_block(&self, vpc_id: &str) -> Result<(), String> {
        run_blocking(
            self.ec2_client
                .associate_vpc_cidr_block()
                .vpc_id(vpc_id)
                .amazon_provided_ipv6_cidr_block(true)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| provider_error("associate vpc cidr block", error))
    }

    fn vpc_ipv6_cidr_blocks(&self, vpc_id: &str) -> Result<Vec<String>, String> {
        let output = run_blocking(self.ec2_client.describe_vpcs().vpc_ids(vpc_id).send())
            .map_err(|error| provider_error("describe vpc", error))?;

        Ok(output
            .vpcs()
            .iter()
            .flat_map(|vpc| vpc.ipv6_cidr_block_association_set())
            .filter_map(|association| association.ipv6_cidr_block())
            .map(str::to_string)
            .collect())
    }

    fn create_subnet(&self, spec: &SubnetSpec, tags: &ResourceTags) -> Result<String, String> {
        let output = run_blocking(
            self.ec2_client
                .create_subnet()
                .vpc_id(&spec.vpc_id)
                .cidr_block(&spec.cidr_block)
                .ipv6_cidr_block(&spec.ipv6_cidr_block)
                .availability_zone(&spec.availability_zone)
                .tag_specifications(tag_specification(ResourceType::Subnet, tags))
                .send(),
        )
        .map_err(|error| provider_error("create subnet", error))?;

        output
            .subnet()
            .and_then(|subnet| subnet.subnet_id())
            .map(str::to_string)
            .ok_or_else(|| missing_id("CreateSubnet", "a subnet id"))
    }

    fn enable_ipv6_auto_assign(&self, subnet_id: &str) -> Result<(), String> {
        run_blocking(
            self.ec2_client
                .modify_subnet_attribute()
                .subnet_id(subnet_id)
                .assign_ipv6_address_on_creation(
                    AttributeBooleanValue::builder().value(true).build(),
                )
                .send(),
        )
        .map(|_| ())
        .map_err(|error| provider_error("modify subnet attribute", error))
    }

    fn create_internet_gateway(&self, tags: &ResourceTags) -> Result<String, String> {
        let output = run_blocking(
            self.ec2_client
                .create_internet_gateway()
                .tag_specifications(tag_specification(ResourceType::InternetGateway, tags))
                .send(),
        )
        .map_err(|error| provider_error("create internet gateway", error))?;

        output
            .internet_gateway()
            .and_then(|gateway| gateway.internet_gateway_id())
            .map(str::to_string)
            .ok_or_else(|| missing_id("CreateInternetGateway", "a gateway id"))
    }

    fn attach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<(), String> {
        run_blocking(
            self.ec2_client
                .attach_internet_gateway()
                .internet_gateway_id(gateway_id)
                .vpc_id(vpc_id)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| provider_error("attach internet gateway", error))
    }

    fn create_route_table(&self, vpc_id: &str, tags: &ResourceTags) -> Result<String, String> {
        let output = run_blocking(
            self.ec2_client
                .create_route_table()
                .vpc_id(vpc_id)
                .tag_specifications(tag_specification(ResourceType::RouteTable, tags))
                .send(),
        )
        .map_err(|error| provider_error("create route table", error))?;

        output
            .route_table()
            .and_then(|table| table.route_table_id())
            .map(str::to_string)
            .ok_or_else(|| missing_id("CreateRouteTable", "a route table id"))
    }

    fn create_route(
        &self,
        route_table_id: &str,
        destination: RouteDestination,
        gateway_id: &str,
    ) -> Result<(), String> {
        let request = self
            .ec2_client
            .create_route()
            .route_table_id(route_table_id)
            .gateway_id(gateway_id);
        let request = match destination {
            RouteDestination::AnyIpv4 => request.destination_cidr_block(destination.cidr()),
            RouteDestination::AnyIpv6 => request.destination_ipv6_cidr_block(destination.cidr()),
        };

        run_blocking(request.send())
            .map(|_| ())
            .map_err(|error| provider_error("create route", error))
    }

    fn associate_route_table(&self, route_table_id: &str, subnet_id: &str) -> Result<(), String> {
        run_blocking(
            self.ec2_client
                .associate_route_table()
                .route_table_id(route_table_id)
                .subnet_id(subnet_id)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| provider_error("associate route table", error))
    }

    fn create_security_group(
        &self,
        vpc_id: &str,
        name: &str,
        description: &str,
        tags: &ResourceTags,
    ) -> Result<String, String> {
        let output = run_blocking(
            self.ec2_client
                .create_security_group()
                .vpc_id(vpc_id)
                .group_name(name)
                .description(description)
                .tag_specifications(tag_specification(ResourceType::SecurityGroup, tags))
                .send(),
        )
        .map_err(|error| provider_error("create security group", error))?;

        output
            .group_id()
            .map(str::to_string)
            .ok_or_else(|| missing_id("CreateSecurityGroup", "a group id"))
    }

    fn authorize_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<(), String> {
        run_blocking(
            self.ec2_client
                .authorize_security_group_ingress()
                .group_id(group_id)
                .set_ip_permissions(Some(rules.iter().map(ip_permission).collect()))
                .send(),
        )
        .map(|_| ())
        .map_err(|error| provider_error("authorize security group ingress", error))
    }

    fn run_instance(&self, spec: &InstanceSpec, tags: &ResourceTags) -> Result<String, String> {
        let network_interface = InstanceNetworkInterfaceSpecification::builder()
            .device_index(0)
            .delete_on_termination(true)
            .associate_public_ip_address(true)
            .subnet_id(&spec.subnet_id)
            .groups(&spec.security_group_id)
            .build();

        let output = run_blocking(
            self.ec2_client
                .run_instances()
                .image_id(&spec.ami_id)
                .instance_type(InstanceType::from(spec.instance_type.as_str()))
                .min_count(1)
                .max_count(1)
                .key_name(&spec.key_name)
                .iam_instance_profile(
                    IamInstanceProfileSpecification::builder()
                        .name(&spec.instance_profile)
                        .build(),
                )
                .network_interfaces(network_interface)
                .placement(
                    Placement::builder()
                        .availability_zone(&spec.availability_zone)
                        .build(),
                )
                .user_data(&spec.user_data)
                .metadata_options(
                    InstanceMetadataOptionsRequest::builder()
                        .http_tokens(HttpTokensState::Required)
                        .build(),
                )
                .tag_specifications(tag_specification(ResourceType::Instance, tags))
                .send(),
        )
        .map_err(|error| provider_error("run instance", error))?;

        output
            .instances()
            .first()
            .and_then(|instance| instance.instance_id())
            .map(str::to_string)
            .ok_or_else(|| missing_id("RunInstances", "an instance id"))
    }

    fn delete_security_group(&self, group_id: &str) -> Result<(), String> {
        run_blocking(
            self.ec2_client
                .delete_security_group()
                .group_id(group_id)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| provider_error("delete security group", error))
    }

    fn delete_vpc(&self, vpc_id: &str) -> Result<(), String> {
        run_blocking(self.ec2_client.delete_vpc().vpc_id(vpc_id).send())
            .map(|_| ())
            .map_err(|error| provider_error("delete vpc", error))
    }
}

struct S3BucketStore {
    s3_client: aws_sdk_s3::Client,
}

impl BucketStore for S3BucketStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, String> {
        match run_blocking(self.s3_client.head_bucket().bucket(bucket).send()) {
            Ok(_) => Ok(true),
            Err(error) => {
                if error
                    .as_service_error()
                    .is_some_and(|service_error| service_error.is_not_found())
                {
                    Ok(false)
                } else {
                    Err(provider_error("head bucket", error))
                }
            }
        }
    }

    fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), String> {
        let mut request = self.s3_client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint.
        if region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match run_blocking(request.send()) {
            Ok(_) => Ok(()),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service_error| service_error.is_bucket_already_owned_by_you()) =>
            {
                Ok(())
            }
            Err(error) => Err(provider_error("create bucket", error)),
        }
    }
}

struct RuntimePause;

impl Pause for RuntimePause {
    fn pause(&self, duration: Duration) {
        run_blocking(tokio::time::sleep(duration));
    }
}

async fn load_region_config(region: &str) -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<String, Error> {
    let request = parse_launch_event(event.payload).map_err(|error| {
        log_error(
            "launch_lambda",
            "launch_rejected",
            json!({
                "request_id": event.context.request_id.clone(),
                "error": error.message.clone(),
            }),
        );
        Error::from(error.to_string())
    })?;

    let settings = LaunchSettings::from_env().map_err(Error::from)?;
    let ec2_config = load_region_config(&request.region).await;
    let s3_config = load_region_config(&settings.bucket_region).await;

    let provisioner = Ec2NetworkProvisioner {
        ec2_client: aws_sdk_ec2::Client::new(&ec2_config),
    };
    let bucket_store = S3BucketStore {
        s3_client: aws_sdk_s3::Client::new(&s3_config),
    };
    let config = LaunchHandlerConfig {
        settings,
        invocation_id: event.context.request_id.clone(),
    };

    let outcome = handle_launch_request(
        &request,
        &config,
        &provisioner,
        &bucket_store,
        &RuntimePause,
    )
    .map_err(|error| Error::from(error.to_string()))?;
    Ok(confirmation_message(&outcome))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
