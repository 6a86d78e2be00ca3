use std::time::Instant;

use lazyvpn_core::boot_script::{client_profile_uri, BootScript};
use lazyvpn_core::contract::{launch_id, normalize_request, LaunchRequest, NormalizedLaunchRequest};
use lazyvpn_core::network::{
    ingress_rules, resource_tags, DEFAULT_ROUTES, SECURITY_GROUP_DESCRIPTION,
    SECURITY_GROUP_NAME, SUBNET_CIDR_BLOCK, VPC_CIDR_BLOCK,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::adapters::bucket_store::BucketStore;
use crate::adapters::network::{InstanceSpec, NetworkProvisioner, ResourceTags, SubnetSpec};
use crate::adapters::pause::Pause;
use crate::logging::{log_error, log_info, log_warn};
use crate::settings::LaunchSettings;

const COMPONENT: &str = "launch_handler";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStep {
    ValidateRequest,
    CreateVpc,
    RequestIpv6Cidr,
    DescribeVpc,
    WaitIpv6Cidr,
    CreateSubnet,
    EnableIpv6AutoAssign,
    CreateInternetGateway,
    AttachInternetGateway,
    CreateRouteTable,
    CreateRoute,
    AssociateRouteTable,
    CreateSecurityGroup,
    AuthorizeIngress,
    RunInstance,
    EnsureBucket,
}

impl LaunchStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidateRequest => "validate_request",
            Self::CreateVpc => "create_vpc",
            Self::RequestIpv6Cidr => "request_ipv6_cidr",
            Self::DescribeVpc => "describe_vpc",
            Self::WaitIpv6Cidr => "wait_ipv6_cidr",
            Self::CreateSubnet => "create_subnet",
            Self::EnableIpv6AutoAssign => "enable_ipv6_auto_assign",
            Self::CreateInternetGateway => "create_internet_gateway",
            Self::AttachInternetGateway => "attach_internet_gateway",
            Self::CreateRouteTable => "create_route_table",
            Self::CreateRoute => "create_route",
            Self::AssociateRouteTable => "associate_route_table",
            Self::CreateSecurityGroup => "create_security_group",
            Self::AuthorizeIngress => "authorize_ingress",
            Self::RunInstance => "run_instance",
            Self::EnsureBucket => "ensure_bucket",
        }
    }
}

impl std::fmt::Display for LaunchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchError {
    pub step: LaunchStep,
    pub message: String,
    pub cleanup_attempted: bool,
}

impl LaunchError {
    fn new(step: LaunchStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            cleanup_attempted: false,
        }
    }
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}

impl std::error::Error for LaunchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchHandlerConfig {
    pub settings: LaunchSettings,
    /// Lambda request id, mixed into the launch id.
    pub invocation_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub launch_id: String,
    pub region: String,
    pub vpc_id: String,
    pub ipv6_cidr_block: String,
    pub subnet_id: String,
    pub internet_gateway_id: String,
    pub route_table_id: String,
    pub security_group_id: String,
    pub instance_id: String,
    pub bucket: String,
    pub bucket_created: bool,
    pub client_profile_uri: String,
}

struct NetworkResources {
    ipv6_cidr_block: String,
    subnet_id: String,
    internet_gateway_id: String,
    route_table_id: String,
    security_group_id: String,
    instance_id: String,
}

#[derive(Default)]
struct RollbackTargets {
    security_group_id: Option<String>,
}

pub fn parse_launch_event(event: Value) -> Result<NormalizedLaunchRequest, LaunchError> {
    if event.is_null() {
        return Err(LaunchError::new(
            LaunchStep::ValidateRequest,
            "received nil event",
        ));
    }

    let request = serde_json::from_value::<LaunchRequest>(event).map_err(|error| {
        LaunchError::new(
            LaunchStep::ValidateRequest,
            format!("Malformed request: {error}"),
        )
    })?;

    normalize_request(request)
        .map_err(|error| LaunchError::new(LaunchStep::ValidateRequest, error.message()))
}

pub fn handle_launch_request(
    request: &NormalizedLaunchRequest,
    config: &LaunchHandlerConfig,
    provisioner: &impl NetworkProvisioner,
    bucket_store: &impl BucketStore,
    pause: &impl Pause,
) -> Result<LaunchOutcome, LaunchError> {
    let started_at = Instant::now();
    let launch_id = launch_id(request, &config.invocation_id);
    let tags = resource_tags(&launch_id);

    log_info(
        COMPONENT,
        "launch_started",
        json!({
            "launch_id": launch_id.clone(),
            "region": request.region.clone(),
            "instance_type": request.instance_type.clone(),
            "availability_zone": request.region_config.availability_zone,
        }),
    );

    let vpc_id = record_step(
        &launch_id,
        LaunchStep::CreateVpc,
        provisioner.create_vpc(VPC_CIDR_BLOCK, &tags),
    )
    .map_err(|error| report_failure(&launch_id, error))?;

    let mut rollback = RollbackTargets::default();
    let resources = match provision_network_and_instance(
        request,
        config,
        provisioner,
        pause,
        &launch_id,
        &tags,
        &vpc_id,
        &mut rollback,
    ) {
        Ok(value) => value,
        Err(mut error) => {
            roll_back(provisioner, &launch_id, &vpc_id, &rollback);
            error.cleanup_attempted = true;
            return Err(report_failure(&launch_id, error));
        }
    };

    let bucket = config.settings.export_bucket.clone();
    let bucket_created = ensure_bucket(bucket_store, &config.settings)
        .map_err(|error| report_failure(&launch_id, error))?;
    log_info(
        COMPONENT,
        "bucket_ready",
        json!({
            "launch_id": launch_id.clone(),
            "bucket": bucket.clone(),
            "bucket_region": config.settings.bucket_region.clone(),
            "created": bucket_created,
        }),
    );

    let outcome = LaunchOutcome {
        launch_id,
        region: request.region.clone(),
        vpc_id,
        ipv6_cidr_block: resources.ipv6_cidr_block,
        subnet_id: resources.subnet_id,
        internet_gateway_id: resources.internet_gateway_id,
        route_table_id: resources.route_table_id,
        security_group_id: resources.security_group_id,
        instance_id: resources.instance_id,
        client_profile_uri: client_profile_uri(&bucket),
        bucket,
        bucket_created,
    };

    log_info(
        COMPONENT,
        "launch_completed",
        json!({
            "outcome": outcome.clone(),
            "duration_ms": started_at.elapsed().as_millis(),
        }),
    );
    Ok(outcome)
}

pub fn confirmation_message(outcome: &LaunchOutcome) -> String {
    format!(
        "Ec2 {} created in {} region!",
        outcome.instance_id, outcome.region
    )
}

#[allow(clippy::too_many_arguments)]
fn provision_network_and_instance(
    request: &NormalizedLaunchRequest,
    config: &LaunchHandlerConfig,
    provisioner: &impl NetworkProvisioner,
    pause: &impl Pause,
    launch_id: &str,
    tags: &ResourceTags,
    vpc_id: &str,
    rollback: &mut RollbackTargets,
) -> Result<NetworkResources, LaunchError> {
    record_step(
        launch_id,
        LaunchStep::RequestIpv6Cidr,
        provisioner.request_ipv6_cidr_block(vpc_id),
    )?;
    let ipv6_cidr_block = wait_for_ipv6_cidr(provisioner, pause, &config.settings, vpc_id)?;

    let subnet_id = record_step(
        launch_id,
        LaunchStep::CreateSubnet,
        provisioner.create_subnet(
            &SubnetSpec {
                vpc_id: vpc_id.to_string(),
                cidr_block: SUBNET_CIDR_BLOCK.to_string(),
                ipv6_cidr_block: ipv6_cidr_block.clone(),
                availability_zone: request.region_config.availability_zone.to_string(),
            },
            tags,
        ),
    )?;
    record_step(
        launch_id,
        LaunchStep::EnableIpv6AutoAssign,
        provisioner.enable_ipv6_auto_assign(&subnet_id),
    )?;

    let internet_gateway_id = record_step(
        launch_id,
        LaunchStep::CreateInternetGateway,
        provisioner.create_internet_gateway(tags),
    )?;
    record_step(
        launch_id,
        LaunchStep::AttachInternetGateway,
        provisioner.attach_internet_gateway(&internet_gateway_id, vpc_id),
    )?;

    let route_table_id = record_step(
        launch_id,
        LaunchStep::CreateRouteTable,
        provisioner.create_route_table(vpc_id, tags),
    )?;
    for destination in DEFAULT_ROUTES {
        record_step(
            launch_id,
            LaunchStep::CreateRoute,
            provisioner.create_route(&route_table_id, destination, &internet_gateway_id),
        )?;
    }
    record_step(
        launch_id,
        LaunchStep::AssociateRouteTable,
        provisioner.associate_route_table(&route_table_id, &subnet_id),
    )?;

    let security_group_id = record_step(
        launch_id,
        LaunchStep::CreateSecurityGroup,
        provisioner.create_security_group(
            vpc_id,
            SECURITY_GROUP_NAME,
            SECURITY_GROUP_DESCRIPTION,
            tags,
        ),
    )?;
    rollback.security_group_id = Some(security_group_id.clone());

    record_step(
        launch_id,
        LaunchStep::AuthorizeIngress,
        provisioner.authorize_ingress(
            &security_group_id,
            &ingress_rules(request.public_ip_v4, request.public_ip_v6),
        ),
    )?;

    let instance_spec = InstanceSpec {
        ami_id: request.region_config.ami_id.to_string(),
        instance_type: request.instance_type.clone(),
        key_name: config.settings.key_name.clone(),
        instance_profile: config.settings.instance_profile.clone(),
        subnet_id: subnet_id.clone(),
        security_group_id: security_group_id.clone(),
        availability_zone: request.region_config.availability_zone.to_string(),
        user_data: BootScript::new(config.settings.export_bucket.clone()).encoded(),
    };
    let instance_id = record_step(
        launch_id,
        LaunchStep::RunInstance,
        provisioner.run_instance(&instance_spec, tags),
    )?;

    Ok(NetworkResources {
        ipv6_cidr_block,
        subnet_id,
        internet_gateway_id,
        route_table_id,
        security_group_id,
        instance_id,
    })
}

fn wait_for_ipv6_cidr(
    provisioner: &impl NetworkProvisioner,
    pause: &impl Pause,
    settings: &LaunchSettings,
    vpc_id: &str,
) -> Result<String, LaunchError> {
    for attempt in 1..=settings.poll_max_attempts {
        let blocks = provisioner
            .vpc_ipv6_cidr_blocks(vpc_id)
            .map_err(|message| LaunchError::new(LaunchStep::DescribeVpc, message))?;
        if let Some(block) = blocks.into_iter().next() {
            return Ok(block);
        }

        log_info(
            COMPONENT,
            "ipv6_cidr_pending",
            json!({
                "vpc_id": vpc_id,
                "attempt": attempt,
                "max_attempts": settings.poll_max_attempts,
            }),
        );
        if attempt < settings.poll_max_attempts {
            pause.pause(settings.poll_interval);
        }
    }

    Err(LaunchError::new(
        LaunchStep::WaitIpv6Cidr,
        format!(
            "IPv6 CIDR block for {vpc_id} was not allocated after {} attempts",
            settings.poll_max_attempts
        ),
    ))
}

/// Returns whether the bucket had to be created.
fn ensure_bucket(
    bucket_store: &impl BucketStore,
    settings: &LaunchSettings,
) -> Result<bool, LaunchError> {
    let exists = bucket_store
        .bucket_exists(&settings.export_bucket)
        .map_err(|message| LaunchError::new(LaunchStep::EnsureBucket, message))?;
    if exists {
        return Ok(false);
    }

    bucket_store
        .create_bucket(&settings.export_bucket, &settings.bucket_region)
        .map_err(|message| LaunchError::new(LaunchStep::EnsureBucket, message))?;
    Ok(true)
}

// Errors here are logged and dropped; the caller reports the original failure.
fn roll_back(
    provisioner: &impl NetworkProvisioner,
    launch_id: &str,
    vpc_id: &str,
    rollback: &RollbackTargets,
) {
    if let Some(group_id) = &rollback.security_group_id {
        if let Err(error) = provisioner.delete_security_group(group_id) {
            log_warn(
                COMPONENT,
                "cleanup_failed",
                json!({
                    "launch_id": launch_id,
                    "resource": group_id,
                    "error": error,
                }),
            );
        }
    }

    if let Err(error) = provisioner.delete_vpc(vpc_id) {
        log_warn(
            COMPONENT,
            "cleanup_failed",
            json!({
                "launch_id": launch_id,
                "resource": vpc_id,
                "error": error,
            }),
        );
    }
}

fn record_step<T: std::fmt::Debug>(
    launch_id: &str,
    step: LaunchStep,
    result: Result<T, String>,
) -> Result<T, LaunchError> {
    match result {
        Ok(value) => {
            log_info(
                COMPONENT,
                "step_completed",
                json!({
                    "launch_id": launch_id,
                    "step": step.as_str(),
                    "result": format!("{value:?}"),
                }),
            );
            Ok(value)
        }
        Err(message) => Err(LaunchError::new(step, message)),
    }
}

fn report_failure(launch_id: &str, error: LaunchError) -> LaunchError {
    log_error(
        COMPONENT,
        "launch_failed",
        json!({
            "launch_id": launch_id,
            "step": error.step.as_str(),
            "error": error.message.clone(),
            "cleanup_attempted": error.cleanup_attempted,
        }),
    );
    error
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use lazyvpn_core::network::{IngressRule, RouteDestination};

    use super::*;

    #[derive(Default)]
    struct StubProvisioner {
        calls: RefCell<Vec<String>>,
        pending_polls: RefCell<u32>,
    }

    impl StubProvisioner {
        fn pending_for(polls: u32) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                pending_polls: RefCell::new(polls),
            }
        }

        fn record(&self, call: &str) {
            self.calls.borrow_mut().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl NetworkProvisioner for StubProvisioner {
        fn create_vpc(&self, _cidr_block: &str, _tags: &ResourceTags) -> Result<String, String> {
            self.record("create_vpc");
            Ok("vpc-1".to_string())
        }

        fn request_ipv6_cidr_block(&self, _vpc_id: &str) -> Result<(), String> {
            self.record("request_ipv6_cidr_block");
            Ok(())
        }

        fn vpc_ipv6_cidr_blocks(&self, _vpc_id: &str) -> Result<Vec<String>, String> {
            self.record("vpc_ipv6_cidr_blocks");
            let mut pending = self.pending_polls.borrow_mut();
            if *pending > 0 {
                *pending -= 1;
                return Ok(Vec::new());
            }
            Ok(vec!["2600:1f1e:abc:de00::/56".to_string()])
        }

        fn create_subnet(
            &self,
            _spec: &SubnetSpec,
            _tags: &ResourceTags,
        ) -> Result<String, String> {
            self.record("create_subnet");
            Ok("subnet-1".to_string())
        }

        fn enable_ipv6_auto_assign(&self, _subnet_id: &str) -> Result<(), String> {
            self.record("enable_ipv6_auto_assign");
            Ok(())
        }

        fn create_internet_gateway(&self, _tags: &ResourceTags) -> Result<String, String> {
            self.record("create_internet_gateway");
            Ok("igw-1".to_string())
        }

        fn attach_internet_gateway(&self, _gateway_id: &str, _vpc_id: &str) -> Result<(), String> {
            self.record("attach_internet_gateway");
            Ok(())
        }

        fn create_route_table(
            &self,
            _vpc_id: &str,
            _tags: &ResourceTags,
        ) -> Result<String, String> {
            self.record("create_route_table");
            Ok("rtb-1".to_string())
        }

        fn create_route(
            &self,
            _route_table_id: &str,
            destination: RouteDestination,
            _gateway_id: &str,
        ) -> Result<(), String> {
            self.record(&format!("create_route {}", destination.cidr()));
            Ok(())
        }

        fn associate_route_table(
            &self,
            _route_table_id: &str,
            _subnet_id: &str,
        ) -> Result<(), String> {
            self.record("associate_route_table");
            Ok(())
        }

        fn create_security_group(
            &self,
            _vpc_id: &str,
            _name: &str,
            _description: &str,
            _tags: &ResourceTags,
        ) -> Result<String, String> {
            self.record("create_security_group");
            Ok("sg-1".to_string())
        }

        fn authorize_ingress(&self, _group_id: &str, _rules: &[IngressRule]) -> Result<(), String> {
            self.record("authorize_ingress");
            Ok(())
        }

        fn run_instance(
            &self,
            _spec: &InstanceSpec,
            _tags: &ResourceTags,
        ) -> Result<String, String> {
            self.record("run_instance");
            Ok("i-1".to_string())
        }

        fn delete_security_group(&self, _group_id: &str) -> Result<(), String> {
            self.record("delete_security_group");
            Ok(())
        }

        fn delete_vpc(&self, _vpc_id: &str) -> Result<(), String> {
            self.record("delete_vpc");
            Ok(())
        }
    }

    struct StubBuckets {
        exists: bool,
        created: RefCell<Vec<(String, String)>>,
    }

    impl BucketStore for StubBuckets {
        fn bucket_exists(&self, _bucket: &str) -> Result<bool, String> {
            Ok(self.exists)
        }

        fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), String> {
            self.created
                .borrow_mut()
                .push((bucket.to_string(), region.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPause {
        pauses: RefCell<Vec<Duration>>,
    }

    impl Pause for CountingPause {
        fn pause(&self, duration: Duration) {
            self.pauses.borrow_mut().push(duration);
        }
    }

    fn request() -> NormalizedLaunchRequest {
        parse_launch_event(json!({
            "instanceType": "t2.micro",
            "region": "sa-east-1",
            "publicIpV4": "203.0.113.10",
            "publicIpV6": "2001:db8::10"
        }))
        .expect("request should parse")
    }

    fn config(poll_max_attempts: u32) -> LaunchHandlerConfig {
        LaunchHandlerConfig {
            settings: LaunchSettings {
                poll_max_attempts,
                ..LaunchSettings::default()
            },
            invocation_id: "req-1".to_string(),
        }
    }

    fn buckets(exists: bool) -> StubBuckets {
        StubBuckets {
            exists,
            created: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn rejects_nil_event() {
        let error = parse_launch_event(Value::Null).expect_err("nil event should fail");
        assert_eq!(error.step, LaunchStep::ValidateRequest);
        assert_eq!(error.message, "received nil event");
    }

    #[test]
    fn rejects_unsupported_region() {
        let error = parse_launch_event(json!({
            "instanceType": "t2.micro",
            "region": "us-east-1",
            "publicIpV4": "203.0.113.10",
            "publicIpV6": "2001:db8::10"
        }))
        .expect_err("region should fail");

        assert_eq!(error.message, "region not supported: us-east-1");
    }

    #[test]
    fn rejects_payload_missing_fields() {
        let error = parse_launch_event(json!({"region": "sa-east-1"}))
            .expect_err("incomplete payload should fail");
        assert!(error.message.starts_with("Malformed request"));
    }

    #[test]
    fn polls_until_ipv6_block_is_allocated() {
        let provisioner = StubProvisioner::pending_for(2);
        let pause = CountingPause::default();

        let outcome = handle_launch_request(
            &request(),
            &config(5),
            &provisioner,
            &buckets(true),
            &pause,
        )
        .expect("launch should succeed");

        assert_eq!(outcome.ipv6_cidr_block, "2600:1f1e:abc:de00::/56");
        let polls = provisioner
            .calls()
            .iter()
            .filter(|call| *call == "vpc_ipv6_cidr_blocks")
            .count();
        assert_eq!(polls, 3);
        assert_eq!(*pause.pauses.borrow(), vec![Duration::from_secs(5); 2]);
    }

    #[test]
    fn gives_up_polling_and_deletes_vpc() {
        let provisioner = StubProvisioner::pending_for(u32::MAX);
        let pause = CountingPause::default();

        let error = handle_launch_request(
            &request(),
            &config(3),
            &provisioner,
            &buckets(true),
            &pause,
        )
        .expect_err("launch should time out");

        assert_eq!(error.step, LaunchStep::WaitIpv6Cidr);
        assert!(error.cleanup_attempted);
        assert_eq!(pause.pauses.borrow().len(), 2);
        let calls = provisioner.calls();
        assert_eq!(calls.last().map(String::as_str), Some("delete_vpc"));
        assert!(!calls.contains(&"delete_security_group".to_string()));
        assert!(!calls.contains(&"create_subnet".to_string()));
    }

    #[test]
    fn creates_bucket_only_when_absent() {
        let provisioner = StubProvisioner::default();
        let pause = CountingPause::default();

        let existing = buckets(true);
        let outcome = handle_launch_request(&request(), &config(5), &provisioner, &existing, &pause)
            .expect("launch should succeed");
        assert!(!outcome.bucket_created);
        assert!(existing.created.borrow().is_empty());

        let missing = buckets(false);
        let outcome = handle_launch_request(&request(), &config(5), &provisioner, &missing, &pause)
            .expect("launch should succeed");
        assert!(outcome.bucket_created);
        assert_eq!(
            *missing.created.borrow(),
            vec![("lazy-vpn-art".to_string(), "sa-east-1".to_string())]
        );
    }

    #[test]
    fn confirmation_names_instance_and_region() {
        let outcome = handle_launch_request(
            &request(),
            &config(5),
            &StubProvisioner::default(),
            &buckets(true),
            &CountingPause::default(),
        )
        .expect("launch should succeed");

        assert_eq!(
            confirmation_message(&outcome),
            "Ec2 i-1 created in sa-east-1 region!"
        );
        assert_eq!(outcome.client_profile_uri, "s3://lazy-vpn-art/openvpn.ovpn");
    }

    #[test]
    fn launch_error_display_names_step() {
        let error = LaunchError::new(LaunchStep::RunInstance, "InsufficientInstanceCapacity");
        assert_eq!(error.to_string(), "run_instance: InsufficientInstanceCapacity");
    }
}
