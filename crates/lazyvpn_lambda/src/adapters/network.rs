use lazyvpn_core::network::{IngressRule, RouteDestination};

pub type ResourceTags = [(String, String)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    pub vpc_id: String,
    pub cidr_block: String,
    pub ipv6_cidr_block: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub ami_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub instance_profile: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub availability_zone: String,
    /// Base64 encoded boot script.
    pub user_data: String,
}

/// Virtual network and compute calls issued by the launch handler.
///
/// Every method maps onto a single provider request. Errors carry the
/// provider's message unchanged.
pub trait NetworkProvisioner {
    fn create_vpc(&self, cidr_block: &str, tags: &ResourceTags) -> Result<String, String>;
    fn request_ipv6_cidr_block(&self, vpc_id: &str) -> Result<(), String>;
    /// IPv6 blocks currently associated with the VPC, empty while the
    /// provider is still allocating.
    fn vpc_ipv6_cidr_blocks(&self, vpc_id: &str) -> Result<Vec<String>, String>;
    fn create_subnet(&self, spec: &SubnetSpec, tags: &ResourceTags) -> Result<String, String>;
    fn enable_ipv6_auto_assign(&self, subnet_id: &str) -> Result<(), String>;
    fn create_internet_gateway(&self, tags: &ResourceTags) -> Result<String, String>;
    fn attach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<(), String>;
    fn create_route_table(&self, vpc_id: &str, tags: &ResourceTags) -> Result<String, String>;
    fn create_route(
        &self,
        route_table_id: &str,
        destination: RouteDestination,
        gateway_id: &str,
    ) -> Result<(), String>;
    fn associate_route_table(&self, route_table_id: &str, subnet_id: &str) -> Result<(), String>;
    fn create_security_group(
        &self,
        vpc_id: &str,
        name: &str,
        description: &str,
        tags: &ResourceTags,
    ) -> Result<String, String>;
    fn authorize_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<(), String>;
    fn run_instance(&self, spec: &InstanceSpec, tags: &ResourceTags) -> Result<String, String>;
    fn delete_security_group(&self, group_id: &str) -> Result<(), String>;
    fn delete_vpc(&self, vpc_id: &str) -> Result<(), String>;
}
