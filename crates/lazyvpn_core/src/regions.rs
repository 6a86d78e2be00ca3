/// Machine image and placement used when launching in a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConfig {
    pub ami_id: &'static str,
    pub availability_zone: &'static str,
}

struct RegionEntry {
    name: &'static str,
    config: RegionConfig,
}

// Ubuntu images. Regions not listed here have not been verified with the
// installer script and are rejected.
const REGION_TABLE: &[RegionEntry] = &[
    RegionEntry {
        name: "sa-east-1",
        config: RegionConfig {
            ami_id: "ami-0b6c2d49148000cd5",
            availability_zone: "sa-east-1c",
        },
    },
    RegionEntry {
        name: "us-east-2",
        config: RegionConfig {
            ami_id: "ami-0e83be366243f524a",
            availability_zone: "us-east-2c",
        },
    },
    RegionEntry {
        name: "us-west-1",
        config: RegionConfig {
            ami_id: "ami-0cbd40f694b804622",
            availability_zone: "us-west-1c",
        },
    },
    RegionEntry {
        name: "ap-south-1",
        config: RegionConfig {
            ami_id: "ami-0287a05f0ef0e9d9a",
            availability_zone: "ap-south-1c",
        },
    },
    RegionEntry {
        name: "ap-northeast-2",
        config: RegionConfig {
            ami_id: "ami-086cae3329a3f7d75",
            availability_zone: "ap-northeast-2c",
        },
    },
    RegionEntry {
        name: "ap-southeast-2",
        config: RegionConfig {
            ami_id: "ami-0df4b2961410d4cff",
            availability_zone: "ap-southeast-2c",
        },
    },
    RegionEntry {
        name: "ca-central-1",
        config: RegionConfig {
            ami_id: "ami-06873c81b882339ac",
            availability_zone: "ca-central-1c",
        },
    },
    RegionEntry {
        name: "eu-central-1",
        config: RegionConfig {
            ami_id: "ami-06dd92ecc74fdfb36",
            availability_zone: "eu-central-1c",
        },
    },
    RegionEntry {
        name: "eu-west-2",
        config: RegionConfig {
            ami_id: "ami-0505148b3591e4c07",
            availability_zone: "eu-west-2c",
        },
    },
    RegionEntry {
        name: "eu-north-1",
        config: RegionConfig {
            ami_id: "ami-0fe8bec493a81c7da",
            availability_zone: "eu-north-1c",
        },
    },
];

pub fn lookup_region(name: &str) -> Option<&'static RegionConfig> {
    REGION_TABLE
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| &entry.config)
}

pub fn supported_regions() -> impl Iterator<Item = &'static str> {
    REGION_TABLE.iter().map(|entry| entry.name)
}
