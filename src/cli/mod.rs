//! CLI module for lava
//!
//! One subcommand per API resource:
//! - `lava clusters` - create, resize, delete, and wait on clusters
//! - `lava stacks` - manage stacks
//! - `lava scripts` - manage cluster scripts
//! - `lava credentials` - manage SSH keys and connector credentials
//! - `lava nodes` - list cluster nodes
//! - `lava flavors` / `lava distros` / `lava limits` - read-only listings
//! - `lava authenticate` - print a fresh auth token

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::api::clusters::{
    parse_connector, parse_node_group, ClusterCreateNodeGroup, ConnectorRef,
};
use crate::api::scripts::ScriptType;
use crate::api::stacks::{StackNodeGroupRequest, StackServiceRequest};

mod commands;
mod display;

pub use commands::*;
pub use display::*;

#[derive(Parser, Debug)]
#[command(name = "lava")]
#[command(about = "Rackspace Cloud Big Data command line client")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Lava API authentication token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Lava API key
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// API region, e.g. DFW
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Tenant ID
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    /// API endpoint URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Keystone endpoint URL
    #[arg(long, global = true)]
    pub auth_url: Option<String>,

    /// Keystone auth username
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Keystone auth password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Turn off SSL cert validation
    #[arg(short = 'k', long, global = true)]
    pub insecure: bool,

    /// Do not request user input
    #[arg(long, global = true)]
    pub headless: bool,

    /// Path to a .env file with credentials
    #[arg(long, global = true, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage Hadoop clusters
    Clusters(ClustersArgs),

    /// Manage stacks
    Stacks(StacksArgs),

    /// Manage cluster scripts
    Scripts(ScriptsArgs),

    /// Manage SSH keys and connector credentials
    Credentials(CredentialsArgs),

    /// List cluster nodes
    Nodes(NodesArgs),

    /// List node flavors
    Flavors(FlavorsArgs),

    /// Show Hadoop platform distributions
    Distros(DistrosArgs),

    /// Show resource quotas for the tenant
    Limits(LimitsArgs),

    /// Authenticate and print the auth token
    Authenticate,
}

/// Arguments for the clusters command
#[derive(Parser, Debug)]
pub struct ClustersArgs {
    #[command(subcommand)]
    pub action: ClusterAction,
}

#[derive(Subcommand, Debug)]
pub enum ClusterAction {
    /// List all existing clusters
    List,

    /// Display an existing cluster in detail
    Get {
        /// Cluster ID
        cluster_id: String,
    },

    /// Create a new Lava cluster
    Create {
        /// Cluster name
        name: String,

        /// Valid Lava stack ID; for a list of stacks, use `lava stacks list`
        stack_id: String,

        /// Login name of the user to install onto the created nodes;
        /// defaults to the local user
        #[arg(long)]
        username: Option<String>,

        /// SSH key name; may be used multiple times. If not specified, the
        /// client will attempt to use the key `user@hostname`, creating it
        /// from ~/.ssh/id_rsa.pub if it doesn't exist. See `lava credentials`
        #[arg(long = "ssh-key")]
        ssh_keys: Vec<String>,

        /// User script ID; may be used multiple times. See `lava scripts`
        #[arg(long = "user-script")]
        user_scripts: Vec<String>,

        /// Node group options in the form <id>(<key>=<value>, ...), where
        /// <id> is a valid node group ID for the stack; valid options are
        /// `count` and `flavor_id`. May be used multiple times
        #[arg(long = "node-group", value_parser = parse_node_group)]
        node_groups: Vec<ClusterCreateNodeGroup>,

        /// Connector credentials to use in the cluster, in the form
        /// `type=name`. See `lava credentials`. May be used multiple times
        #[arg(long = "connector", value_parser = parse_connector)]
        connectors: Vec<ConnectorRef>,

        /// Wait for the cluster to become active
        #[arg(long)]
        wait: bool,
    },

    /// Resize an existing Lava cluster
    Resize {
        /// Cluster ID
        cluster_id: String,

        /// Node group options in the form '<id>(count=<value>)'; may be
        /// used multiple times to resize multiple node groups
        #[arg(long = "node-group", value_parser = parse_node_group, required = true)]
        node_groups: Vec<ClusterCreateNodeGroup>,

        /// Wait for the cluster to become active
        #[arg(long)]
        wait: bool,
    },

    /// Delete a cluster
    Delete {
        /// Cluster ID
        cluster_id: String,

        /// Suppress the delete confirmation dialog
        #[arg(long)]
        force: bool,
    },

    /// List all nodes in the cluster
    Nodes {
        /// Cluster ID
        cluster_id: String,
    },

    /// Poll a cluster until it becomes active
    Wait {
        /// Cluster ID
        cluster_id: String,

        /// Poll timeout (in minutes)
        #[arg(long)]
        timeout: Option<u64>,

        /// Poll interval (in seconds)
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Arguments for the stacks command
#[derive(Parser, Debug)]
pub struct StacksArgs {
    #[command(subcommand)]
    pub action: StackAction,
}

/// Service list for stack creation, given on the command line as a JSON
/// document, e.g. `[{"name": "HDFS", "modes": ["Secondary"]}]`
#[derive(Debug, Clone)]
pub struct ServiceList(pub Vec<StackServiceRequest>);

pub fn parse_services(value: &str) -> Result<ServiceList, String> {
    serde_json::from_str(value)
        .map(ServiceList)
        .map_err(|e| format!("Invalid services JSON: {}", e))
}

/// Node group list for stack creation, given as a JSON document
#[derive(Debug, Clone)]
pub struct StackNodeGroupList(pub Vec<StackNodeGroupRequest>);

pub fn parse_stack_node_groups(value: &str) -> Result<StackNodeGroupList, String> {
    serde_json::from_str(value)
        .map(StackNodeGroupList)
        .map_err(|e| format!("Invalid node groups JSON: {}", e))
}

#[derive(Subcommand, Debug)]
pub enum StackAction {
    /// List all existing stacks
    List,

    /// Display an existing stack in detail
    Get {
        /// Stack ID
        stack_id: String,
    },

    /// Create a custom stack
    Create {
        /// Stack name
        name: String,

        /// Distribution ID; see `lava distros list`
        distro: String,

        /// Services to install, as a JSON list; each entry takes a `name`
        /// and optional `modes`. See `lava distros get <distro_id>` for
        /// the services available in a distribution
        #[arg(long, value_parser = parse_services)]
        services: ServiceList,

        /// Node groups, as a JSON list of objects with `id`, `flavor_id`,
        /// `count`, and `components`
        #[arg(long = "node-groups", value_parser = parse_stack_node_groups)]
        node_groups: Option<StackNodeGroupList>,

        /// Stack description
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a custom stack
    Delete {
        /// Stack ID
        stack_id: String,

        /// Suppress the delete confirmation dialog
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for the scripts command
#[derive(Parser, Debug)]
pub struct ScriptsArgs {
    #[command(subcommand)]
    pub action: ScriptAction,
}

/// Script type on the command line; only post-init scripts exist today
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScriptTypeArg {
    #[value(name = "post_init")]
    PostInit,
}

impl From<ScriptTypeArg> for ScriptType {
    fn from(value: ScriptTypeArg) -> Self {
        match value {
            ScriptTypeArg::PostInit => ScriptType::PostInit,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ScriptAction {
    /// List all existing cluster scripts
    List,

    /// Create a cluster script
    Create {
        /// Descriptive name for this script
        name: String,

        /// The URL from which the script may be downloaded
        url: String,

        /// The type of script
        #[arg(long = "type", default_value = "post_init")]
        script_type: ScriptTypeArg,
    },

    /// Update an existing script
    Update {
        /// ID of existing script
        script_id: String,

        /// Descriptive name for this script
        #[arg(long)]
        name: Option<String>,

        /// The URL from which the script may be downloaded
        #[arg(long)]
        url: Option<String>,

        /// The type of script
        #[arg(long = "type")]
        script_type: Option<ScriptTypeArg>,
    },

    /// Delete a cluster script
    Delete {
        /// Script ID
        script_id: String,

        /// Suppress the delete confirmation dialog
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for the credentials command
#[derive(Parser, Debug)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub action: CredentialAction,
}

#[derive(Subcommand, Debug)]
pub enum CredentialAction {
    /// List all existing credentials
    List,

    /// List all SSH keys
    ListSshKeys,

    /// List all Cloud Files credentials
    ListCloudFiles,

    /// List all Amazon S3 credentials
    ListS3,

    /// Upload an SSH public key for cluster logins
    CreateSshKey {
        /// Name to associate with the key
        name: String,

        /// SSH public key; either a file containing the public key or the
        /// plaintext public key itself
        public_key: String,
    },

    /// Store a Cloud Files credential
    CreateCloudFiles {
        /// Cloud Files username
        username: String,

        /// Cloud Files API key
        api_key: String,
    },

    /// Store an Amazon S3 credential
    CreateS3 {
        /// S3 access key ID
        access_key_id: String,

        /// S3 access secret key
        access_secret_key: String,
    },

    /// Delete an SSH key
    DeleteSshKey {
        /// Key name
        name: String,

        /// Suppress the delete confirmation dialog
        #[arg(long)]
        force: bool,
    },

    /// Delete a Cloud Files credential
    DeleteCloudFiles {
        /// Cloud Files username
        username: String,

        /// Suppress the delete confirmation dialog
        #[arg(long)]
        force: bool,
    },

    /// Delete an Amazon S3 credential
    DeleteS3 {
        /// S3 access key ID
        access_key_id: String,

        /// Suppress the delete confirmation dialog
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for the nodes command
#[derive(Parser, Debug)]
pub struct NodesArgs {
    #[command(subcommand)]
    pub action: NodeAction,
}

#[derive(Subcommand, Debug)]
pub enum NodeAction {
    /// List all nodes in a cluster
    List {
        /// Cluster ID
        cluster_id: String,
    },
}

/// Arguments for the flavors command
#[derive(Parser, Debug)]
pub struct FlavorsArgs {
    #[command(subcommand)]
    pub action: FlavorAction,
}

#[derive(Subcommand, Debug)]
pub enum FlavorAction {
    /// List all node flavors
    List,
}

/// Arguments for the distros command
#[derive(Parser, Debug)]
pub struct DistrosArgs {
    #[command(subcommand)]
    pub action: DistroAction,
}

#[derive(Subcommand, Debug)]
pub enum DistroAction {
    /// List all supported distributions
    List,

    /// Show a specific distribution in detail
    Get {
        /// Distribution ID
        distro_id: String,
    },
}

/// Arguments for the limits command
#[derive(Parser, Debug)]
pub struct LimitsArgs {
    #[command(subcommand)]
    pub action: LimitAction,
}

#[derive(Subcommand, Debug)]
pub enum LimitAction {
    /// Get resource limits for the authenticated user
    Get,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clusters_list() {
        let cli = Cli::parse_from(["lava", "clusters", "list"]);
        match cli.command {
            Commands::Clusters(args) => match args.action {
                ClusterAction::List => {}
                _ => panic!("Expected List action"),
            },
            _ => panic!("Expected Clusters command"),
        }
    }

    #[test]
    fn test_parse_clusters_wait() {
        let cli = Cli::parse_from([
            "lava", "clusters", "wait", "abc123", "--timeout", "45", "--interval", "15",
        ]);
        match cli.command {
            Commands::Clusters(args) => match args.action {
                ClusterAction::Wait {
                    cluster_id,
                    timeout,
                    interval,
                } => {
                    assert_eq!(cluster_id, "abc123");
                    assert_eq!(timeout, Some(45));
                    assert_eq!(interval, Some(15));
                }
                _ => panic!("Expected Wait action"),
            },
            _ => panic!("Expected Clusters command"),
        }
    }

    #[test]
    fn test_parse_clusters_wait_defaults() {
        let cli = Cli::parse_from(["lava", "clusters", "wait", "abc123"]);
        match cli.command {
            Commands::Clusters(args) => match args.action {
                ClusterAction::Wait {
                    timeout, interval, ..
                } => {
                    assert_eq!(timeout, None);
                    assert_eq!(interval, None);
                }
                _ => panic!("Expected Wait action"),
            },
            _ => panic!("Expected Clusters command"),
        }
    }

    #[test]
    fn test_parse_clusters_wait_rejects_negative_timeout() {
        let result = Cli::try_parse_from(["lava", "clusters", "wait", "abc", "--timeout", "-5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_clusters_create() {
        let cli = Cli::parse_from([
            "lava",
            "clusters",
            "create",
            "my-cluster",
            "HDP2_2",
            "--node-group",
            "slave(count=3, flavor_id=hadoop1-7)",
            "--ssh-key",
            "mykey",
            "--wait",
        ]);
        match cli.command {
            Commands::Clusters(args) => match args.action {
                ClusterAction::Create {
                    name,
                    stack_id,
                    ssh_keys,
                    node_groups,
                    wait,
                    ..
                } => {
                    assert_eq!(name, "my-cluster");
                    assert_eq!(stack_id, "HDP2_2");
                    assert_eq!(ssh_keys, vec!["mykey".to_string()]);
                    assert_eq!(node_groups[0].count, Some(3));
                    assert!(wait);
                }
                _ => panic!("Expected Create action"),
            },
            _ => panic!("Expected Clusters command"),
        }
    }

    #[test]
    fn test_parse_clusters_resize_requires_node_group() {
        let result = Cli::try_parse_from(["lava", "clusters", "resize", "abc123"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_stacks_create_with_json_services() {
        let cli = Cli::parse_from([
            "lava",
            "stacks",
            "create",
            "custom",
            "HDP2.2",
            "--services",
            r#"[{"name": "HDFS"}, {"name": "YARN"}]"#,
        ]);
        match cli.command {
            Commands::Stacks(args) => match args.action {
                StackAction::Create { services, .. } => {
                    assert_eq!(services.0.len(), 2);
                    assert_eq!(services.0[0].name, "HDFS");
                }
                _ => panic!("Expected Create action"),
            },
            _ => panic!("Expected Stacks command"),
        }
    }

    #[test]
    fn test_parse_scripts_create_default_type() {
        let cli = Cli::parse_from([
            "lava",
            "scripts",
            "create",
            "init",
            "https://example.com/init.sh",
        ]);
        match cli.command {
            Commands::Scripts(args) => match args.action {
                ScriptAction::Create { script_type, .. } => {
                    assert_eq!(script_type, ScriptTypeArg::PostInit);
                }
                _ => panic!("Expected Create action"),
            },
            _ => panic!("Expected Scripts command"),
        }
    }

    #[test]
    fn test_parse_credentials_create_ssh_key() {
        let cli = Cli::parse_from([
            "lava",
            "credentials",
            "create-ssh-key",
            "mykey",
            "~/.ssh/id_rsa.pub",
        ]);
        match cli.command {
            Commands::Credentials(args) => match args.action {
                CredentialAction::CreateSshKey { name, public_key } => {
                    assert_eq!(name, "mykey");
                    assert_eq!(public_key, "~/.ssh/id_rsa.pub");
                }
                _ => panic!("Expected CreateSshKey action"),
            },
            _ => panic!("Expected Credentials command"),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "lava", "clusters", "list", "--region", "DFW", "--api-key", "secret",
        ]);
        assert_eq!(cli.region.as_deref(), Some("DFW"));
        assert_eq!(cli.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_verbose_global() {
        let cli = Cli::parse_from(["lava", "-vvv", "limits", "get"]);
        assert_eq!(cli.verbose, 3);
    }
}
