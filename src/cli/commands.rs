//! Command implementations for the CLI
//!
//! Builds the API client from arguments and environment, dispatches each
//! subcommand, and prints the formatted result.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use super::display;
use super::{
    Cli, ClusterAction, Commands, CredentialAction, DistroAction, FlavorAction, LimitAction,
    NodeAction, ScriptAction, StackAction,
};
use crate::api::clusters::{default_ssh_key_name, ClusterCreate};
use crate::api::stacks::StackCreate;
use crate::client::Lava;
use crate::error::LavaError;

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<(), LavaError> {
    if let Some(ref env_file) = cli.env_file {
        dotenvy::from_path(env_file).map_err(|e| {
            LavaError::Invalid(format!(
                "Failed to load env file {}: {}",
                env_file.display(),
                e
            ))
        })?;
    }

    let client = create_client(&cli).await?;

    match cli.command {
        Commands::Clusters(args) => clusters_command(&client, args.action, cli.headless).await,
        Commands::Stacks(args) => stacks_command(&client, args.action).await,
        Commands::Scripts(args) => scripts_command(&client, args.action).await,
        Commands::Credentials(args) => credentials_command(&client, args.action).await,
        Commands::Nodes(args) => match args.action {
            NodeAction::List { cluster_id } => {
                let nodes = client.nodes().list(&cluster_id).await?;
                print!("{}", display::format_node_list(&nodes));
                Ok(())
            }
        },
        Commands::Flavors(args) => match args.action {
            FlavorAction::List => {
                let flavors = client.flavors().list().await?;
                print!("{}", display::format_flavor_list(&flavors));
                Ok(())
            }
        },
        Commands::Distros(args) => match args.action {
            DistroAction::List => {
                let distros = client.distros().list().await?;
                print!("{}", display::format_distro_list(&distros));
                Ok(())
            }
            DistroAction::Get { distro_id } => {
                let distro = client.distros().get(&distro_id).await?;
                print!("{}", display::format_distro_detail(&distro));
                Ok(())
            }
        },
        Commands::Limits(args) => match args.action {
            LimitAction::Get => {
                let limits = client.limits().get().await?;
                print!("{}", display::format_limits(&limits));
                Ok(())
            }
        },
        Commands::Authenticate => {
            println!("AUTH_TOKEN={}", client.token().await);
            Ok(())
        }
    }
}

/// Build a [`Lava`] client from CLI arguments with environment fallbacks.
async fn create_client(cli: &Cli) -> Result<Lava, LavaError> {
    // `authenticate` always requests a fresh token
    let force_reauth = matches!(cli.command, Commands::Authenticate);

    let api_key = first_set(&[cli.api_key.as_deref()], &["LAVA_API_KEY", "OS_API_KEY"]);
    let token = if force_reauth {
        None
    } else {
        first_set(&[cli.token.as_deref()], &["LAVA_AUTH_TOKEN", "AUTH_TOKEN"])
    };
    let password = first_set(&[cli.password.as_deref()], &["LAVA_PASSWORD", "OS_PASSWORD"]);
    let user = first_set(&[cli.user.as_deref()], &["LAVA_USERNAME", "OS_USERNAME"])
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "lava".to_string());

    if api_key.is_none() && token.is_none() && password.is_none() {
        return Err(LavaError::Invalid(
            "No API key, token, or password specified".to_string(),
        ));
    }

    let insecure = cli.insecure || std::env::var("LAVA_INSECURE").is_ok();

    let mut builder = Lava::builder()
        .username(user)
        .insecure(insecure)
        .interactive(true);

    if let Some(api_key) = api_key {
        builder = builder.api_key(api_key);
    }
    if let Some(token) = token {
        builder = builder.token(token);
    }
    if let Some(password) = password {
        builder = builder.password(password);
    }
    if let Some(region) = first_set(
        &[cli.region.as_deref()],
        &["LAVA_REGION_NAME", "OS_REGION_NAME"],
    ) {
        builder = builder.region(region);
    }
    if let Some(tenant) = first_set(
        &[cli.tenant.as_deref()],
        &["LAVA_TENANT_NAME", "OS_TENANT_NAME"],
    ) {
        builder = builder.tenant_id(tenant);
    }
    if let Some(endpoint) = first_set(&[cli.endpoint.as_deref()], &["LAVA_API_URL"]) {
        builder = builder.endpoint(endpoint);
    }
    if let Some(auth_url) = first_set(&[cli.auth_url.as_deref()], &["LAVA_AUTH_URL"]) {
        builder = builder.auth_url(auth_url);
    }

    builder.build().await
}

/// First argument value that is set, falling back to the given
/// environment variables in order.
fn first_set(args: &[Option<&str>], env_vars: &[&str]) -> Option<String> {
    for arg in args {
        if let Some(value) = arg {
            return Some(value.to_string());
        }
    }
    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

async fn clusters_command(
    client: &Lava,
    action: ClusterAction,
    headless: bool,
) -> Result<(), LavaError> {
    let api = client.clusters();

    match action {
        ClusterAction::List => {
            let clusters = api.list().await?;
            print!("{}", display::format_cluster_list(&clusters));
        }
        ClusterAction::Get { cluster_id } => {
            let cluster = api.get(&cluster_id).await?;
            print!("{}", display::format_cluster_detail(&cluster));
        }
        ClusterAction::Create {
            name,
            stack_id,
            username,
            ssh_keys,
            user_scripts,
            node_groups,
            connectors,
            wait,
        } => {
            let used_default_key = ssh_keys.is_empty();
            let spec = ClusterCreate {
                name,
                stack_id,
                username,
                ssh_keys,
                user_scripts,
                node_groups,
                connectors,
            };

            let cluster = match api.create(spec.clone(), wait).await {
                Ok(cluster) => cluster,
                Err(LavaError::Request(ref msg))
                    if used_default_key
                        && !headless
                        && (msg.contains("Cannot find requested ssh_keys")
                            || msg.contains("One or more ssh_keys are invalid")) =>
                {
                    // The default key has never been uploaded; offer to
                    // create it and try again.
                    create_default_ssh_credential(client).await?;
                    api.create(spec, wait).await?
                }
                Err(e) => return Err(e),
            };
            print!("{}", display::format_cluster_detail(&cluster));
        }
        ClusterAction::Resize {
            cluster_id,
            node_groups,
            wait,
        } => {
            let cluster = api.resize(&cluster_id, node_groups, wait).await?;
            print!("{}", display::format_cluster_detail(&cluster));
        }
        ClusterAction::Delete { cluster_id, force } => {
            if confirm_delete(&format!("Delete cluster {}?", cluster_id), force) {
                api.delete(&cluster_id).await?;
            }
        }
        ClusterAction::Nodes { cluster_id } => {
            let nodes = api.nodes(&cluster_id).await?;
            print!("{}", display::format_node_list(&nodes));
        }
        ClusterAction::Wait {
            cluster_id,
            timeout,
            interval,
        } => {
            let cluster = api
                .wait(
                    &cluster_id,
                    timeout.map(|minutes| Duration::from_secs(minutes * 60)),
                    interval.map(Duration::from_secs),
                )
                .await?;
            print!("{}", display::format_cluster_detail(&cluster));
        }
    }

    Ok(())
}

async fn stacks_command(client: &Lava, action: StackAction) -> Result<(), LavaError> {
    let api = client.stacks();

    match action {
        StackAction::List => {
            let stacks = api.list().await?;
            print!("{}", display::format_stack_list(&stacks));
        }
        StackAction::Get { stack_id } => {
            let stack = api.get(&stack_id).await?;
            print!("{}", display::format_stack_detail(&stack));
        }
        StackAction::Create {
            name,
            distro,
            services,
            node_groups,
            description,
        } => {
            let stack = api
                .create(StackCreate {
                    name,
                    description,
                    distro,
                    services: services.0,
                    node_groups: node_groups.map(|groups| groups.0).unwrap_or_default(),
                })
                .await?;
            print!("{}", display::format_stack_detail(&stack));
        }
        StackAction::Delete { stack_id, force } => {
            if confirm_delete(&format!("Delete stack {}?", stack_id), force) {
                api.delete(&stack_id).await?;
            }
        }
    }

    Ok(())
}

async fn scripts_command(client: &Lava, action: ScriptAction) -> Result<(), LavaError> {
    let api = client.scripts();

    match action {
        ScriptAction::List => {
            let scripts = api.list().await?;
            print!("{}", display::format_script_list(&scripts));
        }
        ScriptAction::Create {
            name,
            url,
            script_type,
        } => {
            let script = api.create(name, url, script_type.into()).await?;
            print!("{}", display::format_script_list(std::slice::from_ref(&script)));
        }
        ScriptAction::Update {
            script_id,
            name,
            url,
            script_type,
        } => {
            let script = api
                .update(&script_id, name, url, script_type.map(Into::into))
                .await?;
            print!("{}", display::format_script_list(std::slice::from_ref(&script)));
        }
        ScriptAction::Delete { script_id, force } => {
            if confirm_delete(&format!("Delete script {}?", script_id), force) {
                api.delete(&script_id).await?;
            }
        }
    }

    Ok(())
}

async fn credentials_command(client: &Lava, action: CredentialAction) -> Result<(), LavaError> {
    let api = client.credentials();

    match action {
        CredentialAction::List => {
            let credentials = api.list().await?;
            print!("{}", display::format_credentials(&credentials));
        }
        CredentialAction::ListSshKeys => {
            let keys = api.list_ssh_keys().await?;
            let headers = &["TYPE", "NAME"];
            let rows = keys
                .iter()
                .map(|k| vec!["SSH Key".to_string(), k.name.clone()])
                .collect();
            print!("{}", display::format_table(headers, rows));
        }
        CredentialAction::ListCloudFiles => {
            let creds = api.list_cloud_files().await?;
            let headers = &["TYPE", "USERNAME"];
            let rows = creds
                .iter()
                .map(|c| vec!["Cloud Files".to_string(), c.username.clone()])
                .collect();
            print!("{}", display::format_table(headers, rows));
        }
        CredentialAction::ListS3 => {
            let creds = api.list_s3().await?;
            let headers = &["TYPE", "ACCESS KEY ID"];
            let rows = creds
                .iter()
                .map(|c| vec!["Amazon S3".to_string(), c.access_key_id.clone()])
                .collect();
            print!("{}", display::format_table(headers, rows));
        }
        CredentialAction::CreateSshKey { name, public_key } => {
            let key = api.create_ssh_key(name, &public_key).await?;
            println!("Uploaded SSH key {}", key.name);
        }
        CredentialAction::CreateCloudFiles { username, api_key } => {
            let cred = api.create_cloud_files(username, api_key).await?;
            println!("Stored Cloud Files credential for {}", cred.username);
        }
        CredentialAction::CreateS3 {
            access_key_id,
            access_secret_key,
        } => {
            let cred = api.create_s3(access_key_id, access_secret_key).await?;
            println!("Stored Amazon S3 credential for {}", cred.access_key_id);
        }
        CredentialAction::DeleteSshKey { name, force } => {
            if confirm_delete(&format!("Delete SSH key {}?", name), force) {
                api.delete_ssh_key(&name).await?;
            }
        }
        CredentialAction::DeleteCloudFiles { username, force } => {
            if confirm_delete(&format!("Delete Cloud Files credential {}?", username), force) {
                api.delete_cloud_files(&username).await?;
            }
        }
        CredentialAction::DeleteS3 {
            access_key_id,
            force,
        } => {
            if confirm_delete(
                &format!("Delete Amazon S3 credential {}?", access_key_id),
                force,
            ) {
                api.delete_s3(&access_key_id).await?;
            }
        }
    }

    Ok(())
}

/// Upload `~/.ssh/id_rsa.pub` as the default SSH key credential.
async fn create_default_ssh_credential(client: &Lava) -> Result<(), LavaError> {
    let pubkey_path: PathBuf = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ssh")
        .join("id_rsa.pub");

    if !confirm(&format!(
        "You have not uploaded any SSH key credentials; do you want to upload {} now?",
        pubkey_path.display()
    )) {
        return Err(LavaError::Invalid("Cluster creation aborted".to_string()));
    }

    let public_key = std::fs::read_to_string(&pubkey_path).map_err(|_| {
        LavaError::Invalid(
            "No SSH keypair found; to generate a keypair, run `ssh-keygen`".to_string(),
        )
    })?;

    println!("SSH key does not exist; creating...");
    client
        .credentials()
        .create_ssh_key(default_ssh_key_name(), public_key.trim())
        .await?;

    Ok(())
}

fn confirm_delete(prompt: &str, force: bool) -> bool {
    force || confirm(prompt)
}

/// Ask the user a yes/no question on the terminal.
fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    let _ = io::stdout().flush();

    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return false;
    }

    let answer = line.trim().to_lowercase();
    debug!("confirmation answer: {:?}", answer);
    matches!(answer.as_str(), "y" | "yes")
}
