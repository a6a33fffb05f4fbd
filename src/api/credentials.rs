//! Manage credentials: SSH keys for cluster logins plus Cloud Files and
//! Amazon S3 connector credentials

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::api::response::{CloudFilesCredential, Credentials, S3Credential, SshKey};
use crate::client::Lava;
use crate::error::LavaError;

// ============================================================================
// API responses
// ============================================================================

/// Response from /credentials and the typed sub-lists
#[derive(Debug, Deserialize)]
struct CredentialsResponse {
    credentials: Credentials,
}

/// Response from creating a single credential
#[derive(Debug, Deserialize)]
struct CredentialResponse {
    credentials: CreatedCredential,
}

#[derive(Debug, Default, Deserialize)]
struct CreatedCredential {
    #[serde(default)]
    ssh_keys: Option<SshKey>,
    #[serde(default)]
    cloud_files: Option<CloudFilesCredential>,
    #[serde(default)]
    s3: Option<S3Credential>,
}

// ============================================================================
// API request data
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateSshKeyRequest {
    key_name: String,
    public_key: String,
}

#[derive(Debug, Serialize)]
struct CreateCloudFilesRequest {
    username: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CreateS3Request {
    access_key_id: String,
    access_secret_key: String,
}

#[derive(Debug, Serialize)]
struct SshKeyBody {
    ssh_keys: CreateSshKeyRequest,
}

#[derive(Debug, Serialize)]
struct CloudFilesBody {
    cloud_files: CreateCloudFilesRequest,
}

#[derive(Debug, Serialize)]
struct S3Body {
    s3: CreateS3Request,
}

/// Resolve SSH key material that may be given either inline or as a path
/// to a public-key file.
pub fn file_or_string(value: &str) -> Result<String, LavaError> {
    let expanded = shellexpand::tilde(value);
    let path = Path::new(expanded.as_ref());
    if path.is_file() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LavaError::Invalid(format!("Unable to read {}: {}", value, e)))?;
        Ok(contents.trim().to_string())
    } else {
        Ok(value.to_string())
    }
}

fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), LavaError> {
    if value.len() < min || value.len() > max {
        return Err(LavaError::Invalid(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

// ============================================================================
// API resource
// ============================================================================

/// Credentials API methods
pub struct CredentialsApi<'a> {
    client: &'a Lava,
}

impl<'a> CredentialsApi<'a> {
    pub(crate) fn new(client: &'a Lava) -> Self {
        Self { client }
    }

    async fn list_type(&self, credential_type: Option<&str>) -> Result<Credentials, LavaError> {
        let path = match credential_type {
            Some(t) => format!("credentials/{}", t),
            None => "credentials".to_string(),
        };
        let resp: CredentialsResponse = self.client.get(&path).await?;
        Ok(resp.credentials)
    }

    /// List all credentials belonging to the tenant.
    pub async fn list(&self) -> Result<Credentials, LavaError> {
        self.list_type(None).await
    }

    /// List all SSH keys.
    pub async fn list_ssh_keys(&self) -> Result<Vec<SshKey>, LavaError> {
        Ok(self.list_type(Some("ssh_keys")).await?.ssh_keys)
    }

    /// List all Cloud Files credentials.
    pub async fn list_cloud_files(&self) -> Result<Vec<CloudFilesCredential>, LavaError> {
        Ok(self.list_type(Some("cloud_files")).await?.cloud_files)
    }

    /// List all Amazon S3 credentials.
    pub async fn list_s3(&self) -> Result<Vec<S3Credential>, LavaError> {
        Ok(self.list_type(Some("s3")).await?.s3)
    }

    /// Upload an SSH public key for cluster logins. `public_key` may be
    /// the plaintext key or a path to a key file.
    pub async fn create_ssh_key(
        &self,
        name: impl Into<String>,
        public_key: &str,
    ) -> Result<SshKey, LavaError> {
        let name = name.into();
        let public_key = file_or_string(public_key)?;
        validate_length("key name", &name, 3, 255)?;
        validate_length("public key", &public_key, 50, 1024)?;

        let body = SshKeyBody {
            ssh_keys: CreateSshKeyRequest {
                key_name: name,
                public_key,
            },
        };

        let resp: CredentialResponse = self.client.post("credentials/ssh_keys", &body).await?;
        resp.credentials
            .ssh_keys
            .ok_or_else(|| LavaError::Api("Missing ssh_keys in response".to_string()))
    }

    /// Store a Cloud Files credential.
    pub async fn create_cloud_files(
        &self,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<CloudFilesCredential, LavaError> {
        let username = username.into();
        let api_key = api_key.into();
        validate_length("username", &username, 3, 255)?;
        validate_length("api key", &api_key, 20, 40)?;

        let body = CloudFilesBody {
            cloud_files: CreateCloudFilesRequest { username, api_key },
        };

        let resp: CredentialResponse = self.client.post("credentials/cloud_files", &body).await?;
        resp.credentials
            .cloud_files
            .ok_or_else(|| LavaError::Api("Missing cloud_files in response".to_string()))
    }

    /// Store an Amazon S3 credential.
    pub async fn create_s3(
        &self,
        access_key_id: impl Into<String>,
        access_secret_key: impl Into<String>,
    ) -> Result<S3Credential, LavaError> {
        let access_key_id = access_key_id.into();
        let access_secret_key = access_secret_key.into();
        validate_length("access key id", &access_key_id, 20, 20)?;
        validate_length("access secret key", &access_secret_key, 40, 40)?;

        let body = S3Body {
            s3: CreateS3Request {
                access_key_id,
                access_secret_key,
            },
        };

        let resp: CredentialResponse = self.client.post("credentials/s3", &body).await?;
        resp.credentials
            .s3
            .ok_or_else(|| LavaError::Api("Missing s3 in response".to_string()))
    }

    /// Delete an SSH key by name.
    pub async fn delete_ssh_key(&self, name: &str) -> Result<(), LavaError> {
        self.client
            .delete(&format!("credentials/ssh_keys/{}", name))
            .await
    }

    /// Delete a Cloud Files credential by username.
    pub async fn delete_cloud_files(&self, username: &str) -> Result<(), LavaError> {
        self.client
            .delete(&format!("credentials/cloud_files/{}", username))
            .await
    }

    /// Delete an Amazon S3 credential by access key ID.
    pub async fn delete_s3(&self, access_key_id: &str) -> Result<(), LavaError> {
        self.client
            .delete(&format!("credentials/s3/{}", access_key_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_or_string_reads_key_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ssh-rsa AAAAB3NzaC1yc2EAAAADAQAB test@host").unwrap();

        let key = file_or_string(file.path().to_str().unwrap()).unwrap();
        assert_eq!(key, "ssh-rsa AAAAB3NzaC1yc2EAAAADAQAB test@host");
    }

    #[test]
    fn test_file_or_string_passes_through_plaintext() {
        let key = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQAB test@host";
        assert_eq!(file_or_string(key).unwrap(), key);
    }

    #[test]
    fn test_ssh_key_body_shape() {
        let body = SshKeyBody {
            ssh_keys: CreateSshKeyRequest {
                key_name: "mykey".to_string(),
                public_key: "ssh-rsa AAAA".to_string(),
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["ssh_keys"]["key_name"], "mykey");
        assert_eq!(value["ssh_keys"]["public_key"], "ssh-rsa AAAA");
    }

    #[test]
    fn test_created_credential_parses_single_object() {
        let resp: CredentialResponse = serde_json::from_str(
            r#"{"credentials": {"ssh_keys": {"key_name": "mykey"}}}"#,
        )
        .unwrap();
        assert_eq!(resp.credentials.ssh_keys.unwrap().name, "mykey");
        assert!(resp.credentials.cloud_files.is_none());
    }
}
