use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PRODUCTION_BASE_URL: &str = "https://play.unity.com";
pub const STAGING_BASE_URL: &str = "https://connect-staging.unity.com";
pub const DEV_BASE_URL: &str = "https://connect-dev.unity.com";

/// Largest archive the service accepts.
pub const MAX_ARCHIVE_BYTES: u64 = 200 * 1024 * 1024;

/// Service root for a session environment name.
pub fn base_url_for(environment: &str) -> &'static str {
    match environment {
        "staging" => STAGING_BASE_URL,
        "dev" => DEV_BASE_URL,
        _ => PRODUCTION_BASE_URL,
    }
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub upload_progress_interval: Duration,
    pub poll_interval: Duration,
    pub login_check_interval: Duration,
    pub max_archive_bytes: u64,
    pub archive_name: String,
    /// Where the archive is written; defaults to the artifact's parent directory.
    pub archive_dir: Option<PathBuf>,
    /// Single-line file holding the last known project id.
    pub correlation_file: PathBuf,
    /// Path segment of the service API, as in `/api/<resource>/upload`.
    pub resource: String,
    /// Replaces the environment based service root when set.
    pub base_url_override: Option<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
            upload_progress_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1500),
            login_check_interval: Duration::from_secs(2),
            max_archive_bytes: MAX_ARCHIVE_BYTES,
            archive_name: "publish_build.zip".to_string(),
            archive_dir: None,
            correlation_file: PathBuf::from("publish_project_id"),
            resource: "webgl".to_string(),
            base_url_override: None,
        }
    }
}

impl PublishSettings {
    pub fn base_url(&self, environment: &str) -> String {
        match &self.base_url_override {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => base_url_for(environment).to_string(),
        }
    }

    pub fn upload_endpoint(&self, environment: &str) -> String {
        format!("{}/api/{}/upload", self.base_url(environment), self.resource)
    }

    pub fn progress_endpoint(&self, environment: &str) -> String {
        format!("{}/api/{}/progress", self.base_url(environment), self.resource)
    }

    /// Deterministic archive location for an artifact directory.
    ///
    /// Relative directories are resolved against the working directory first,
    /// so `demo` archives into `./publish_build.zip`, not into `demo/`.
    pub fn archive_path_for(&self, artifact_dir: &Path) -> PathBuf {
        let dir = match &self.archive_dir {
            Some(dir) => dir.clone(),
            None => {
                let artifact_dir =
                    std::path::absolute(artifact_dir).unwrap_or_else(|_| artifact_dir.to_path_buf());
                artifact_dir
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or(artifact_dir)
            }
        };
        dir.join(&self.archive_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_selects_service_root() {
        assert_eq!(base_url_for("staging"), STAGING_BASE_URL);
        assert_eq!(base_url_for("dev"), DEV_BASE_URL);
        assert_eq!(base_url_for("production"), PRODUCTION_BASE_URL);
        assert_eq!(base_url_for(""), PRODUCTION_BASE_URL);
    }

    #[test]
    fn endpoints_use_override_and_resource() {
        let settings = PublishSettings {
            base_url_override: Some("http://127.0.0.1:9000/".to_string()),
            ..PublishSettings::default()
        };
        assert_eq!(
            settings.upload_endpoint("staging"),
            "http://127.0.0.1:9000/api/webgl/upload"
        );
        assert_eq!(
            PublishSettings::default().progress_endpoint("dev"),
            "https://connect-dev.unity.com/api/webgl/progress"
        );
    }

    #[test]
    fn archive_sits_beside_the_artifact() {
        let settings = PublishSettings::default();
        assert_eq!(
            settings.archive_path_for(Path::new("/builds/demo")),
            PathBuf::from("/builds/publish_build.zip")
        );
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            settings.archive_path_for(Path::new("demo")),
            cwd.join("publish_build.zip")
        );
        assert_eq!(
            settings.archive_path_for(Path::new("/")),
            PathBuf::from("/publish_build.zip")
        );
    }
}
