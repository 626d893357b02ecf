use std::path::PathBuf;

/// What a front end should show for a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Ready,
    Login,
    Archiving,
    Uploading,
    Processing,
    Published,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishView {
    pub screen: Screen,
    /// Title as it will be sent, with the placeholder applied.
    pub title: String,
    pub artifact_dir: PathBuf,
    pub remote_url: String,
    pub error_message: String,
}
