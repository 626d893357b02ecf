//! Publisher engine: side effects of the publish workflow.
mod archive;
mod clock;
mod engine;
mod middleware;
mod persist;
mod session;
mod settings;
mod transport;
mod validate;

pub use archive::{create_archive, ArchiveError, ArchiveInfo};
pub use clock::{Clock, TokioClock};
pub use engine::PublishEngine;
pub use middleware::{Collaborators, PublishMiddleware};
pub use persist::{ensure_output_dir, write_atomically, CorrelationFile, PersistError};
pub use session::{Session, SurfaceFlag, SurfaceProbe};
pub use settings::{
    base_url_for, PublishSettings, DEV_BASE_URL, MAX_ARCHIVE_BYTES, PRODUCTION_BASE_URL,
    STAGING_BASE_URL,
};
pub use transport::{
    ProgressReport, ProgressRequest, PublishTransport, ReqwestTransport, TransportError,
    TransportFailure, UploadCounter, UploadReceipt, UploadRequest,
};
pub use validate::{
    build_version, folder_size, read_artifact_id, ArtifactValidator, WebBuildValidator,
    ARTIFACT_ID_FILE, VERSION_FILE,
};
