// bashcord-net/src/lib.rs
pub mod http;
pub mod release;
pub mod validation;

pub use bashcord_common::{
    error::{BashcordError, Result},
    model::{ReleaseArtifact, ReleaseAsset, ReleaseKind},
    Config,
};
pub use http::{build_http_client, download_to_path};
pub use release::{parse_release, ReleaseResolver, TargetPlatform, PAYLOAD_FILES};
pub use validation::validate_url;
