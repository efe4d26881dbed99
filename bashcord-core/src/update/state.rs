// bashcord-core/src/update/state.rs
// Which payload build is on disk. Only the update pipeline writes state.json.

use std::fs::File;
use std::io::{BufRead, BufReader};

use bashcord_aio::{read_json_sync, write_json_sync};
use bashcord_common::config::Config;
use bashcord_common::error::Result;
use bashcord_common::model::{LocalState, ReleaseArtifact};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::patch::PAYLOAD_ENTRY;

lazy_static! {
    static ref PAYLOAD_HEADER_RE: Regex = Regex::new(r"^//\s*Vencord\s+([0-9A-Za-z]+)").unwrap();
}

pub fn load_state(config: &Config) -> LocalState {
    let path = config.state_file();
    if !path.exists() {
        return LocalState::default();
    }
    read_json_sync(&path).unwrap_or_else(|e| {
        warn!("Ignoring unreadable {}: {}", path.display(), e);
        LocalState::default()
    })
}

/// Commit hash of the local payload: the recorded state first, then the
/// header line of `patcher.js`. `None` whenever `patcher.js` is gone.
pub fn installed_hash(config: &Config) -> Option<String> {
    let patcher = config.payload_dir().join(PAYLOAD_ENTRY);
    if !patcher.is_file() {
        debug!("No payload at {}", patcher.display());
        return None;
    }
    if let Some(hash) = load_state(config).installed_hash {
        return Some(hash);
    }
    let file = File::open(&patcher).ok()?;
    let mut first_line = String::new();
    BufReader::new(file).read_line(&mut first_line).ok()?;
    let hash = header_hash(&first_line);
    debug!("Payload header of {}: {:?}", patcher.display(), hash);
    hash
}

fn header_hash(line: &str) -> Option<String> {
    PAYLOAD_HEADER_RE
        .captures(line.trim())
        .map(|c| c[1].to_string())
}

pub fn record_installed(config: &Config, release: &ReleaseArtifact) -> Result<()> {
    let state = LocalState {
        installed_hash: Some(release.commit_hash.clone()),
        installed_tag: Some(release.tag.clone()),
        updated_at: Some(Utc::now()),
    };
    write_json_sync(&config.state_file(), &state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn header_hash_is_read_from_patcher() {
        assert_eq!(header_hash("// Vencord 1a2b3c4\n").as_deref(), Some("1a2b3c4"));
        assert_eq!(header_hash("\"use strict\";"), None);

        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path());
        assert_eq!(installed_hash(&config), None);

        fs::create_dir_all(config.payload_dir()).unwrap();
        fs::write(
            config.payload_dir().join(PAYLOAD_ENTRY),
            "// Vencord deadbee\n(()=>{})();\n",
        )
        .unwrap();
        assert_eq!(installed_hash(&config).as_deref(), Some("deadbee"));
    }

    #[test]
    fn recorded_state_wins_over_header() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path());
        fs::create_dir_all(config.payload_dir()).unwrap();
        fs::write(config.payload_dir().join(PAYLOAD_ENTRY), "// Vencord 0000000\n").unwrap();

        let release = ReleaseArtifact {
            kind: bashcord_common::model::ReleaseKind::Payload,
            tag: "devbuild".into(),
            commit_hash: "1111111".into(),
            download_url: "https://example.invalid/patcher.js".into(),
            assets: vec![],
            html_url: None,
            published_at: None,
        };
        record_installed(&config, &release).unwrap();
        assert_eq!(installed_hash(&config).as_deref(), Some("1111111"));
        assert_eq!(load_state(&config).installed_tag.as_deref(), Some("devbuild"));
    }
}
