// bashcord-core/src/inject.rs
//! The replacement entry point written over `app.asar` by a patch.

use bashcord_common::error::Result;
use bashcord_common::model::install::BOOTSTRAP_DIRNAME;

use crate::asar;
use crate::patch::PAYLOAD_ENTRY;

/// Versioned token identifying an entry point written by this engine.
pub const INJECTION_MARKER: &str = "bashcord-injector v1";

/// Script that only loads the payload. The payload boots `../_app.asar`
/// itself, so nothing here may load the client a second time.
pub fn index_js() -> String {
    format!(
        r#""{INJECTION_MARKER}";
require(require("path").join(__dirname, "..", "{BOOTSTRAP_DIRNAME}", "{PAYLOAD_ENTRY}"));
"#
    )
}

const PACKAGE_JSON: &str = r#"{"name":"discord","main":"index.js"}"#;

/// Bytes of the patched `app.asar`.
pub fn entry_point_archive() -> Result<Vec<u8>> {
    let index = index_js();
    asar::write_archive(&[
        ("index.js", index.as_bytes()),
        ("package.json", PACKAGE_JSON.as_bytes()),
    ])
}

pub fn carries_marker(bytes: &[u8]) -> bool {
    let marker = INJECTION_MARKER.as_bytes();
    bytes.windows(marker.len()).any(|w| w == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_the_first_statement() {
        let archive = entry_point_archive().unwrap();
        let index = asar::read_file(&archive, "index.js").unwrap().unwrap();
        let index = String::from_utf8(index).unwrap();
        assert!(index.starts_with(&format!("\"{INJECTION_MARKER}\";")));
        assert!(index.contains("\"bashcord\", \"patcher.js\""));
        assert!(carries_marker(&archive));
    }

    #[test]
    fn entry_point_boots_the_client_only_through_the_payload() {
        let index = index_js();
        assert_eq!(index.matches("patcher.js").count(), 1);
        assert!(!index.contains("_app.asar"));
        assert!(!index.contains("openasar"));
        assert_eq!(index.lines().filter(|l| !l.trim().is_empty()).count(), 2);
    }

    #[test]
    fn package_json_points_at_index() {
        let archive = entry_point_archive().unwrap();
        let pkg = asar::read_file(&archive, "package.json").unwrap().unwrap();
        let pkg: serde_json::Value = serde_json::from_slice(&pkg).unwrap();
        assert_eq!(pkg["main"], "index.js");
    }

    #[test]
    fn plain_archives_do_not_carry_the_marker() {
        let archive = asar::write_archive(&[("index.js", b"require('./app')".as_slice())]).unwrap();
        assert!(!carries_marker(&archive));
        assert!(!carries_marker(b""));
    }
}
