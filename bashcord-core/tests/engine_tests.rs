// End-to-end checks of the engine against throwaway client bundles.

use std::fs;
use std::path::{Path, PathBuf};

use bashcord_aio::{fingerprint_dir, fingerprint_file};
use bashcord_common::model::install::{
    BOOTSTRAP_DIRNAME, ENTRY_POINT_FILENAME, RECOVERY_FILENAME, SECONDARY_MOD_FILENAME,
    VERSION_DESCRIPTOR_FILENAME,
};
use bashcord_core::locate::{InstallLocator, SearchRoot};
use bashcord_core::{asar, inject, BashcordError, Branch, Config, Engine, PatchState};

const ORIGINAL_INDEX: &[u8] = b"require('./app_bootstrap/index.js');";

struct Fixture {
    dir: tempfile::TempDir,
    engine: Engine,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().join("data"));
        let payload = config.payload_dir();
        fs::create_dir_all(&payload).unwrap();
        fs::write(payload.join("patcher.js"), "// Vencord 1a2b3c4\n").unwrap();
        fs::write(payload.join("renderer.js"), "console.log('hi')").unwrap();
        Self {
            dir,
            engine: Engine::new(config),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    /// A Linux-style bundle `<root>/<name>/resources`.
    fn bundle(&self, name: &str, channel: &str) -> PathBuf {
        let path = self.root().join("installs").join(name);
        let resources = path.join("resources");
        fs::create_dir_all(&resources).unwrap();
        fs::write(
            resources.join(VERSION_DESCRIPTOR_FILENAME),
            format!(r#"{{"releaseChannel":"{channel}","version":"0.0.100"}}"#),
        )
        .unwrap();
        let original = asar::write_archive(&[
            ("index.js", ORIGINAL_INDEX),
            ("package.json", br#"{"name":"discord","main":"index.js"}"#.as_slice()),
        ])
        .unwrap();
        fs::write(resources.join(ENTRY_POINT_FILENAME), original).unwrap();
        path
    }
}

fn resources(path: &Path) -> PathBuf {
    path.join("resources")
}

#[test]
fn unpatch_restores_the_entry_point_byte_for_byte() {
    let fx = Fixture::new();
    let path = fx.bundle("Discord", "stable");
    let before = fingerprint_file(&resources(&path).join(ENTRY_POINT_FILENAME)).unwrap();

    let inst = fx.engine.classify_custom_path(&path).unwrap();
    let patched = fx.engine.patch(&inst).unwrap();
    assert_eq!(patched.patch_state, PatchState::Patched);

    let restored = fx.engine.unpatch(&patched).unwrap();
    assert_eq!(restored.patch_state, PatchState::Unpatched);
    assert_eq!(
        fingerprint_file(&resources(&path).join(ENTRY_POINT_FILENAME)).unwrap(),
        before
    );
    assert!(!resources(&path).join(RECOVERY_FILENAME).exists());
    assert!(!resources(&path).join(BOOTSTRAP_DIRNAME).exists());
}

#[test]
fn patching_twice_is_the_same_as_patching_once() {
    let fx = Fixture::new();
    let path = fx.bundle("Discord", "stable");
    let original = fs::read(resources(&path).join(ENTRY_POINT_FILENAME)).unwrap();

    let inst = fx.engine.classify_custom_path(&path).unwrap();
    let once = fx.engine.patch(&inst).unwrap();
    let after_once = fingerprint_dir(&resources(&path)).unwrap();

    let twice = fx.engine.patch(&once).unwrap();
    assert_eq!(fingerprint_dir(&resources(&path)).unwrap(), after_once);
    assert_eq!(twice.patch_state, PatchState::Patched);
    assert_eq!(
        fs::read(resources(&path).join(RECOVERY_FILENAME)).unwrap(),
        original
    );
}

#[test]
fn classification_is_stable_without_mutation() {
    let fx = Fixture::new();
    let path = fx.bundle("DiscordPTB", "ptb");
    let first = fx.engine.classify_custom_path(&path).unwrap();
    let second = fx.engine.classify_custom_path(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.branch, Branch::Ptb);
}

#[test]
fn scuffed_installs_refuse_to_patch_and_stay_untouched() {
    let mut fx = Fixture::new();
    let path = fx.bundle("Discord", "stable");
    let mut config = fx.engine.config().clone();
    config.program_data_dir = Some(fx.root().join("ProgramData"));
    config.username = Some("alice".into());
    fs::create_dir_all(fx.root().join("ProgramData/alice/Discord")).unwrap();
    fx.engine = Engine::new(config);

    let before = fingerprint_dir(&resources(&path)).unwrap();
    let inst = fx.engine.classify_custom_path(&path).unwrap();
    assert_eq!(inst.display_state(), PatchState::Scuffed);

    let err = fx.engine.patch(&inst).unwrap_err();
    assert!(matches!(err, BashcordError::ScuffedInstall(_)));
    assert_eq!(fingerprint_dir(&resources(&path)).unwrap(), before);
}

#[test]
fn a_stale_record_cannot_patch_an_install_that_became_scuffed() {
    let mut fx = Fixture::new();
    let path = fx.bundle("Discord", "stable");
    let mut config = fx.engine.config().clone();
    config.program_data_dir = Some(fx.root().join("ProgramData"));
    config.username = Some("alice".into());
    fx.engine = Engine::new(config);

    let stale = fx.engine.classify_custom_path(&path).unwrap();
    assert!(!stale.scuffed);
    fs::create_dir_all(fx.root().join("ProgramData/alice/Discord")).unwrap();

    let before = fingerprint_dir(&resources(&path)).unwrap();
    let err = fx.engine.patch(&stale).unwrap_err();
    assert!(matches!(err, BashcordError::ScuffedInstall(_)));
    assert_eq!(fingerprint_dir(&resources(&path)).unwrap(), before);
}

fn seed_openasar(fx: &Fixture) {
    // Seed the download cache so no network is needed.
    let cache_dir = fx.engine.config().cache_dir();
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(
        cache_dir.join(bashcord_core::secondary::OPENASAR_CACHE_FILENAME),
        b"/* OpenAsar nightly */",
    )
    .unwrap();
}

#[tokio::test]
async fn unpatch_with_openasar_active_restores_the_original() {
    let fx = Fixture::new();
    let path = fx.bundle("Discord", "stable");
    let entry = resources(&path).join(ENTRY_POINT_FILENAME);
    let original = fs::read(&entry).unwrap();
    seed_openasar(&fx);

    let inst = fx.engine.classify_custom_path(&path).unwrap();
    let patched = fx.engine.patch(&inst).unwrap();
    let with_mod = fx.engine.toggle_secondary_mod(&patched).await.unwrap();
    assert_eq!(with_mod.patch_state, PatchState::SecondaryModPatched);
    assert_eq!(
        fs::read(resources(&path).join(RECOVERY_FILENAME)).unwrap(),
        b"/* OpenAsar nightly */"
    );

    let restored = fx.engine.unpatch(&with_mod).unwrap();
    assert_eq!(restored.patch_state, PatchState::Unpatched);
    assert!(restored.secondary_mod);
    assert_eq!(fs::read(&entry).unwrap(), original);
    assert!(!resources(&path).join(RECOVERY_FILENAME).exists());

    let repatched = fx.engine.patch(&restored).unwrap();
    assert_eq!(repatched.patch_state, PatchState::SecondaryModPatched);
    let back = fx.engine.unpatch(&repatched).unwrap();
    assert_eq!(back.patch_state, PatchState::Unpatched);
    assert_eq!(fs::read(&entry).unwrap(), original);
}

#[tokio::test]
async fn secondary_mod_toggle_never_touches_the_entry_point() {
    let fx = Fixture::new();
    let path = fx.bundle("Discord", "stable");
    let inst = fx.engine.classify_custom_path(&path).unwrap();
    let inst = fx.engine.patch(&inst).unwrap();
    let entry = resources(&path).join(ENTRY_POINT_FILENAME);
    let before = fingerprint_file(&entry).unwrap();
    seed_openasar(&fx);

    let with_mod = fx.engine.toggle_secondary_mod(&inst).await.unwrap();
    assert!(with_mod.secondary_mod);
    assert_eq!(with_mod.patch_state, PatchState::SecondaryModPatched);
    assert!(resources(&path).join(SECONDARY_MOD_FILENAME).is_file());
    assert_eq!(fingerprint_file(&entry).unwrap(), before);

    let again = fx.engine.install_secondary_mod(&with_mod).await.unwrap();
    assert_eq!(again, with_mod);

    let without = fx.engine.toggle_secondary_mod(&again).await.unwrap();
    assert!(!without.secondary_mod);
    assert_eq!(without.patch_state, PatchState::Patched);
    assert_eq!(fingerprint_file(&entry).unwrap(), before);
}

#[test]
fn stable_and_canary_are_found_and_patched_independently() {
    let fx = Fixture::new();
    let stable = fx.bundle("Discord", "stable");
    let canary = fx.bundle("DiscordCanary", "canary");
    fs::create_dir_all(fx.root().join("installs/Slack")).unwrap();

    let locator = InstallLocator::new(vec![SearchRoot::new(
        fx.root().join("installs"),
        &[
            ("Discord", Some(Branch::Stable)),
            ("DiscordCanary", Some(Branch::Canary)),
            ("Slack", None),
        ],
    )]);
    let mut installs = fx.engine.classify_all(&locator);
    installs.sort_by_key(|i| i.branch.as_str());
    assert_eq!(installs.len(), 2);
    assert_eq!(installs[0].branch, Branch::Canary);
    assert_eq!(installs[1].branch, Branch::Stable);
    assert!(installs.iter().all(|i| i.patch_state == PatchState::Unpatched));

    let canary_inst = fx.engine.patch(&installs[0]).unwrap();
    assert_eq!(canary_inst.patch_state, PatchState::Patched);

    let archive = fs::read(resources(&canary).join(ENTRY_POINT_FILENAME)).unwrap();
    let index = asar::read_file(&archive, "index.js").unwrap().unwrap();
    let index = String::from_utf8(index).unwrap();
    assert!(index.starts_with(&format!("\"{}\";", inject::INJECTION_MARKER)));

    let stable_inst = fx.engine.classify_custom_path(&stable).unwrap();
    assert_eq!(stable_inst.patch_state, PatchState::Unpatched);
    let stable_entry = fs::read(resources(&stable).join(ENTRY_POINT_FILENAME)).unwrap();
    assert_eq!(
        asar::read_file(&stable_entry, "index.js").unwrap().unwrap(),
        ORIGINAL_INDEX
    );
}

#[test]
fn bootstrap_holds_a_copy_of_the_payload() {
    let fx = Fixture::new();
    let path = fx.bundle("Discord", "stable");
    let inst = fx.engine.classify_custom_path(&path).unwrap();
    fx.engine.patch(&inst).unwrap();

    assert_eq!(
        fingerprint_dir(&resources(&path).join(BOOTSTRAP_DIRNAME)).unwrap(),
        fingerprint_dir(&fx.engine.config().payload_dir()).unwrap()
    );
}

#[test]
fn custom_paths_that_are_not_installs_are_rejected() {
    let fx = Fixture::new();
    let not_an_install = fx.root().join("Documents");
    fs::create_dir_all(&not_an_install).unwrap();
    assert!(fx.engine.classify_custom_path(&not_an_install).is_none());
}

#[cfg(unix)]
#[test]
fn permission_failures_are_reported_as_such() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    let path = fx.bundle("Discord", "stable");
    let inst = fx.engine.classify_custom_path(&path).unwrap();
    let res = resources(&path);
    fs::set_permissions(&res, fs::Permissions::from_mode(0o555)).unwrap();

    // Root ignores directory permissions; nothing to assert then.
    if fs::write(res.join(".write-check"), b"").is_ok() {
        let _ = fs::remove_file(res.join(".write-check"));
        fs::set_permissions(&res, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }
    let err = fx.engine.patch(&inst).unwrap_err();
    fs::set_permissions(&res, fs::Permissions::from_mode(0o755)).unwrap();
    assert!(err.is_permission_denied(), "unexpected error: {err}");
}
