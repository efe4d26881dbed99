// bashcord-core/src/locate.rs
//! Install Locator: walks the per-platform search roots and yields every
//! child directory named like a client bundle.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use bashcord_common::config::Config;
use bashcord_common::model::Branch;
use tracing::{debug, warn};

/// A directory that may hold a client bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub branch_hint: Option<Branch>,
}

/// One directory to scan and the child names that count as candidates.
#[derive(Debug, Clone)]
pub struct SearchRoot {
    pub dir: PathBuf,
    pub names: Vec<(String, Option<Branch>)>,
}

impl SearchRoot {
    pub fn new(dir: impl Into<PathBuf>, names: &[(&str, Option<Branch>)]) -> Self {
        Self {
            dir: dir.into(),
            names: names
                .iter()
                .map(|(n, b)| ((*n).to_string(), *b))
                .collect(),
        }
    }

    fn hint_for(&self, name: &str) -> Option<Option<Branch>> {
        self.names
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, b)| *b)
    }
}

const LINUX_NAMES: &[(&str, Option<Branch>)] = &[
    ("Discord", Some(Branch::Stable)),
    ("DiscordPTB", Some(Branch::Ptb)),
    ("DiscordCanary", Some(Branch::Canary)),
    ("DiscordDevelopment", Some(Branch::Development)),
    ("discord-ptb", Some(Branch::Ptb)),
    ("discord-canary", Some(Branch::Canary)),
    ("discord-development", Some(Branch::Development)),
    ("com.discordapp.Discord", Some(Branch::Stable)),
    ("com.discordapp.DiscordPTB", Some(Branch::Ptb)),
    ("com.discordapp.DiscordCanary", Some(Branch::Canary)),
    ("com.discordapp.DiscordDevelopment", Some(Branch::Development)),
];

const WINDOWS_NAMES: &[(&str, Option<Branch>)] = &[
    ("Discord", Some(Branch::Stable)),
    ("DiscordPTB", Some(Branch::Ptb)),
    ("DiscordCanary", Some(Branch::Canary)),
    ("DiscordDevelopment", Some(Branch::Development)),
];

const MACOS_NAMES: &[(&str, Option<Branch>)] = &[
    ("Discord.app", Some(Branch::Stable)),
    ("Discord PTB.app", Some(Branch::Ptb)),
    ("Discord Canary.app", Some(Branch::Canary)),
    ("Discord Development.app", Some(Branch::Development)),
];

/// Client directory names on Windows, as used by the scuffed check.
pub fn windows_dir_name(branch: Branch) -> &'static str {
    match branch {
        Branch::Stable => "Discord",
        Branch::Ptb => "DiscordPTB",
        Branch::Canary => "DiscordCanary",
        Branch::Development => "DiscordDevelopment",
    }
}

#[derive(Debug, Clone)]
pub struct InstallLocator {
    roots: Vec<SearchRoot>,
}

impl InstallLocator {
    pub fn new(roots: Vec<SearchRoot>) -> Self {
        Self { roots }
    }

    /// The conventional roots for the running OS.
    pub fn for_current_platform(config: &Config) -> Self {
        let roots = if cfg!(windows) {
            windows_roots(config)
        } else if cfg!(target_os = "macos") {
            macos_roots(config)
        } else {
            linux_roots(config)
        };
        Self::new(roots)
    }

    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    /// Lazily scans every root. A root that cannot be read yields nothing.
    pub fn locate(&self) -> Candidates<'_> {
        Candidates {
            roots: self.roots.iter(),
            current: None,
        }
    }
}

fn linux_roots(config: &Config) -> Vec<SearchRoot> {
    let home = config.home_dir();
    let mut dirs: Vec<PathBuf> = vec![
        PathBuf::from("/usr/share"),
        PathBuf::from("/usr/lib64"),
        PathBuf::from("/opt"),
        home.join(".local/share"),
        home.join(".dvm"),
        PathBuf::from("/var/lib/flatpak/app"),
        home.join(".local/share/flatpak/app"),
    ];
    dirs.dedup();
    dirs.into_iter()
        .map(|d| SearchRoot::new(d, LINUX_NAMES))
        .collect()
}

fn windows_roots(config: &Config) -> Vec<SearchRoot> {
    let Some(local) = config.local_app_data.clone() else {
        warn!("LOCALAPPDATA is not set, no Windows installs can be found");
        return Vec::new();
    };
    vec![SearchRoot::new(local, WINDOWS_NAMES)]
}

fn macos_roots(config: &Config) -> Vec<SearchRoot> {
    vec![
        SearchRoot::new("/Applications", MACOS_NAMES),
        SearchRoot::new(config.home_dir().join("Applications"), MACOS_NAMES),
    ]
}

/// Iterator returned by [`InstallLocator::locate`]. Not restartable.
pub struct Candidates<'a> {
    roots: std::slice::Iter<'a, SearchRoot>,
    current: Option<(&'a SearchRoot, fs::ReadDir)>,
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if let Some((root, entries)) = self.current.as_mut() {
                for entry in entries.by_ref() {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            debug!("Skipping unreadable entry in {}: {}", root.dir.display(), e);
                            continue;
                        }
                    };
                    let name = entry.file_name().to_string_lossy().to_string();
                    let Some(branch_hint) = root.hint_for(&name) else {
                        continue;
                    };
                    let path = entry.path();
                    if !path.is_dir() {
                        continue;
                    }
                    debug!("Found candidate {}", path.display());
                    return Some(Candidate { path, branch_hint });
                }
                self.current = None;
            }

            let root = self.roots.next()?;
            match fs::read_dir(&root.dir) {
                Ok(entries) => self.current = Some((root, entries)),
                Err(e) => debug!("Skipping search root {}: {}", root.dir.display(), e),
            }
        }
    }
}

/// Drops candidates whose absolute path was already seen.
pub fn dedup_candidates(candidates: impl IntoIterator<Item = Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(canonical_or_self(&c.path)))
        .collect()
}

fn canonical_or_self(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_only_matching_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Discord")).unwrap();
        fs::create_dir(dir.path().join("discord-canary")).unwrap();
        fs::create_dir(dir.path().join("Slack")).unwrap();
        fs::write(dir.path().join("DiscordPTB"), b"not a dir").unwrap();

        let locator = InstallLocator::new(vec![SearchRoot::new(dir.path(), LINUX_NAMES)]);
        let mut found: Vec<_> = locator.locate().collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].path, dir.path().join("Discord"));
        assert_eq!(found[0].branch_hint, Some(Branch::Stable));
        assert_eq!(found[1].branch_hint, Some(Branch::Canary));
    }

    #[test]
    fn unreadable_roots_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("DiscordCanary")).unwrap();

        let locator = InstallLocator::new(vec![
            SearchRoot::new(dir.path().join("does-not-exist"), LINUX_NAMES),
            SearchRoot::new(dir.path(), LINUX_NAMES),
        ]);
        let found: Vec<_> = locator.locate().collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].branch_hint, Some(Branch::Canary));
    }

    #[test]
    fn duplicates_are_removed_by_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Discord")).unwrap();
        let locator = InstallLocator::new(vec![
            SearchRoot::new(dir.path(), LINUX_NAMES),
            SearchRoot::new(dir.path(), LINUX_NAMES),
        ]);
        assert_eq!(locator.locate().count(), 2);
        assert_eq!(dedup_candidates(locator.locate()).len(), 1);
    }

    #[test]
    fn linux_roots_include_user_and_flatpak_locations() {
        let config = Config::with_data_dir("/home/alice");
        let roots: Vec<_> = linux_roots(&config).into_iter().map(|r| r.dir).collect();
        assert!(roots.contains(&PathBuf::from("/home/alice/.local/share")));
        assert!(roots.contains(&PathBuf::from("/var/lib/flatpak/app")));
        assert!(roots.contains(&PathBuf::from("/home/alice/.local/share/flatpak/app")));
    }
}
