use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

const CONFIG_FILE_NAME: &str = "config.toml";

const TOKEN_FILE_NAME: &str = "token.json";

/// Candidate config file locations in priority order:
/// `$XDG_CONFIG_HOME/ffbox/config.toml`, then `$HOME/.config/ffbox/config.toml`.
pub static CONFIG_CANDIDATES: LazyLock<Vec<PathBuf>> = LazyLock::new(|| {
    config_candidates_from(
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from).as_deref(),
        dirs::home_dir().as_deref(),
    )
});

/// Path to the user config file.
///
/// The first existing candidate, or the first candidate if none exist yet.
/// Returns `None` if neither `XDG_CONFIG_HOME` nor the home directory is known.
pub static CONFIG_PATH: LazyLock<Option<PathBuf>> = LazyLock::new(|| {
    CONFIG_CANDIDATES
        .iter()
        .find(|path| path.is_file())
        .or_else(|| CONFIG_CANDIDATES.first())
        .cloned()
});

/// Config directories for the given `XDG_CONFIG_HOME` and home directory.
///
/// An empty `XDG_CONFIG_HOME` is treated as unset.
#[must_use]
pub fn config_candidates_from(xdg_config_home: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        candidates.push(xdg.join(PROJECT_NAME).join(CONFIG_FILE_NAME));
    }
    if let Some(home) = home {
        let path = home.join(".config").join(PROJECT_NAME).join(CONFIG_FILE_NAME);
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    }
    candidates
}

/// Default location of the OAuth2 token file, next to the config file.
#[must_use]
pub fn default_token_path() -> Option<PathBuf> {
    CONFIG_PATH
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| dir.join(TOKEN_FILE_NAME))
}

#[cfg(test)]
mod test_config_paths {
    use super::*;

    #[test]
    fn xdg_takes_priority_over_home() {
        let candidates = config_candidates_from(Some(Path::new("/xdg")), Some(Path::new("/home/me")));
        assert_eq!(
            candidates,
            [
                PathBuf::from("/xdg/ffbox/config.toml"),
                PathBuf::from("/home/me/.config/ffbox/config.toml"),
            ]
        );
    }

    #[test]
    fn empty_xdg_is_ignored() {
        let candidates = config_candidates_from(Some(Path::new("")), Some(Path::new("/home/me")));
        assert_eq!(candidates, [PathBuf::from("/home/me/.config/ffbox/config.toml")]);
    }

    #[test]
    fn same_location_is_listed_once() {
        let candidates = config_candidates_from(Some(Path::new("/home/me/.config")), Some(Path::new("/home/me")));
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn no_locations_without_directories() {
        assert!(config_candidates_from(None, None).is_empty());
    }
}
