//! `require()` specifier resolution
//!
//! Relative (`./x`, `../x`) and absolute specifiers resolve against the
//! requiring module's directory. Anything else is a package name looked up in
//! `node_modules` directories, from the requiring directory up to the root.
//!
//! For every base path the candidates are tried in order: the exact file,
//! `<path>.js`, `<path>.json`, the `main` of `<path>/package.json`,
//! `<path>/index.js`, `<path>/index.json`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot find module '{specifier}' from '{}'", from.display())]
pub struct ResolveError {
    pub specifier: String,
    pub from: PathBuf,
}

#[derive(Deserialize)]
struct PackageManifest {
    main: Option<String>,
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

/// Resolve `specifier` as required from a module living in `from_dir`
pub fn resolve(specifier: &str, from_dir: &Path) -> Result<PathBuf, ResolveError> {
    let not_found = || ResolveError {
        specifier: specifier.to_string(),
        from: from_dir.to_path_buf(),
    };

    if specifier.is_empty() {
        return Err(not_found());
    }

    if is_path_specifier(specifier) {
        return resolve_path(&from_dir.join(specifier)).ok_or_else(not_found);
    }

    from_dir
        .ancestors()
        .filter(|dir| dir.file_name().map_or(true, |name| name != "node_modules"))
        .find_map(|dir| resolve_path(&dir.join("node_modules").join(specifier)))
        .ok_or_else(not_found)
}

fn resolve_path(base: &Path) -> Option<PathBuf> {
    resolve_file(base).or_else(|| resolve_directory(base))
}

fn resolve_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    ["js", "json"].iter().find_map(|ext| {
        let mut name = base.as_os_str().to_os_string();
        name.push(".");
        name.push(ext);
        let candidate = PathBuf::from(name);
        candidate.is_file().then_some(candidate)
    })
}

fn resolve_directory(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    if let Some(main) = package_main(dir) {
        let target = dir.join(main);
        if let Some(found) = resolve_file(&target).or_else(|| resolve_index(&target)) {
            return Some(found);
        }
    }
    resolve_index(dir)
}

fn resolve_index(dir: &Path) -> Option<PathBuf> {
    ["index.js", "index.json"]
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn package_main(dir: &Path) -> Option<String> {
    let text = std::fs::read_to_string(dir.join("package.json")).ok()?;
    match serde_json::from_str::<PackageManifest>(&text) {
        Ok(manifest) => manifest.main.filter(|main| !main.is_empty()),
        Err(err) => {
            tracing::debug!("ignoring unreadable {}/package.json: {}", dir.display(), err);
            None
        }
    }
}
