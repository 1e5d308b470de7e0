use std::env;
use std::path::{Path, PathBuf};

/// Locate an executable: an explicit path wins, otherwise search `PATH`.
pub fn find_executable(name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return p.is_file().then(|| p.to_path_buf());
    }
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .flat_map(|dir| candidate_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|candidate| candidate.is_file())
}

fn candidate_names(name: &str) -> Vec<String> {
    if cfg!(windows) && Path::new(name).extension().is_none() {
        vec![format!("{name}.exe"), format!("{name}.cmd"), name.to_string()]
    } else {
        vec![name.to_string()]
    }
}

/// Find the decryptor next to the project first, then via config or `PATH`.
pub fn find_decryptor(project_root: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    let local = ["tools", ".", "web"]
        .iter()
        .flat_map(|sub| ["um.exe", "um"].map(|n| project_root.join(sub).join(n)))
        .find(|c| c.is_file());
    local.or_else(|| find_executable("um", explicit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempdir().unwrap();
        let tool = dir.path().join("ffmpeg");
        assert!(find_executable("ffmpeg", Some(&tool)).is_none());
        fs::write(&tool, b"#!/bin/sh\n").unwrap();
        assert_eq!(find_executable("ffmpeg", Some(&tool)), Some(tool));
    }

    #[test]
    fn decryptor_prefers_project_tools_dir() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tools")).unwrap();
        fs::write(dir.path().join("tools").join("um"), b"bin").unwrap();
        fs::write(dir.path().join("um"), b"bin").unwrap();

        let found = find_decryptor(dir.path(), None).unwrap();
        assert_eq!(found, dir.path().join("tools").join("um"));
    }
}
