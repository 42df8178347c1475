#![allow(dead_code)]
use std::path::Path;

use gitbackup_core::CandidateFile;

/// Writes `content` to `rel` below `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Candidate for a file that does not need to exist on disk.
pub fn candidate(rel: &str, size: u64) -> CandidateFile {
    CandidateFile {
        path: Path::new("/nonexistent").join(rel),
        relative: rel.to_string(),
        modified: None,
        size: Some(size),
    }
}

/// Writes an INI file into `dir` and returns its path.
pub fn ini(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("gitbackup.ini");
    std::fs::write(&path, body).unwrap();
    path
}
