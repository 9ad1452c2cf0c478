use std::path::{Path, PathBuf};

use crate::error::Result;

/// Find the most recent `.jsonl` file in `dir` by modification time.
///
/// Returns `Ok(None)` when the directory does not exist or holds no
/// transcripts — a fresh install, not an error.
pub fn newest_transcript(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let is_newer = best
            .as_ref()
            .map(|(_, best_time)| modified > *best_time)
            .unwrap_or(true);

        if is_newer {
            best = Some((path, modified));
        }
    }

    Ok(best.map(|(path, _)| path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::{Duration, SystemTime};

    #[test]
    fn missing_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = dir.path().join("nope");
        assert!(newest_transcript(&ghost).unwrap().is_none());
    }

    #[test]
    fn ignores_non_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        assert!(newest_transcript(dir.path()).unwrap().is_none());
    }

    #[test]
    fn picks_most_recently_modified() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("a.jsonl");
        let new = dir.path().join("b.jsonl");

        let mut f = File::create(&old).unwrap();
        f.write_all(b"{}\n").unwrap();
        f.set_modified(SystemTime::now() - Duration::from_secs(600))
            .unwrap();

        File::create(&new).unwrap();

        assert_eq!(newest_transcript(dir.path()).unwrap().unwrap(), new);
    }
}
