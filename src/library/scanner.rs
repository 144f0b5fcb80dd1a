use std::path::Path;
use walkdir::WalkDir;

/// Extensions served as sounds
const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg"];

pub fn is_sound_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Scanner for the sounds directory
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// List sound file names directly inside `directory`, sorted by name.
    /// Subdirectories are not descended into.
    pub fn scan<P: AsRef<Path>>(directory: P) -> std::io::Result<Vec<String>> {
        let directory = directory.as_ref();
        // WalkDir swallows a missing root into its iterator; surface it instead
        std::fs::read_dir(directory)?;

        let mut sound_files = Vec::new();

        for entry in WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if is_sound_file(&name) {
                tracing::debug!("Found sound file: {}", name);
                sound_files.push(name);
            }
        }

        sound_files.sort();
        tracing::debug!("Total sound files found: {}", sound_files.len());
        Ok(sound_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.wav", "a.mp3", "notes.txt", "C.OGG", "cover.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.mp3")).unwrap();
        fs::write(dir.path().join("nested.mp3").join("deep.mp3"), b"x").unwrap();

        let found = DirectoryScanner::scan(dir.path()).unwrap();
        assert_eq!(found, vec!["C.OGG", "a.mp3", "b.wav"]);
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectoryScanner::scan(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_is_sound_file() {
        assert!(is_sound_file("Old Phone Ringtone.mp3"));
        assert!(is_sound_file("x.Wav"));
        assert!(!is_sound_file("mp3"));
        assert!(!is_sound_file("index.html"));
    }
}
