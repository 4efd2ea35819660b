#[cfg(target_os = "windows")]
pub mod windows;

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

#[cfg(target_os = "windows")]
pub fn drive_letter(path: &Path) -> Option<OsString> {
    windows::drive_letter(path)
}

#[cfg(not(target_os = "windows"))]
pub fn drive_letter(_path: &Path) -> Option<OsString> {
    None
}

/// Path relative to its filesystem root, with any drive prefix and root
/// separator removed.
pub fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .map(|c| c.as_os_str())
        .collect()
}

/// Where `original` lives under a backup root. The drive letter, when there
/// is one, becomes the first directory so `C:\a` and `D:\a` stay distinct.
pub fn mirror_path(backup_root: &Path, original: &Path) -> PathBuf {
    let mut mirrored = backup_root.to_path_buf();
    if let Some(drive) = drive_letter(original) {
        mirrored.push(drive);
    }
    mirrored.push(strip_root(original));
    mirrored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_mirror_unix_path() {
        let mirrored = mirror_path(Path::new("/backups/cp_1"), Path::new("/home/user/notes.txt"));
        assert_eq!(mirrored, PathBuf::from("/backups/cp_1/home/user/notes.txt"));
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_mirror_keeps_drive_letter() {
        let mirrored = mirror_path(Path::new(r"D:\backups\cp_1"), Path::new(r"C:\Users\me\notes.txt"));
        assert_eq!(mirrored, PathBuf::from(r"D:\backups\cp_1\C\Users\me\notes.txt"));
    }

    #[test]
    fn test_strip_root_relative_path_unchanged() {
        assert_eq!(strip_root(Path::new("a/b.txt")), PathBuf::from("a/b.txt"));
    }
}
