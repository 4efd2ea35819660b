use std::ffi::OsString;
use std::path::{Component, Path, Prefix};

pub fn drive_letter(path: &Path) -> Option<OsString> {
    path.components().find_map(|component| match component {
        Component::Prefix(prefix) => match prefix.kind() {
            Prefix::Disk(letter) | Prefix::VerbatimDisk(letter) => {
                Some(OsString::from((letter as char).to_string()))
            }
            _ => None,
        },
        _ => None,
    })
}
