//! File naming conventions for HD sources and their UHD outputs.

use std::path::{Path, PathBuf};

use thiserror::Error;

const HD_TAG: &str = "1080p";
const UHD_TAG: &str = "2160p";
const UHD_ALT_TAG: &str = "-4k";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("Cannot derive an output name for {0}: no '1080p' in the file name")]
    NoHdTag(PathBuf),
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether the name marks an HD (1080p) release.
pub fn is_hd(name: &str) -> bool {
    name.contains(HD_TAG)
}

/// Whether the name marks a UHD release.
pub fn is_uhd(name: &str) -> bool {
    name.contains(UHD_TAG) || name.contains(UHD_ALT_TAG)
}

/// Sibling path with `1080p` replaced by `2160p` in the file name.
///
/// Directory components are left alone.
pub fn uhd_name(path: &Path) -> PathBuf {
    let name = file_name(path).replace(HD_TAG, UHD_TAG);
    path.with_file_name(name)
}

/// Default output for `input`; errors when the rename would be a no-op.
pub fn derive_output(input: &Path) -> Result<PathBuf, NamingError> {
    if !is_hd(&file_name(input)) {
        return Err(NamingError::NoHdTag(input.to_path_buf()));
    }
    Ok(uhd_name(input))
}

/// Episode key such as `S01E02` or `S01E02-03`, upper-cased.
///
/// Matches the first `S<digits>E<digits>` (any case) with an optional
/// `-<digits>` suffix for double episodes.
pub fn season_episode(name: &str) -> Option<String> {
    let bytes = name.as_bytes();

    for start in 0..bytes.len() {
        if !bytes[start].eq_ignore_ascii_case(&b's') {
            continue;
        }
        let mut i = start + 1;
        let season = digits(bytes, i);
        if season == 0 {
            continue;
        }
        i += season;
        if i >= bytes.len() || !bytes[i].eq_ignore_ascii_case(&b'e') {
            continue;
        }
        i += 1;
        let episode = digits(bytes, i);
        if episode == 0 {
            continue;
        }
        i += episode;
        if i < bytes.len() && bytes[i] == b'-' {
            let extra = digits(bytes, i + 1);
            if extra > 0 {
                i += 1 + extra;
            }
        }
        return Some(name[start..i].to_ascii_uppercase());
    }
    None
}

fn digits(bytes: &[u8], from: usize) -> usize {
    bytes
        .get(from..)
        .map(|rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uhd_name_only_touches_file_name() {
        let p = Path::new("/media/1080p/Show S01E01 1080p.mkv");
        assert_eq!(
            uhd_name(p),
            PathBuf::from("/media/1080p/Show S01E01 2160p.mkv")
        );
    }

    #[test]
    fn derive_output_requires_hd_tag() {
        assert!(derive_output(Path::new("/x/Show S01E01 720p.mkv")).is_err());
        assert_eq!(
            derive_output(Path::new("/x/a.1080p.mkv")).unwrap(),
            PathBuf::from("/x/a.2160p.mkv")
        );
    }

    #[test]
    fn hd_and_uhd_tags() {
        assert!(is_hd("Show.S01E01.1080p.mkv"));
        assert!(is_uhd("Show.S01E01.2160p.mkv"));
        assert!(is_uhd("Show.S01E01-4k.mkv"));
        assert!(!is_uhd("Show.S01E01.1080p.mkv"));
    }

    #[test]
    fn season_episode_variants() {
        assert_eq!(season_episode("Show.S01E02.1080p.mkv").as_deref(), Some("S01E02"));
        assert_eq!(season_episode("show s1e10 2160p").as_deref(), Some("S1E10"));
        assert_eq!(season_episode("Show S02E03-04 1080p").as_deref(), Some("S02E03-04"));
        assert_eq!(season_episode("Show S02E03- 1080p").as_deref(), Some("S02E03"));
        assert_eq!(season_episode("Special SE01 1080p"), None);
        assert_eq!(season_episode("Movie 1080p.mkv"), None);
    }
}
