//! Continuous-filename grouping
//!
//! `VTS_01_1.VOB`, `VTS_01_2.VOB`, ... are one recording split across files.
//! The grouper follows the last number in each file stem upwards for as long
//! as the next name exists, and turns the chain into a single unit.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engine::AnalysisUnit;

/// Existence checks used while following a chain of names
pub trait FileLookup {
    fn exists(&self, path: &Path) -> bool;
}

/// Looks names up on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskLookup;

impl FileLookup for DiskLookup {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Merges sequentially numbered files into analysis units
pub struct ContinuousGrouper<L = DiskLookup> {
    lookup: L,
}

impl Default for ContinuousGrouper<DiskLookup> {
    fn default() -> Self {
        Self::new(DiskLookup)
    }
}

impl<L: FileLookup> ContinuousGrouper<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Group `paths` in input order
    ///
    /// A name counts as existing when it is one of the inputs or the lookup
    /// finds it. A file already consumed by an earlier chain is skipped; each
    /// group is represented by the first file of its chain.
    pub fn group(&self, paths: &[PathBuf]) -> Vec<AnalysisUnit> {
        let inputs: HashSet<&PathBuf> = paths.iter().collect();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut units = Vec::new();

        for path in paths {
            if !seen.insert(path.clone()) {
                continue;
            }
            let mut chain = vec![path.clone()];
            let mut current = path.clone();
            while let Some(next) = next_in_sequence(&current) {
                let listed = inputs.contains(&next) || self.lookup.exists(&next);
                if !listed || seen.contains(&next) {
                    break;
                }
                seen.insert(next.clone());
                chain.push(next.clone());
                current = next;
            }
            if chain.len() > 1 {
                debug!(first = %path.display(), files = chain.len(), "continuous files grouped");
            }
            units.extend(AnalysisUnit::group(chain));
        }
        units
    }
}

/// The name following `path` in a numbered sequence
///
/// The last run of ASCII digits in the stem is incremented, keeping its
/// zero-padded width. Names without digits have no successor.
pub fn next_in_sequence(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let bytes = stem.as_bytes();
    let end = bytes.iter().rposition(u8::is_ascii_digit)? + 1;
    let start = bytes[..end]
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map_or(0, |i| i + 1);

    let digits = &stem[start..end];
    let next = digits.parse::<u64>().ok()?.checked_add(1)?;
    let mut name = format!(
        "{}{:0width$}{}",
        &stem[..start],
        next,
        &stem[end..],
        width = digits.len()
    );
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(extension);
    }
    Some(path.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory directory listing
    struct Listing(HashSet<PathBuf>);

    impl Listing {
        fn of(names: &[&str]) -> Self {
            Self(names.iter().map(PathBuf::from).collect())
        }
    }

    impl FileLookup for Listing {
        fn exists(&self, path: &Path) -> bool {
            self.0.contains(path)
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_next_in_sequence() {
        let next = |name: &str| next_in_sequence(Path::new(name)).map(|p| p.display().to_string());
        assert_eq!(next("disc1.vob").as_deref(), Some("disc2.vob"));
        assert_eq!(next("VTS_01_1.VOB").as_deref(), Some("VTS_01_2.VOB"));
        assert_eq!(next("part009.ts").as_deref(), Some("part010.ts"));
        assert_eq!(next("take99").as_deref(), Some("take100"));
        assert_eq!(next("dir/a7b.mkv").as_deref(), Some("dir/a8b.mkv"));
        assert_eq!(next("movie.mp4"), None);
    }

    #[test]
    fn test_chain_consumes_later_inputs() {
        let lookup = Listing::of(&["disc1.vob", "disc2.vob", "disc3.vob", "other.mp4"]);
        let grouper = ContinuousGrouper::new(lookup);
        let units = grouper.group(&paths(&["disc1.vob", "other.mp4", "disc2.vob"]));

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].paths(), paths(&["disc1.vob", "disc2.vob", "disc3.vob"]).as_slice());
        assert_eq!(units[1].primary(), Path::new("other.mp4"));
    }

    #[test]
    fn test_chain_stops_at_gap() {
        let lookup = Listing::of(&["a1.ts", "a2.ts", "a4.ts"]);
        let units = ContinuousGrouper::new(lookup).group(&paths(&["a1.ts", "a4.ts"]));
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].paths().len(), 2);
        assert!(!units[1].is_group());
    }

    #[test]
    fn test_duplicate_inputs_are_one_unit() {
        let lookup = Listing::of(&["clip.mp4"]);
        let units = ContinuousGrouper::new(lookup).group(&paths(&["clip.mp4", "clip.mp4"]));
        assert_eq!(units.len(), 1);
    }
}
