//! Pair-list parsing.
//!
//! One pair per line, whitespace separated:
//!
//! ```text
//! <id> <img1> <img2> <relation> <label>
//! ```
//!
//! The leading `<id>` column is optional. `label` is `1` (kin) or `0`.
//! Blank lines and lines starting with `#` are skipped. Image paths are
//! resolved against `image_root` unless they are absolute.

use std::path::{Path, PathBuf};

use crate::error::DatasetError;
use crate::types::{KinPair, KinRelation};

/// Read a pair list from disk.
pub fn read_pairs(path: &Path, image_root: &Path) -> Result<Vec<KinPair>, DatasetError> {
    let contents = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pairs = parse_pairs(&contents, path, image_root)?;
    tracing::debug!(count = pairs.len(), path = %path.display(), "Read kin pairs");
    Ok(pairs)
}

/// Parse pair-list text. `origin` is only used in error messages.
pub fn parse_pairs(
    contents: &str,
    origin: &Path,
    image_root: &Path,
) -> Result<Vec<KinPair>, DatasetError> {
    let mut pairs = Vec::new();
    for (i, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let fields = match fields.len() {
            5 => &fields[1..],
            4 => &fields[..],
            n => {
                return Err(DatasetError::Parse {
                    path: origin.to_path_buf(),
                    line: i + 1,
                    message: format!("expected 4 or 5 fields, found {n}"),
                })
            }
        };

        let relation: KinRelation = fields[2].parse()?;
        let label = match fields[3] {
            "1" => true,
            "0" => false,
            other => {
                return Err(DatasetError::Parse {
                    path: origin.to_path_buf(),
                    line: i + 1,
                    message: format!("label must be 0 or 1, found {other:?}"),
                })
            }
        };

        pairs.push(KinPair {
            left: resolve(image_root, fields[0]),
            right: resolve(image_root, fields[1]),
            relation,
            label,
        });
    }
    Ok(pairs)
}

fn resolve(root: &Path, p: &str) -> PathBuf {
    let p = Path::new(p);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_id() {
        let text = "\
# id img1 img2 rel label
0 F0001/MID1/a.jpg F0001/MID3/b.jpg fd 1

F0002/MID1/c.jpg F0009/MID2/d.jpg ms 0
";
        let pairs = parse_pairs(text, Path::new("val.txt"), Path::new("/data")).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].left, PathBuf::from("/data/F0001/MID1/a.jpg"));
        assert_eq!(pairs[0].relation, KinRelation::Fd);
        assert!(pairs[0].label);
        assert_eq!(pairs[1].right, PathBuf::from("/data/F0009/MID2/d.jpg"));
        assert_eq!(pairs[1].relation, KinRelation::Ms);
        assert!(!pairs[1].label);
    }

    #[test]
    fn test_bad_field_count_reports_line() {
        let text = "a.jpg b.jpg fd\n";
        let err = parse_pairs(text, Path::new("val.txt"), Path::new("/data")).unwrap_err();
        match err {
            DatasetError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_label() {
        let text = "a.jpg b.jpg fd yes\n";
        assert!(parse_pairs(text, Path::new("val.txt"), Path::new("/data")).is_err());
    }

    #[test]
    fn test_absolute_paths_kept() {
        let text = "/abs/a.jpg rel/b.jpg bb 1\n";
        let pairs = parse_pairs(text, Path::new("val.txt"), Path::new("/data")).unwrap();
        assert_eq!(pairs[0].left, PathBuf::from("/abs/a.jpg"));
        assert_eq!(pairs[0].right, PathBuf::from("/data/rel/b.jpg"));
    }
}
