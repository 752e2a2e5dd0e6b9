//! Line codec for the two registry files.
//!
//! Both files are plain `left:right` ledgers, one entry per line, shared with
//! the XFS tooling:
//!
//! - project registry (`/etc/projects`): `"<project_id>:<path>\n"`
//! - id registry (`/etc/projid`): `"<customer>:<project_id>\n"`
//!
//! Blank lines and `#` comments are ignored on read. Paths may themselves
//! contain `:`, so project lines split on the first separator and id lines on
//! the last.

use crate::{CorruptLinePolicy, Error, ProjectEntry, ProjectId, ProjectIdEntry, Result};
use std::path::{Path, PathBuf};

pub(crate) fn format_project_line(entry: &ProjectEntry) -> String {
    format!("{}:{}\n", entry.project_id, entry.path.display())
}

pub(crate) fn format_id_line(entry: &ProjectIdEntry) -> String {
    format!("{}:{}\n", entry.customer, entry.project_id)
}

fn parse_project_line(line: &str) -> Option<ProjectEntry> {
    let (id, path) = line.split_once(':')?;
    if path.is_empty() {
        return None;
    }
    Some(ProjectEntry {
        project_id: id.parse().ok()?,
        path: PathBuf::from(path),
    })
}

fn parse_id_line(line: &str) -> Option<ProjectIdEntry> {
    let (customer, id) = line.rsplit_once(':')?;
    if customer.is_empty() {
        return None;
    }
    Some(ProjectIdEntry {
        customer: customer.to_owned(),
        project_id: id.parse().ok()?,
    })
}

fn parse_lines<T>(
    path: &Path,
    contents: &[u8],
    policy: CorruptLinePolicy,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>> {
    let mut entries = Vec::new();
    for (idx, raw) in contents.split(|&b| b == b'\n').enumerate() {
        // Non-UTF-8 lines are unparseable like any other malformed line.
        let parsed = match core::str::from_utf8(raw).map(str::trim) {
            Ok(line) if line.is_empty() || line.starts_with('#') => continue,
            Ok(line) => parse(line),
            Err(_) => None,
        };
        if let Some(entry) = parsed {
            entries.push(entry);
            continue;
        }

        let content = String::from_utf8_lossy(raw).into_owned();
        match policy {
            CorruptLinePolicy::Reject => {
                return Err(Error::RegistryCorrupt {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    content,
                });
            }
            CorruptLinePolicy::Skip => {
                tracing::warn!(
                    registry = %path.display(),
                    line = idx + 1,
                    %content,
                    "skipping corrupt registry line"
                );
            }
        }
    }
    Ok(entries)
}

/// Parses the raw contents of a project registry.
///
/// # Errors
///
/// With [`CorruptLinePolicy::Reject`], returns [`Error::RegistryCorrupt`] for
/// the first line that is not valid UTF-8 of the form
/// `<positive id>:<non-empty path>`.
pub fn parse_projects(
    path: &Path,
    contents: impl AsRef<[u8]>,
    policy: CorruptLinePolicy,
) -> Result<Vec<ProjectEntry>> {
    parse_lines(path, contents.as_ref(), policy, parse_project_line)
}

/// Parses the raw contents of an id registry.
///
/// # Errors
///
/// With [`CorruptLinePolicy::Reject`], returns [`Error::RegistryCorrupt`] for
/// the first line that is not valid UTF-8 of the form
/// `<non-empty name>:<positive id>`.
pub fn parse_ids(
    path: &Path,
    contents: impl AsRef<[u8]>,
    policy: CorruptLinePolicy,
) -> Result<Vec<ProjectIdEntry>> {
    parse_lines(path, contents.as_ref(), policy, parse_id_line)
}

/// Returns `max(existing ids, 0) + 1`.
///
/// # Errors
///
/// Returns [`Error::IdSpaceExhausted`] if the registry already holds
/// `u32::MAX`.
pub fn next_candidate_id(entries: &[ProjectEntry]) -> Result<ProjectId> {
    match entries.iter().map(|e| e.project_id).max() {
        None => Ok(ProjectId::FIRST),
        Some(max) => max.next().ok_or(Error::IdSpaceExhausted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn pid(raw: u32) -> ProjectId {
        ProjectId::new(raw).unwrap()
    }

    fn projects(contents: impl AsRef<[u8]>) -> Result<Vec<ProjectEntry>> {
        parse_projects(Path::new("/etc/projects"), contents, CorruptLinePolicy::Reject)
    }

    #[test]
    fn formats_lines_bit_exact() {
        let project = ProjectEntry {
            project_id: pid(12),
            path: PathBuf::from("/mnt/xfs/acme"),
        };
        let id = ProjectIdEntry {
            customer: "acme".into(),
            project_id: pid(12),
        };
        assert_eq!(format_project_line(&project), "12:/mnt/xfs/acme\n");
        assert_eq!(format_id_line(&id), "acme:12\n");
    }

    #[test]
    fn parses_projects_skipping_blank_and_comment_lines() {
        let entries = projects("# managed by projquota\n1:/mnt/a\n\n  \n3:/mnt/with:colon\n").unwrap();
        assert_eq!(
            entries,
            vec![
                ProjectEntry {
                    project_id: pid(1),
                    path: PathBuf::from("/mnt/a"),
                },
                ProjectEntry {
                    project_id: pid(3),
                    path: PathBuf::from("/mnt/with:colon"),
                },
            ]
        );
    }

    #[test]
    fn parses_ids_splitting_on_last_separator() {
        let entries = parse_ids(
            Path::new("/etc/projid"),
            "acme:1\nlegacy:name:2\n",
            CorruptLinePolicy::Reject,
        )
        .unwrap();
        assert_eq!(entries[0].customer, "acme");
        assert_eq!(entries[1].customer, "legacy:name");
        assert_eq!(entries[1].project_id, pid(2));
    }

    #[test]
    fn rejects_corrupt_lines_with_position() {
        for contents in ["1:/mnt/a\nnot-a-line\n", "1:/mnt/a\nx:/mnt/b\n", "1:/mnt/a\n0:/mnt/b\n", "1:/mnt/a\n2:\n"] {
            let err = projects(contents).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::RegistryCorrupt, "{contents:?}");
            match err {
                Error::RegistryCorrupt { line, .. } => assert_eq!(line, 2),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn skip_policy_ignores_corrupt_lines() {
        let entries = parse_projects(
            Path::new("/etc/projects"),
            "garbage\n4:/mnt/a\n",
            CorruptLinePolicy::Skip,
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].project_id, pid(4));
    }

    #[test]
    fn non_utf8_line_follows_corrupt_line_policy() {
        let contents: &[u8] = b"1:/mnt/a\n\xff:/mnt/b\n3:/mnt/c\n";

        let err = projects(contents).unwrap_err();
        match err {
            Error::RegistryCorrupt { line, content, .. } => {
                assert_eq!(line, 2);
                assert!(content.ends_with(":/mnt/b"), "{content:?}");
            }
            other => panic!("unexpected error: {other}"),
        }

        let ids = parse_ids(
            Path::new("/etc/projid"),
            b"a:1\n\xff\nc:3\n",
            CorruptLinePolicy::Skip,
        )
        .unwrap();
        let customers: Vec<_> = ids.iter().map(|e| e.customer.as_str()).collect();
        assert_eq!(customers, ["a", "c"]);
    }

    #[test]
    fn next_candidate_is_max_plus_one() {
        assert_eq!(next_candidate_id(&[]).unwrap(), pid(1));
        let entries = projects("3:/mnt/c\n10:/mnt/j\n7:/mnt/g\n").unwrap();
        assert_eq!(next_candidate_id(&entries).unwrap(), pid(11));
    }

    #[test]
    fn next_candidate_reports_exhausted_id_space() {
        let entries = projects(&format!("{}:/mnt/last\n", u32::MAX)).unwrap();
        assert_eq!(
            next_candidate_id(&entries).unwrap_err().kind(),
            ErrorKind::IdSpaceExhausted
        );
    }
}
