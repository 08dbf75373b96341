//! Input files: discovery, line streaming and the processed marker.
//!
//! Sources are gzip-compressed text files. A source that has been loaded
//! with an acceptable error rate is renamed to `.{name}`; discovery skips
//! such files so a re-run only picks up what is left.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Split};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use thiserror::Error;
use tracing::{debug, warn};

use memload_queue::QueueError;

/// Prefix that marks a source as already processed.
pub const PROCESSED_PREFIX: char = '.';

/// Errors that end the processing of a single source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot read {} at line {line}: {source}", path.display())]
    Read {
        path: PathBuf,
        line: u64,
        source: io::Error,
    },

    #[error("invalid source pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("cannot mark {} as processed: {source}", path.display())]
    Commit { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Delivery(#[from] QueueError),
}

/// Raw lines of a decompressed source, without the `\n` or `\r\n` terminator.
///
/// Lines are bytes, not text: a line that is not valid UTF-8 is the
/// parser's problem, not a read failure. Only I/O and gzip errors
/// surface as `Err`.
#[derive(Debug)]
pub struct SourceLines {
    inner: Split<BufReader<MultiGzDecoder<File>>>,
}

impl Iterator for SourceLines {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.inner.next()?;
        Some(line.map(|mut bytes| {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            bytes
        }))
    }
}

/// Open a gzip source as a lazy sequence of raw lines.
pub fn open_lines(path: &Path) -> Result<SourceLines, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SourceLines {
        inner: BufReader::new(MultiGzDecoder::new(file)).split(b'\n'),
    })
}

/// List the files matching the glob `pattern`, sorted by path.
///
/// Supports `*`, `?` and `[...]` in any path component. Files already
/// carrying the processed marker are skipped, as are directories.
/// Unreadable directories are logged and skipped; a pattern that matches
/// nothing yields an empty list.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    let entries = glob::glob(pattern).map_err(|source| SourceError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(path = %e.path().display(), error = %e.error(), "cannot inspect path");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let processed = path
            .file_name()
            .map(|name| is_processed(&name.to_string_lossy()))
            .unwrap_or(true);
        if processed {
            continue;
        }
        paths.push(path);
    }
    paths.sort();

    debug!(pattern, count = paths.len(), "discovered sources");
    Ok(paths)
}

/// Rename `path` to carry the processed marker. Returns the new path.
///
/// Idempotent: an already-marked path, or one whose marked twin exists
/// while the unmarked file is gone, is left alone.
pub fn mark_committed(path: &Path) -> Result<PathBuf, SourceError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SourceError::Commit {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        })?;

    if is_processed(name) {
        return Ok(path.to_path_buf());
    }

    let target = path.with_file_name(format!("{PROCESSED_PREFIX}{name}"));
    if !path.exists() && target.exists() {
        return Ok(target);
    }

    fs::rename(path, &target).map_err(|source| SourceError::Commit {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(target)
}

fn is_processed(name: &str) -> bool {
    name.starts_with(PROCESSED_PREFIX)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    fn write_gz(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        for line in lines {
            writeln!(enc, "{line}").unwrap();
        }
        enc.finish().unwrap();
        path
    }

    #[test]
    fn discover_skips_processed_and_non_matching() {
        let tmp = tempfile::tempdir().unwrap();
        write_gz(tmp.path(), "b.tsv.gz", &[]);
        write_gz(tmp.path(), "a.tsv.gz", &[]);
        write_gz(tmp.path(), ".c.tsv.gz", &[]);
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(tmp.path().join("nested.tsv.gz")).unwrap();

        let pattern = format!("{}/*.tsv.gz", tmp.path().display());
        let found = discover(&pattern).unwrap();

        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.tsv.gz", "b.tsv.gz"]);
    }

    #[test]
    fn discover_supports_character_classes() {
        let tmp = tempfile::tempdir().unwrap();
        write_gz(tmp.path(), "log1.tsv.gz", &[]);
        write_gz(tmp.path(), "logx.tsv.gz", &[]);

        let pattern = format!("{}/log[0-9].tsv.gz", tmp.path().display());
        let found = discover(&pattern).unwrap();
        assert_eq!(found, vec![tmp.path().join("log1.tsv.gz")]);
    }

    #[test]
    fn discover_expands_directory_wildcards() {
        let tmp = tempfile::tempdir().unwrap();
        let year = tmp.path().join("2017");
        fs::create_dir(&year).unwrap();
        write_gz(&year, "a.tsv.gz", &[]);
        write_gz(&year, ".done.tsv.gz", &[]);
        fs::create_dir(tmp.path().join("other")).unwrap();
        write_gz(&tmp.path().join("other"), "b.tsv.gz", &[]);

        let pattern = format!("{}/20*/*.tsv.gz", tmp.path().display());
        let found = discover(&pattern).unwrap();
        assert_eq!(found, vec![year.join("a.tsv.gz")]);
    }

    #[test]
    fn discover_rejects_malformed_pattern() {
        let err = discover("/var/log/[*.gz").unwrap_err();
        assert!(matches!(err, SourceError::Pattern { .. }));
    }

    #[test]
    fn discover_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let pattern = format!("{}/nope/*.gz", tmp.path().display());
        assert!(discover(&pattern).unwrap().is_empty());
    }

    #[test]
    fn open_lines_streams_decompressed_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_gz(tmp.path(), "x.tsv.gz", &["first", "second"]);

        let lines: Vec<Vec<u8>> = open_lines(&path).unwrap().map(Result::unwrap).collect();
        assert_eq!(lines, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn open_lines_strips_crlf_and_keeps_raw_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("raw.tsv.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(b"a\r\n\xff\xfe\nlast").unwrap();
        enc.finish().unwrap();

        let lines: Vec<Vec<u8>> = open_lines(&path).unwrap().map(Result::unwrap).collect();
        assert_eq!(lines, vec![b"a".to_vec(), vec![0xff, 0xfe], b"last".to_vec()]);
    }

    #[test]
    fn open_lines_missing_file_is_open_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = open_lines(&tmp.path().join("missing.gz")).unwrap_err();
        assert!(matches!(err, SourceError::Open { .. }));
    }

    #[test]
    fn plain_text_fails_on_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plain.tsv.gz");
        fs::write(&path, "idfa\t1\t1\t1\t1\n").unwrap();

        let first = open_lines(&path).unwrap().next().unwrap();
        assert!(first.is_err());
    }

    #[test]
    fn mark_committed_prefixes_name_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_gz(tmp.path(), "done.tsv.gz", &["x"]);

        let marked = mark_committed(&path).unwrap();
        assert_eq!(marked, tmp.path().join(".done.tsv.gz"));
        assert!(marked.exists());
        assert!(!path.exists());

        // Second call on either name is a no-op.
        assert_eq!(mark_committed(&path).unwrap(), marked);
        assert_eq!(mark_committed(&marked).unwrap(), marked);
        assert!(marked.exists());
    }

    #[test]
    fn mark_committed_missing_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let err = mark_committed(&tmp.path().join("ghost.gz")).unwrap_err();
        assert!(matches!(err, SourceError::Commit { .. }));
    }
}
