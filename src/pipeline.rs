use crate::{
    config::Settings,
    error::{Error, Result},
    executor::Executor,
    file::{is_likely_binary, is_regular_file, read_text},
    writer::write_atomic,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Paths handed to the pipeline
    pub selected: usize,

    /// Files overwritten in place
    pub updated: usize,

    /// Files whose result was printed
    pub printed: usize,

    /// Files listed in dry-run mode
    pub would_modify: usize,

    /// Missing, non-regular or binary paths
    pub skipped: usize,

    /// Files whose processing failed
    pub failed: usize,
}

impl RunStats {
    /// Files that reached the executor successfully.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.updated + self.printed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Updated,
    Printed,
    WouldModify,
    Skipped,
}

/// Applies the configured action to each selected file, one at a time.
pub struct Pipeline<E> {
    settings: Settings,
    executor: E,
    dry_run: bool,
}

impl<E: Executor> Pipeline<E> {
    /// Creates a new pipeline.
    #[must_use]
    pub fn new(settings: Settings, executor: E) -> Self {
        Self {
            settings,
            executor,
            dry_run: false,
        }
    }

    /// Lists files instead of calling the executor.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Processes `paths` in order, writing one report line per path to `out`.
    ///
    /// Per-file failures are reported and do not stop the run. The source
    /// file is only written after the complete response has arrived.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to `out` fails.
    #[instrument(skip_all, fields(files = paths.len(), dry_run = self.dry_run))]
    pub fn run<W: Write>(&self, paths: &[PathBuf], out: &mut W) -> Result<RunStats> {
        let mut stats = RunStats {
            selected: paths.len(),
            ..RunStats::default()
        };

        for path in paths {
            match self.process(path, out) {
                Ok(Outcome::Updated) => stats.updated += 1,
                Ok(Outcome::Printed) => stats.printed += 1,
                Ok(Outcome::WouldModify) => stats.would_modify += 1,
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    stats.failed += 1;
                    report(out, format_args!("Failed to process {}: {e}", path.display()))?;
                }
            }
        }

        info!(
            "Done: {} updated, {} printed, {} would modify, {} skipped, {} failed",
            stats.updated, stats.printed, stats.would_modify, stats.skipped, stats.failed
        );

        Ok(stats)
    }

    fn process<W: Write>(&self, path: &Path, out: &mut W) -> Result<Outcome> {
        if !is_regular_file(path) {
            report(out, format_args!("File not found: {}", path.display()))?;
            return Ok(Outcome::Skipped);
        }

        if self.dry_run {
            report(out, format_args!("Would modify: {}", path.display()))?;
            return Ok(Outcome::WouldModify);
        }

        if is_likely_binary(path)? {
            report(out, format_args!("Skipping binary file: {}", path.display()))?;
            return Ok(Outcome::Skipped);
        }

        let content = read_text(path)?;
        debug!("Read {} bytes from {}", content.len(), path.display());

        if self.settings.in_place {
            self.rewrite(path, &content, out)
        } else {
            self.print(path, &content, out)
        }
    }

    fn rewrite<W: Write>(&self, path: &Path, content: &str, out: &mut W) -> Result<Outcome> {
        let response = self.executor.complete(content, &self.settings)?;

        let mut output = response.trim().to_string();
        if content.ends_with('\n') && !output.is_empty() {
            output.push('\n');
        }

        write_atomic(path, &output)?;
        report(out, format_args!("Updated file: {}", path.display()))?;
        Ok(Outcome::Updated)
    }

    fn print<W: Write>(&self, path: &Path, content: &str, out: &mut W) -> Result<Outcome> {
        let chunks = self.executor.stream(content, &self.settings)?;
        report(out, format_args!("Output for {}:", path.display()))?;

        let mut result = Ok(Outcome::Printed);
        for chunk in chunks {
            match chunk {
                Ok(piece) => {
                    out.write_all(piece.as_bytes()).map_err(stdout_error)?;
                    out.flush().map_err(stdout_error)?;
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        writeln!(out).map_err(stdout_error)?;
        result
    }
}

fn report<W: Write>(out: &mut W, line: std::fmt::Arguments<'_>) -> Result<()> {
    writeln!(out, "{line}").map_err(stdout_error)
}

fn stdout_error(e: std::io::Error) -> Error {
    Error::io("<stdout>", e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ChunkStream;
    use assert_fs::prelude::*;
    use std::cell::Cell;

    struct FakeExecutor {
        response: Result<String>,
        chunks: Vec<Result<String>>,
        calls: Cell<usize>,
    }

    impl FakeExecutor {
        fn ok(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
                chunks: response
                    .split_inclusive(' ')
                    .map(|s| Ok(s.to_string()))
                    .collect(),
                calls: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(Error::executor("connection refused")),
                chunks: vec![Err(Error::executor("connection refused"))],
                calls: Cell::new(0),
            }
        }
    }

    impl Executor for FakeExecutor {
        fn complete(&self, _content: &str, _settings: &Settings) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.response.clone()
        }

        fn stream(&self, _content: &str, _settings: &Settings) -> Result<ChunkStream<'_>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Box::new(self.chunks.iter().cloned()))
        }
    }

    fn settings(in_place: bool) -> Settings {
        Settings {
            api_key: "sk-test".to_string(),
            model: "test-model".to_string(),
            api_base_url: "http://localhost".to_string(),
            action: "Refactor".to_string(),
            in_place,
        }
    }

    fn run(pipeline: &Pipeline<&FakeExecutor>, paths: &[PathBuf]) -> (RunStats, String) {
        let mut out = Vec::new();
        let stats = pipeline.run(paths, &mut out).unwrap();
        (stats, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_dry_run_never_calls_executor() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("a").unwrap();
        temp.child("b.py").write_str("b").unwrap();
        let paths = vec![temp.path().join("a.py"), temp.path().join("b.py")];

        let executor = FakeExecutor::ok("unused");
        let pipeline = Pipeline::new(settings(true), &executor).dry_run(true);
        let (stats, out) = run(&pipeline, &paths);

        assert_eq!(executor.calls.get(), 0);
        assert_eq!(stats.would_modify, 2);
        assert_eq!(out.lines().filter(|l| l.starts_with("Would modify: ")).count(), 2);
        temp.child("a.py").assert("a");
    }

    #[test]
    fn test_dry_run_reports_missing_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("a").unwrap();
        let paths = vec![temp.path().join("missing.py"), temp.path().join("a.py")];

        let executor = FakeExecutor::ok("unused");
        let pipeline = Pipeline::new(settings(false), &executor).dry_run(true);
        let (stats, out) = run(&pipeline, &paths);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("File not found: "));
        assert!(lines[1].starts_with("Would modify: "));
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.would_modify, 1);
    }

    #[test]
    fn test_missing_path_does_not_halt_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("x = 1\n").unwrap();
        temp.child("dir").create_dir_all().unwrap();
        let paths = vec![
            temp.path().join("missing.py"),
            temp.path().join("dir"),
            temp.path().join("a.py"),
        ];

        let executor = FakeExecutor::ok("x = 2");
        let pipeline = Pipeline::new(settings(true), &executor);
        let (stats, out) = run(&pipeline, &paths);

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(executor.calls.get(), 1);
        assert!(out.contains("File not found: "));
        assert!(out.contains("Updated file: "));
    }

    #[test]
    fn test_in_place_rewrites_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("main.py");
        file.write_str("print( 'hi' )\n").unwrap();

        let executor = FakeExecutor::ok("\n  print('hi')  \n\n");
        let pipeline = Pipeline::new(settings(true), &executor);
        let (stats, out) = run(&pipeline, &[file.path().to_path_buf()]);

        file.assert("print('hi')\n");
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.processed(), 1);
        assert_eq!(executor.calls.get(), 1);
        assert_eq!(out, format!("Updated file: {}\n", file.path().display()));
    }

    #[test]
    fn test_in_place_without_trailing_newline() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("note.txt");
        file.write_str("draft").unwrap();

        let executor = FakeExecutor::ok("final ");
        let pipeline = Pipeline::new(settings(true), &executor);
        run(&pipeline, &[file.path().to_path_buf()]);

        file.assert("final");
    }

    #[test]
    fn test_failed_call_leaves_file_untouched() {
        let temp = assert_fs::TempDir::new().unwrap();
        let first = temp.child("first.py");
        let second = temp.child("second.py");
        first.write_str("original").unwrap();
        second.write_str("also original").unwrap();

        let executor = FakeExecutor::failing();
        let pipeline = Pipeline::new(settings(true), &executor);
        let (stats, out) = run(
            &pipeline,
            &[first.path().to_path_buf(), second.path().to_path_buf()],
        );

        first.assert("original");
        second.assert("also original");
        assert_eq!(stats.failed, 2);
        assert_eq!(executor.calls.get(), 2);
        assert_eq!(out.lines().filter(|l| l.starts_with("Failed to process ")).count(), 2);
        assert!(out.contains("connection refused"));
    }

    #[test]
    fn test_console_mode_streams_once() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("lib.rs");
        file.write_str("fn a() {}").unwrap();

        let executor = FakeExecutor::ok("fn a() -> () {}");
        let pipeline = Pipeline::new(settings(false), &executor);
        let (stats, out) = run(&pipeline, &[file.path().to_path_buf()]);

        assert_eq!(executor.calls.get(), 1);
        assert_eq!(stats.printed, 1);
        assert_eq!(
            out,
            format!("Output for {}:\nfn a() -> () {{}}\n", file.path().display())
        );
        file.assert("fn a() {}");
    }

    #[test]
    fn test_console_mode_stream_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("lib.rs");
        file.write_str("fn a() {}").unwrap();

        let executor = FakeExecutor::failing();
        let pipeline = Pipeline::new(settings(false), &executor);
        let (stats, out) = run(&pipeline, &[file.path().to_path_buf()]);

        assert_eq!(stats.failed, 1);
        assert!(out.starts_with("Output for "));
        assert!(out.contains("Failed to process "));
    }

    #[test]
    fn test_binary_file_is_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("blob.dat");
        file.write_binary(&[0u8, 1, 2, 3]).unwrap();

        let executor = FakeExecutor::ok("nope");
        let pipeline = Pipeline::new(settings(true), &executor);
        let (stats, out) = run(&pipeline, &[file.path().to_path_buf()]);

        assert_eq!(executor.calls.get(), 0);
        assert_eq!(stats.skipped, 1);
        assert!(out.starts_with("Skipping binary file: "));
        assert_eq!(std::fs::read(file.path()).unwrap(), vec![0u8, 1, 2, 3]);
    }
}
