//! Progress output for user-facing status updates.
//!
//! In verbose mode output is suppressed since tracing covers the same
//! ground. Otherwise short colored lines on stderr show which directory is
//! being worked on and which files move.

use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

/// Progress reporter for user-facing output
pub struct Progress {
    writer: Box<dyn Write>,
    /// When true, all output is suppressed (verbose mode uses tracing instead)
    silent: bool,
    colors_enabled: bool,
}

/// Whether stderr output should be colored
pub fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }
    io::stderr().is_terminal()
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Progress {
    /// Progress reporter on stderr; `verbose` silences it
    pub fn new(verbose: bool) -> Self {
        Self {
            writer: Box::new(io::stderr()),
            silent: verbose,
            colors_enabled: should_use_colors(),
        }
    }

    /// Create a progress reporter with a custom writer (for testing)
    #[cfg(test)]
    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            silent: false,
            colors_enabled: false,
        }
    }

    pub fn scan_start(&mut self, target: &Path, recursive: bool) {
        if self.silent {
            return;
        }
        let mode = if recursive { " (recursive)" } else { "" };
        let line = format!("Scanning {}{}...", target.display(), mode);
        if self.colors_enabled {
            let _ = writeln!(self.writer, "{}", line.dimmed());
        } else {
            let _ = writeln!(self.writer, "{}", line);
        }
    }

    pub fn scan_complete(&mut self, directories: usize) {
        if self.silent {
            return;
        }
        let _ = writeln!(
            self.writer,
            "Found {} director{} with media files",
            directories,
            if directories == 1 { "y" } else { "ies" }
        );
    }

    /// Report the directory about to be planned
    pub fn directory_start(&mut self, current: usize, total: usize, dir: &Path) {
        if self.silent {
            return;
        }
        let _ = writeln!(self.writer);
        let counter = format!("[{}/{}]", current, total);
        if self.colors_enabled {
            let _ = writeln!(
                self.writer,
                "{} {}",
                counter.cyan(),
                dir.display().to_string().bold()
            );
        } else {
            let _ = writeln!(self.writer, "{} {}", counter, dir.display());
        }
    }

    pub fn already_processed(&mut self) {
        if self.silent {
            return;
        }
        if self.colors_enabled {
            let _ = writeln!(self.writer, "  {}", "already processed, skipping".dimmed());
        } else {
            let _ = writeln!(self.writer, "  already processed, skipping");
        }
    }

    /// Report a single applied rename
    pub fn rename_progress(&mut self, current: usize, total: usize, from: &str, to: &str) {
        if self.silent {
            return;
        }
        if self.colors_enabled {
            let counter = format!("[{}/{}]", current, total);
            let _ = writeln!(
                self.writer,
                "  {} {} {} {}",
                counter.cyan(),
                from.dimmed(),
                "→".cyan(),
                to
            );
        } else {
            let _ = writeln!(self.writer, "  [{}/{}] {} -> {}", current, total, from, to);
        }
    }

    /// Report a non-fatal problem
    pub fn warn(&mut self, message: &str) {
        if self.silent {
            return;
        }
        if self.colors_enabled {
            let _ = writeln!(self.writer, "{} {}", "!".yellow().bold(), message.yellow());
        } else {
            let _ = writeln!(self.writer, "Warning: {}", message);
        }
    }

    /// Final line of a run
    pub fn run_complete(&mut self, renamed: usize, skipped: usize, dry_run: bool) {
        if self.silent {
            return;
        }
        let _ = writeln!(self.writer);
        if dry_run {
            let line = format!(
                "Dry run complete. {} files would be renamed, {} skipped.",
                renamed, skipped
            );
            if self.colors_enabled {
                let _ = writeln!(self.writer, "{}", line.dimmed());
            } else {
                let _ = writeln!(self.writer, "{}", line);
            }
        } else if self.colors_enabled {
            let _ = writeln!(
                self.writer,
                "{} {}",
                "✓".green().bold(),
                format!("{} files renamed, {} skipped", renamed, skipped).green()
            );
        } else {
            let _ = writeln!(
                self.writer,
                "Rename complete. {} files renamed, {} skipped.",
                renamed, skipped
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_progress() -> (Progress, std::sync::Arc<std::sync::Mutex<Vec<u8>>>) {
        let buffer = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let writer = TestWriter(buffer.clone());
        let progress = Progress::with_writer(Box::new(writer));
        (progress, buffer)
    }

    struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rename_progress() {
        let (mut progress, buffer) = create_test_progress();

        progress.rename_progress(1, 2, "[Group] Show - 13.mkv", "Show - S02E01.mkv");
        progress.rename_progress(2, 2, "[Group] Show - 14.mkv", "Show - S02E02.mkv");

        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(output.contains("[1/2] [Group] Show - 13.mkv -> Show - S02E01.mkv"));
        assert!(output.contains("[2/2]"));
    }

    #[test]
    fn test_scan_output() {
        let (mut progress, buffer) = create_test_progress();

        progress.scan_start(Path::new("/anime"), true);
        progress.scan_complete(1);

        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Scanning /anime (recursive)"));
        assert!(output.contains("Found 1 directory with media files"));
    }

    #[test]
    fn test_dry_run_summary() {
        let (mut progress, buffer) = create_test_progress();

        progress.run_complete(3, 1, true);

        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(output.contains("3 files would be renamed, 1 skipped"));
    }
}
