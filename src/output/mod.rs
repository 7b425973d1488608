use crate::pipeline::ApplyReport;
use crate::rename::DirectoryPlan;
use std::io::{self, Write};

/// Display a directory plan as a preview
pub fn display_dry_run(plan: &DirectoryPlan, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "========================================")?;
    writeln!(writer, "              DRY RUN")?;
    writeln!(writer, "========================================")?;
    writeln!(writer)?;
    writeln!(writer, "Directory:  {}", plan.directory.display())?;
    writeln!(writer, "Renames:    {}", plan.pending_count())?;
    writeln!(writer)?;

    if plan.pending_count() == 0 {
        writeln!(writer, "No files to rename.")?;
    } else {
        writeln!(writer, "Planned changes:")?;
        writeln!(writer)?;

        for (i, entry) in plan.pending().enumerate() {
            writeln!(writer, "  {}. From: {}", i + 1, entry.source_name())?;
            writeln!(writer, "     To:   {}", relative_target(plan, &entry.target))?;
            writeln!(writer)?;
        }
    }

    display_problems(plan, writer)?;

    writeln!(writer, "----------------------------------------")?;
    writeln!(writer, "Summary:")?;
    writeln!(writer, "  {} files would be renamed", plan.pending_count())?;
    if plan.noop_count() > 0 {
        writeln!(writer, "  {} files already named correctly", plan.noop_count())?;
    }
    if !plan.skipped.is_empty() {
        writeln!(writer, "  {} files would be skipped", plan.skipped.len())?;
    }
    if !plan.collisions.is_empty() {
        writeln!(writer, "  {} name collisions resolved", plan.collisions.len())?;
    }

    writeln!(writer)?;
    writeln!(writer, "Run without --dry to apply these changes.")?;

    Ok(())
}

/// Skipped files with their reasons, then collisions
pub fn display_problems(plan: &DirectoryPlan, writer: &mut impl Write) -> io::Result<()> {
    if !plan.skipped.is_empty() {
        writeln!(writer, "Skipped:")?;
        for skipped in &plan.skipped {
            let name = skipped
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            writeln!(writer, "  [{}] {}: {}", skipped.reason.kind(), name, skipped.reason)?;
        }
        writeln!(writer)?;
    }

    if !plan.collisions.is_empty() {
        writeln!(writer, "Collisions:")?;
        for collision in &plan.collisions {
            writeln!(writer, "  {}", relative_target(plan, &collision.target))?;
            for (source, resolved) in collision.sources.iter().zip(&collision.resolved) {
                let source_name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                writeln!(
                    writer,
                    "    {} -> {}",
                    source_name,
                    relative_target(plan, resolved)
                )?;
            }
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Display what applying a plan did
pub fn display_execution_result(
    plan: &DirectoryPlan,
    report: &ApplyReport,
    writer: &mut impl Write,
) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(
        writer,
        "Renamed {} files in {}.",
        report.applied.len(),
        plan.directory.display()
    )?;

    if let Some((entry, error)) = &report.failure {
        writeln!(writer, "  Stopped at {}: {}", entry.source_name(), error)?;
    }
    if report.interrupted {
        writeln!(writer, "  Interrupted before all files were renamed.")?;
    }
    if !plan.skipped.is_empty() {
        writeln!(writer, "  {} files were skipped.", plan.skipped.len())?;
    }
    if report.marked {
        writeln!(writer, "  Directory recorded as processed.")?;
    }

    Ok(())
}

/// Target path below the plan directory, or in full when elsewhere
fn relative_target(plan: &DirectoryPlan, target: &std::path::Path) -> String {
    target
        .strip_prefix(&plan.directory)
        .unwrap_or(target)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::ApplyError;
    use crate::parser::FileKind;
    use crate::rename::{Collision, RenamePlanEntry, SkipReason, SkippedFile};
    use std::path::PathBuf;

    fn create_test_plan() -> DirectoryPlan {
        let mut plan = DirectoryPlan::new(PathBuf::from("/anime/Show"));

        plan.entries.push(RenamePlanEntry::new(
            PathBuf::from("/anime/Show/[Group] Show - 13.mkv"),
            PathBuf::from("/anime/Show/Show - S02E01.mkv"),
            FileKind::Video,
        ));
        plan.entries.push(RenamePlanEntry::new(
            PathBuf::from("/anime/Show/Show - S01E01.mkv"),
            PathBuf::from("/anime/Show/Show - S01E01.mkv"),
            FileKind::Video,
        ));
        plan.entries.push(RenamePlanEntry::new(
            PathBuf::from("/anime/Show/Show 01.mkv"),
            PathBuf::from("/anime/Show/Show - S01E01_v2.mkv"),
            FileKind::Video,
        ));
        plan.collisions.push(Collision {
            target: PathBuf::from("/anime/Show/Show - S01E01.mkv"),
            sources: vec![
                PathBuf::from("/anime/Show/Show - S01E01.mkv"),
                PathBuf::from("/anime/Show/Show 01.mkv"),
            ],
            resolved: vec![
                PathBuf::from("/anime/Show/Show - S01E01.mkv"),
                PathBuf::from("/anime/Show/Show - S01E01_v2.mkv"),
            ],
        });
        plan.skipped.push(SkippedFile {
            path: PathBuf::from("/anime/Show/Show - 99.mkv"),
            reason: SkipReason::EpisodeOutOfRange {
                episode: 99,
                total: 25,
            },
        });

        plan
    }

    #[test]
    fn test_display_dry_run() {
        let plan = create_test_plan();
        let mut output = Vec::new();

        display_dry_run(&plan, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();

        assert!(output_str.contains("DRY RUN"));
        assert!(output_str.contains("From: [Group] Show - 13.mkv"));
        assert!(output_str.contains("To:   Show - S02E01.mkv"));
        assert!(output_str.contains("2 files would be renamed"));
        assert!(output_str.contains("1 files already named correctly"));
        assert!(output_str.contains("[episode out of range] Show - 99.mkv"));
        assert!(output_str.contains("Show 01.mkv -> Show - S01E01_v2.mkv"));
    }

    #[test]
    fn test_display_dry_run_empty() {
        let plan = DirectoryPlan::new(PathBuf::from("/anime/Show"));
        let mut output = Vec::new();

        display_dry_run(&plan, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();

        assert!(output_str.contains("DRY RUN"));
        assert!(output_str.contains("No files to rename"));
        assert!(!output_str.contains("Skipped:"));
    }

    #[test]
    fn test_display_execution_result() {
        let plan = create_test_plan();
        let report = ApplyReport {
            applied: vec![plan.entries[0].clone()],
            failure: Some((
                plan.entries[2].clone(),
                ApplyError::DestinationExists(plan.entries[2].target.clone()),
            )),
            interrupted: false,
            marked: false,
        };
        let mut output = Vec::new();

        display_execution_result(&plan, &report, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();

        assert!(output_str.contains("Renamed 1 files in /anime/Show"));
        assert!(output_str.contains("Stopped at Show 01.mkv"));
        assert!(output_str.contains("1 files were skipped"));
        assert!(!output_str.contains("recorded as processed"));
    }
}
