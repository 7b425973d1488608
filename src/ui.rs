//! Numbered prompt for ambiguous title matches.

use crate::matcher::{Choice, PendingChoice};
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Asks the user which candidate a title refers to
pub struct ChoicePrompt<R, W> {
    input: R,
    output: W,
    colors_enabled: bool,
}

impl ChoicePrompt<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stderr, reading answers from stdin
    pub fn stdio(colors_enabled: bool) -> Self {
        Self::new(io::stdin().lock(), io::stderr(), colors_enabled)
    }
}

impl<R: BufRead, W: Write> ChoicePrompt<R, W> {
    pub fn new(input: R, output: W, colors_enabled: bool) -> Self {
        Self {
            input,
            output,
            colors_enabled,
        }
    }

    /// Show the candidates and read a choice; `0` or end of input skips
    pub fn ask(&mut self, pending: &PendingChoice) -> io::Result<Choice> {
        writeln!(self.output)?;
        let heading = format!(
            "Several AniList series match '{}'. Please choose the correct one:",
            pending.token
        );
        if self.colors_enabled {
            writeln!(self.output, "{}", heading.bold())?;
        } else {
            writeln!(self.output, "{}", heading)?;
        }

        for (i, candidate) in pending.candidates.iter().enumerate() {
            let series = &candidate.series;
            let english = series.titles.english.as_deref().unwrap_or("N/A");
            let episodes = series
                .episode_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string());
            let details = format!(
                "(Format: {}, {} episodes, score {:.1})",
                series.format.as_deref().unwrap_or("N/A"),
                episodes,
                candidate.score
            );
            let number = format!("{}:", i + 1);
            if self.colors_enabled {
                writeln!(
                    self.output,
                    "  {} {} / {} {}",
                    number.cyan(),
                    series.primary_title(),
                    english,
                    details.dimmed()
                )?;
            } else {
                writeln!(
                    self.output,
                    "  {} {} / {} {}",
                    number,
                    series.primary_title(),
                    english,
                    details
                )?;
            }
        }
        writeln!(self.output, "  0: Skip these files")?;

        let count = pending.candidates.len();
        loop {
            write!(self.output, "Enter your choice (0-{}): ", count)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(Choice::Skip);
            }

            match line.trim().parse::<usize>() {
                Ok(0) => return Ok(Choice::Skip),
                Ok(n) if n <= count => return Ok(Choice::Pick(n - 1)),
                Ok(_) => writeln!(self.output, "Invalid choice. Please try again.")?,
                Err(_) => writeln!(self.output, "Invalid input. Please enter a number.")?,
            }
        }
    }
}
