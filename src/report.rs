// SPDX-FileCopyrightText: 2022 Dmitry Gerasimov <di.gerasimov@gmail.com>
// SPDX-License-Identifier: MIT

//! Terminal output formatting.
//!
//! The installer core produces plans and tagged diff lines; this collaborator
//! turns them into text on stdout. Colorization is decided once at
//! construction instead of through process-wide state, so a piped run stays
//! free of escape codes.

use crate::{
    diff::{DiffLine, DiffTag},
    installer::Plan,
};

use colored::Colorize;
use std::io::{stdout, IsTerminal};

/// Plan and diff printer.
#[derive(Clone, Copy, Debug)]
pub struct Reporter {
    color: bool,
}

impl Reporter {
    /// Construct new reporter with explicit color choice.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Construct new reporter, colorizing only when stdout is a terminal.
    pub fn auto() -> Self {
        Self::new(stdout().is_terminal())
    }

    /// Print the three plan buckets as a summary list.
    pub fn summary(&self, plan: &Plan) {
        if plan.is_empty() {
            println!("Nothing to install, update, or remove.");
            return;
        }

        if !plan.new.is_empty() {
            let pretty: String = plan
                .new
                .iter()
                .map(|item| format!("\n\t{}", self.paint_green(item.name())))
                .collect();
            println!("New files:{pretty}\n");
        }

        if !plan.changed.is_empty() {
            let pretty: String = plan
                .changed
                .iter()
                .map(|item| format!("\n\t{}", self.paint_red(item.name())))
                .collect();
            println!("Modified files:{pretty}\n");
        }

        if !plan.removed.is_empty() {
            let pretty: String = plan
                .removed
                .iter()
                .map(|name| format!("\n\t{}", self.paint_red(name)))
                .collect();
            println!("Removed files:{pretty}\n");
        }
    }

    /// Print rendered diff lines.
    pub fn diff(&self, lines: &[DiffLine]) {
        for line in lines {
            println!("{}", self.paint_diff(line));
        }
    }

    /// Report a single applied change.
    pub fn applied(&self, name: &str) {
        println!("Changes applied for {name}");
    }

    fn paint_diff(&self, line: &DiffLine) -> String {
        if !self.color {
            return line.text.clone();
        }

        match line.tag {
            DiffTag::Header => line.text.dimmed().to_string(),
            DiffTag::HunkHeader => line.text.cyan().to_string(),
            DiffTag::Added => line.text.green().to_string(),
            DiffTag::Removed => line.text.red().to_string(),
            DiffTag::Context => line.text.clone(),
        }
    }

    fn paint_green(&self, text: &str) -> String {
        if self.color {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_red(&self, text: &str) -> String {
        if self.color {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }
}
