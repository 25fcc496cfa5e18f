//! Line-oriented operator console
//!
//! Each input line is parsed as a subcommand; output goes back as text so the
//! same code serves stdin and tests.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use resworld_core::region::RegionRow;
use resworld_core::{RegionCoordinator, RegionTarget};
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::local_engine::LocalEngine;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create (or regenerate) a region, e.g. `generate nether:a 2000`
    Generate {
        target: RegionTarget,
        border_size: Option<u32>,
    },
    /// Move an occupant into a ready region
    Teleport { target: RegionTarget, occupant: String },
    /// Stop pregeneration, keeping its progress for later
    Pause { target: RegionTarget },
    /// Pause and send every occupant back
    Close { target: RegionTarget },
    /// Delete every generation of a region
    Delete { target: RegionTarget },
    /// Place an occupant directly into a loaded region
    Join { occupant: String, target: RegionTarget },
    /// Show all active regions
    Status,
    /// Reload the configuration file
    Reload,
    /// Stop all jobs and exit
    #[command(alias = "exit")]
    Quit,
}

/// What the input loop should do after a line
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

pub struct Console {
    coordinator: Arc<RegionCoordinator>,
    engine: Arc<LocalEngine>,
    config_stem: String,
}

impl Console {
    pub fn new(
        coordinator: Arc<RegionCoordinator>,
        engine: Arc<LocalEngine>,
        config_stem: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            engine,
            config_stem: config_stem.into(),
        }
    }

    /// Read commands until `quit` or end of input
    pub fn run(&self, input: impl BufRead, mut output: impl Write) -> Result<()> {
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match self.execute(&line) {
                Flow::Continue(text) => {
                    if !text.is_empty() {
                        writeln!(output, "{}", text)?;
                    }
                }
                Flow::Quit => break,
            }
        }
        Ok(())
    }

    /// Execute one command line
    pub fn execute(&self, line: &str) -> Flow {
        let parsed = match ConsoleLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => parsed,
            Err(e) => return Flow::Continue(e.to_string().trim_end().to_string()),
        };

        let text = match parsed.command {
            Command::Generate {
                target,
                border_size,
            } => match self.coordinator.create(&target, border_size) {
                Ok(id) => format!("Created {}", id),
                Err(e) => format!("Error: {}", e),
            },
            Command::Teleport { target, occupant } => {
                match self.coordinator.teleport(&occupant, &target) {
                    Ok(()) => format!("Teleported {} to {}", occupant, target),
                    Err(e) => format!("Error: {}", e),
                }
            }
            Command::Pause { target } => match self.coordinator.pause(&target) {
                Ok(true) => format!("Paused {}", target),
                Ok(false) => format!("{} has no running pregeneration", target),
                Err(e) => format!("Error: {}", e),
            },
            Command::Close { target } => match self.coordinator.close(&target) {
                Ok(_) => format!("Closed {}", target),
                Err(e) => format!("Error: {}", e),
            },
            Command::Delete { target } => match self.coordinator.delete(&target) {
                Ok(outcome) if outcome.is_clean() => {
                    format!("Deleted {} folder(s) of {}", outcome.deleted.len(), target)
                }
                Ok(outcome) => format!(
                    "Deleted {} folder(s) of {}, manual removal required for: {}",
                    outcome.deleted.len(),
                    target,
                    outcome.remaining.join(", ")
                ),
                Err(e) => format!("Error: {}", e),
            },
            Command::Join { occupant, target } => self.join(&occupant, &target),
            Command::Status => render_status(&self.coordinator.statuses()),
            Command::Reload => match crate::config::load(&self.config_stem) {
                Ok(config) => {
                    self.coordinator.reload(config);
                    "Configuration reloaded".to_string()
                }
                Err(e) => format!("Error: {:#}", e),
            },
            Command::Quit => return Flow::Quit,
        };
        Flow::Continue(text)
    }

    fn join(&self, occupant: &str, target: &RegionTarget) -> String {
        let Some(active) = self.coordinator.active_region(target) else {
            return format!("Error: no active region for {}", target);
        };
        match self.engine.place(occupant, &active.name()) {
            Ok(()) => format!("{} joined {}", occupant, active.name()),
            Err(e) => format!("Error: {}", e),
        }
    }
}

/// Text rendering of the status view
pub fn render_status(rows: &[RegionRow]) -> String {
    if rows.is_empty() {
        return "No active regions".to_string();
    }

    rows.iter()
        .map(|row| {
            let state = if row.running {
                let eta = match row.eta_minutes {
                    Some(minutes) if row.percent > 0 => format!(", ~{} min left", minutes),
                    _ => String::new(),
                };
                format!("generating {}%{}", row.percent, eta)
            } else if row.pending {
                "paused".to_string()
            } else if row.ready {
                "complete".to_string()
            } else {
                "closed".to_string()
            };
            format!(
                "{:<8} {:<32} border {:>6}  {}{}{}",
                row.kind.as_str(),
                row.region,
                row.border_size,
                state,
                if row.ready { "  [open]" } else { "" },
                timestamp_suffix(row.priority_completed_at, row.all_completed_at),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn timestamp_suffix(priority: Option<DateTime<Utc>>, all: Option<DateTime<Utc>>) -> String {
    let stamp = |t: DateTime<Utc>| t.format("%Y-%m-%d %H:%M").to_string();
    match (priority, all) {
        (_, Some(all)) => format!("  done {}", stamp(all)),
        (Some(priority), None) => format!("  spawn ready {}", stamp(priority)),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use resworld_core::RegionKind;

    fn row(running: bool, percent: u8, ready: bool) -> RegionRow {
        RegionRow {
            slot: "resource_normal.a".into(),
            region: "resource_normal.a.20260101".into(),
            kind: RegionKind::Normal,
            border_size: 5000,
            running,
            pending: false,
            percent,
            ready,
            priority_completed_at: None,
            all_completed_at: None,
            eta_minutes: running.then_some(7),
        }
    }

    #[test]
    fn test_parse_generate_with_border() {
        let line = ConsoleLine::try_parse_from("generate nether:a 2000".split_whitespace()).unwrap();
        match line.command {
            Command::Generate {
                target,
                border_size,
            } => {
                assert_eq!(target, RegionTarget::new(RegionKind::Nether, "a"));
                assert_eq!(border_size, Some(2000));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_target() {
        assert!(ConsoleLine::try_parse_from("pause moon:a".split_whitespace()).is_err());
        assert!(ConsoleLine::try_parse_from("pause normal".split_whitespace()).is_err());
        assert!(ConsoleLine::try_parse_from("frobnicate".split_whitespace()).is_err());
    }

    #[test]
    fn test_parse_quit_alias() {
        let line = ConsoleLine::try_parse_from(["exit"]).unwrap();
        assert!(matches!(line.command, Command::Quit));
    }

    #[test]
    fn test_render_empty_status() {
        assert_eq!(render_status(&[]), "No active regions");
    }

    #[test]
    fn test_render_running_row() {
        let text = render_status(&[row(true, 42, false)]);
        assert!(text.contains("resource_normal.a.20260101"));
        assert!(text.contains("generating 42%, ~7 min left"));
        assert!(!text.contains("[open]"));
    }

    #[test]
    fn test_render_completed_row() {
        let mut done = row(false, 0, true);
        done.all_completed_at = Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 0).unwrap());
        let text = render_status(&[done]);
        assert!(text.contains("complete"));
        assert!(text.contains("[open]"));
        assert!(text.contains("done 2026-01-02 03:04"));
    }

    #[test]
    fn test_render_paused_and_closed_rows() {
        let mut paused = row(false, 0, true);
        paused.pending = true;
        assert!(render_status(&[paused]).contains("paused"));
        assert!(render_status(&[row(false, 0, false)]).contains("closed"));
    }
}
