//! Placeholder substitution and macro hook execution

use super::engine::Announcer;
use crate::config::MacroHook;

pub const REGION_NAME: &str = "%region_name%";
pub const BORDER_SIZE: &str = "%border_size%";

/// Values substituted into templates and macro commands
#[derive(Debug, Clone, Copy, Default)]
pub struct Placeholders<'a> {
    pub region_name: &'a str,
    pub border_size: Option<u32>,
}

impl<'a> Placeholders<'a> {
    pub fn region(region_name: &'a str) -> Self {
        Self {
            region_name,
            border_size: None,
        }
    }

    pub fn with_border(mut self, border_size: u32) -> Self {
        self.border_size = Some(border_size);
        self
    }
}

/// Substitute every known placeholder in `template`
///
/// `%border_size%` is left untouched when no border is known.
pub fn render(template: &str, values: Placeholders<'_>) -> String {
    let rendered = template.replace(REGION_NAME, values.region_name);
    match values.border_size {
        Some(border) => rendered.replace(BORDER_SIZE, &border.to_string()),
        None => rendered,
    }
}

/// Run a macro hook's commands in order
///
/// A rejected command is logged and the rest still run. Returns how many
/// commands were accepted.
pub fn run_macro(
    announcer: &dyn Announcer,
    hook_name: &str,
    hook: &MacroHook,
    values: Placeholders<'_>,
) -> usize {
    let commands = hook.active_commands();
    if commands.is_empty() {
        return 0;
    }

    log::info!(
        "[MACRO] Running {} ({} command(s)) for {}",
        hook_name,
        commands.len(),
        values.region_name
    );

    let mut accepted = 0;
    for command in commands {
        let command = render(command, values);
        if announcer.run_command(&command) {
            accepted += 1;
        } else {
            log::warn!("[MACRO] {} command failed: {}", hook_name, command);
        }
    }
    accepted
}
