//! Announcer that writes notifications to the terminal and the log

use resworld_core::Announcer;

/// Prints broadcasts and console lines; macro commands are only logged
#[derive(Debug, Default)]
pub struct TerminalAnnouncer;

impl Announcer for TerminalAnnouncer {
    fn broadcast(&self, message: &str) {
        println!("[broadcast] {}", message);
        log::info!("[REGION] broadcast: {}", message);
    }

    fn console(&self, message: &str) {
        println!("{}", message);
    }

    fn tell(&self, occupant: &str, message: &str) {
        println!("[to {}] {}", occupant, message);
    }

    fn run_command(&self, command: &str) -> bool {
        if command.trim().is_empty() {
            return false;
        }
        log::info!("[MACRO] > {}", command);
        true
    }
}
