//! Transcript echo for the terminal
//!
//! system = red, user = green, assistant = blue, tool = magenta.

use std::io::Write;

use colored::{Color, Colorize};

use crate::agent::conversation::{Role, Turn};

pub fn role_color(role: Role) -> Color {
    match role {
        Role::System => Color::Red,
        Role::User => Color::Green,
        Role::Assistant => Color::Blue,
        Role::Tool => Color::Magenta,
    }
}

/// Plain-text rendering of a turn
pub fn format_turn(turn: &Turn) -> String {
    let mut out = match (&turn.role, &turn.tool_name) {
        (Role::Tool, Some(name)) => format!("tool ({}): {}", name, turn.text()),
        (role, _) => format!("{}: {}", role, turn.text()),
    };
    for call in &turn.tool_calls {
        out.push_str(&format!("\n  -> {}({})", call.tool_name, call.arguments));
    }
    out
}

pub fn print_turn(turn: &Turn) {
    let text = format_turn(turn);
    println!("{}\n", text.as_str().color(role_color(turn.role)));
}

pub fn print_input_prompt() {
    print!("{} ", ">".green().bold());
    let _ = std::io::stdout().flush();
}
