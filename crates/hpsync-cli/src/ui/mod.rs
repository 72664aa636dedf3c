//! Terminal output: the console reporter and report rendering.

pub mod output;
pub mod report;
pub mod theme;

pub use output::ConsoleReporter;
pub use report::{print_report, render_report};
pub use theme::Theme;
