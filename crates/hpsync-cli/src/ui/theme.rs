//! UI Theme - colors and icons shared by every view.

use crossterm::style::Color;

#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: ColorScheme,
    pub icons: Icons,
    /// Width of the architecture column.
    pub arch_width: usize,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ColorScheme::default(),
            icons: Icons::default(),
            arch_width: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub active: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Cyan,
            secondary: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            active: Color::Blue,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Icons {
    pub pending: &'static str,
    pub active: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            pending: "○",
            active: "●",
            success: "✓",
            error: "✗",
            warning: "⚠",
        }
    }
}

/// Format bytes for human-readable display
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}
