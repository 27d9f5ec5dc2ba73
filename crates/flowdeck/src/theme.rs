use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const MUTED: Color = Color::Rgb(146, 131, 116);
pub const DIM: Color = Color::Rgb(102, 92, 84);
pub const STAR: Color = Color::Rgb(251, 73, 52);
pub const LINK: Color = Color::Rgb(131, 165, 152);
pub const SLOW: Color = Color::Rgb(254, 128, 25);
pub const WARN: Color = Color::Rgb(250, 189, 47);
pub const ACCENT: Color = Color::Cyan;

const TAG_COLOR_SEED: u64 = 0x7a11;

pub mod icons {
    pub const STARRED: &str = "*";
    pub const UNSTARRED: &str = ".";
    pub const LINKED: &str = "~";
    pub const INCLUDED: &str = "+";
    pub const EXCLUDED: &str = "-";
    pub const OFF: &str = " ";
    pub const OPENED: &str = ">";
}

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

/// Stable color per tag name.
pub fn tag_badge_style(tag: &str) -> Style {
    let palette = [
        Color::Rgb(131, 165, 152),
        Color::Rgb(69, 133, 136),
        Color::Rgb(142, 192, 124),
        Color::Rgb(104, 157, 106),
        Color::Rgb(184, 187, 38),
        Color::Rgb(250, 189, 47),
        Color::Rgb(254, 128, 25),
        Color::Rgb(211, 134, 155),
        Color::Rgb(177, 98, 134),
        Color::Rgb(189, 174, 147),
    ];
    let mut hash: u64 = 1469598103934665603 ^ TAG_COLOR_SEED;
    for b in tag.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    let color = palette[(hash as usize) % palette.len()];
    Style::new().fg(color).add_modifier(Modifier::BOLD)
}

pub fn duration_text(duration_ms: i64) -> (String, Color) {
    if duration_ms > 10_000 {
        (">10s".to_string(), SLOW)
    } else {
        (format!("{duration_ms}ms"), MUTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_colors_are_stable() {
        assert_eq!(tag_badge_style("flag-out"), tag_badge_style("flag-out"));
    }

    #[test]
    fn long_flows_are_capped() {
        assert_eq!(duration_text(10_000).0, "10000ms");
        assert_eq!(duration_text(10_001), (">10s".to_string(), SLOW));
    }
}
