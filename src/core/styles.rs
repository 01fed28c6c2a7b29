//! Style roles for console output
//!
//! Each logical role (header, health levels, keys) maps to an optional
//! `colored::Color`. Colouring is applied only when the caller passes
//! `enabled = true`, so there is no global colour state.
//!
//! ```
//! use livequeue::core::styles::StyleRole;
//! assert_eq!(StyleRole::Header.paint("Queues", false), "Queues");
//! assert!(StyleRole::Critical.paint("critical", true).starts_with("\x1b["));
//! ```

use crate::queue::api::HealthStatus;
use clap::builder::styling::AnsiColor;
use colored::Color;

// Defines the enum variants and their associated colour
macro_rules! style {
    ( $( $variant:ident => $color:expr ),+ $(,)? ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum StyleRole { $( $variant ),+ }

        impl StyleRole {
            pub fn color(self) -> Option<Color> {
                match self { $( StyleRole::$variant => $color ),+ }
            }

            pub fn ansi_code(self) -> Option<String> {
                map_color_code(self.color()?)
            }

            pub fn paint(self, text: &str, enabled: bool) -> String {
                if !enabled { return text.to_string(); }
                if let Some(code) = self.ansi_code() { return format!("\x1b[{}m{}\x1b[0m", code, text); }
                text.to_string()
            }

            /// prettytable cell style spec (`Fg`, `Fr`, ...)
            pub fn to_prettytable_spec(self) -> Option<String> {
                let spec_char = match self.color()? {
                    Color::Black => "k",
                    Color::Red => "r",
                    Color::Green => "g",
                    Color::Yellow => "y",
                    Color::Blue => "b",
                    Color::Magenta => "m",
                    Color::Cyan => "c",
                    Color::White => "w",
                    Color::BrightBlack => "K",
                    Color::BrightRed => "R",
                    Color::BrightGreen => "G",
                    Color::BrightYellow => "Y",
                    Color::BrightBlue => "B",
                    Color::BrightMagenta => "M",
                    Color::BrightCyan => "C",
                    Color::BrightWhite => "W",
                    _ => return None,
                };
                Some(format!("F{}", spec_char))
            }
        }
    }
}

style! {
    Header   => Some(Color::Yellow),
    Key      => Some(Color::BrightGreen),
    Value    => None,
    Healthy  => Some(Color::Green),
    Degraded => Some(Color::Yellow),
    Critical => Some(Color::BrightRed),
    Dim      => Some(Color::BrightBlack),
}

impl StyleRole {
    pub fn for_health(health: HealthStatus) -> Self {
        match health {
            HealthStatus::Healthy => StyleRole::Healthy,
            HealthStatus::Degraded => StyleRole::Degraded,
            HealthStatus::Critical => StyleRole::Critical,
        }
    }
}

fn map_color_code(c: Color) -> Option<String> {
    use Color::*;
    match c {
        Black => Some("30".to_string()),
        Red => Some("31".to_string()),
        Green => Some("32".to_string()),
        Yellow => Some("33".to_string()),
        Blue => Some("34".to_string()),
        Magenta => Some("35".to_string()),
        Cyan => Some("36".to_string()),
        White => Some("37".to_string()),
        BrightBlack => Some("90".to_string()),
        BrightRed => Some("91".to_string()),
        BrightGreen => Some("92".to_string()),
        BrightYellow => Some("93".to_string()),
        BrightBlue => Some("94".to_string()),
        BrightMagenta => Some("95".to_string()),
        BrightCyan => Some("96".to_string()),
        BrightWhite => Some("97".to_string()),
        TrueColor { r, g, b } => Some(format!("38;2;{};{};{}", r, g, b)),
    }
}

fn color_to_ansi(c: Color) -> Option<AnsiColor> {
    use AnsiColor as A;
    use Color::*;
    Some(match c {
        Red => A::Red,
        Green => A::Green,
        Yellow => A::Yellow,
        BrightBlack => A::BrightBlack,
        BrightRed => A::BrightRed,
        BrightGreen => A::BrightGreen,
        _ => return None,
    })
}

/// clap help styles built from the same roles
pub fn palette_to_clap(enabled: bool) -> clap::builder::Styles {
    use clap::builder::styling::{Color as ClapColor, Style};
    if !enabled {
        return clap::builder::Styles::plain();
    }

    let style = |role: StyleRole, bold: bool| {
        let mut s = Style::new();
        if let Some(col) = role.color().and_then(color_to_ansi) {
            s = s.fg_color(Some(ClapColor::Ansi(col)));
        }
        if bold {
            s = s.bold();
        }
        s
    };

    clap::builder::Styles::styled()
        .header(style(StyleRole::Header, true))
        .usage(style(StyleRole::Header, true))
        .literal(style(StyleRole::Key, false))
        .placeholder(style(StyleRole::Healthy, false))
        .valid(style(StyleRole::Healthy, false))
        .invalid(style(StyleRole::Critical, false))
        .error(style(StyleRole::Critical, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_roles() {
        assert_eq!(StyleRole::for_health(HealthStatus::Degraded), StyleRole::Degraded);
        assert_eq!(
            StyleRole::for_health(HealthStatus::Critical).to_prettytable_spec(),
            Some("FR".to_string())
        );
        assert_eq!(StyleRole::Value.to_prettytable_spec(), None);
    }

    #[test]
    fn test_paint_enabled_disabled() {
        let colored = StyleRole::Header.paint("Hello", true);
        assert!(colored.starts_with("\x1b[33m") && colored.ends_with("\x1b[0m"));
        assert_eq!(StyleRole::Header.paint("Hello", false), "Hello");
        assert_eq!(StyleRole::Value.paint("Hello", true), "Hello");
    }

    #[test]
    fn test_truecolor_code() {
        let code = map_color_code(Color::TrueColor { r: 255, g: 128, b: 64 });
        assert_eq!(code, Some("38;2;255;128;64".to_string()));
    }

    #[test]
    fn test_clap_palette_differs_when_enabled() {
        assert_ne!(
            format!("{:?}", palette_to_clap(false)),
            format!("{:?}", palette_to_clap(true))
        );
    }
}
