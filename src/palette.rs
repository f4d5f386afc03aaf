//! Design-token colors shared by the live overlay and route snapshots.

pub const SURFACE: &str = "#ffffff";
pub const SURFACE_MUTED: &str = "#f3f4f6";
pub const TEXT: &str = "#1f2937";
pub const TEXT_MUTED: &str = "#6b7280";
pub const TEXT_SUBTLE: &str = "#9ca3af";
pub const BORDER: &str = "#d1d5db";
pub const BORDER_LIGHT: &str = "#e5e7eb";

pub const ACCENT: &str = "#f59e0b";
pub const ACCENT_DARK: &str = "#b45309";
pub const ACCENT_LIGHT: &str = "#fcd34d";
pub const ACCENT_SOFT: &str = "#fef3c7";

pub const INFO_DARK: &str = "#1d4ed8";
pub const INFO_LIGHT: &str = "#93c5fd";
pub const INFO_SOFT: &str = "#dbeafe";

pub const SUCCESS: &str = "#16a34a";
pub const SUCCESS_DARK: &str = "#15803d";
pub const SUCCESS_LIGHT: &str = "#86efac";
pub const SUCCESS_SOFT: &str = "#dcfce7";

pub const WARNING_DARK: &str = "#c2410c";
pub const WARNING_LIGHT: &str = "#fdba74";
pub const WARNING_SOFT: &str = "#ffedd5";

pub const DANGER: &str = "#dc2626";
pub const DANGER_DARK: &str = "#b91c1c";
pub const DANGER_LIGHT: &str = "#fca5a5";
pub const DANGER_SOFT: &str = "#fee2e2";

pub const SHADOW_LIGHT: &str = "0 4px 14px rgba(0,0,0,0.12)";
pub const FONT_FAMILY: &str = "Inter, system-ui, sans-serif";

/// Parses `#rgb` or `#rrggbb` into RGBA bytes. Anything else is `None`.
pub fn hex_to_rgba(hex: &str) -> Option<[u8; 4]> {
    let digits = hex.strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        6 => Some([
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
            255,
        ]),
        3 => {
            let expand = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
            Some([expand(0)?, expand(1)?, expand(2)?, 255])
        }
        _ => None,
    }
}
