//! Color palette and the paint rules bound into each rendering context.
//!
//! Every palette color becomes one paint rule (background + foreground). A
//! reserved `active` color sits outside the palette and is painted above all
//! match colors to mark the navigation cursor.

use serde::{Deserialize, Serialize};

/// Identifier of the reserved navigation color
pub const ACTIVE_COLOR_ID: &str = "active";

/// Prefix shared by every paint rule name the engine binds
pub const PAINT_RULE_PREFIX: &str = "lumen-";

/// Stacking priority for ordinary match colors
const MATCH_PAINT_PRIORITY: i32 = 0;

/// Stacking priority for the active match, above every match color
const ACTIVE_PAINT_PRIORITY: i32 = 1;

/// One palette entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub id: String,
    pub background: String,
    pub foreground: String,
}

impl PaletteColor {
    pub fn new(id: &str, background: &str, foreground: &str) -> Self {
        Self {
            id: id.to_string(),
            background: background.to_string(),
            foreground: foreground.to_string(),
        }
    }
}

/// Ordered palette plus the reserved active color
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub colors: Vec<PaletteColor>,
    pub active: PaletteColor,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: vec![
                PaletteColor::new("yellow", "#fff176", "#000000"),
                PaletteColor::new("green", "#a5d6a7", "#000000"),
                PaletteColor::new("blue", "#90caf9", "#000000"),
                PaletteColor::new("pink", "#f48fb1", "#000000"),
                PaletteColor::new("orange", "#ffcc80", "#000000"),
                PaletteColor::new("purple", "#ce93d8", "#000000"),
                PaletteColor::new("red", "#ef9a9a", "#000000"),
                PaletteColor::new("teal", "#80cbc4", "#000000"),
            ],
            active: PaletteColor::new(ACTIVE_COLOR_ID, "#ff6d00", "#ffffff"),
        }
    }
}

/// A paint rule ready to be bound into a rendering context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintRule {
    /// Name the overlay bucket is registered under (e.g. `lumen-yellow`)
    pub name: String,
    pub color_id: String,
    pub background: String,
    pub foreground: String,
    /// Higher paints on top
    pub priority: i32,
}

impl Palette {
    /// Look up a color by id
    pub fn get(&self, color_id: &str) -> Option<&PaletteColor> {
        self.colors.iter().find(|c| c.id == color_id)
    }

    /// Whether `color_id` is a known palette color (the active color is not)
    pub fn contains(&self, color_id: &str) -> bool {
        self.get(color_id).is_some()
    }

    /// All paint rules to bind into a context: one per palette color, then the
    /// active rule.
    pub fn paint_rules(&self) -> Vec<PaintRule> {
        let mut rules: Vec<PaintRule> = self
            .colors
            .iter()
            .map(|c| paint_rule(c, MATCH_PAINT_PRIORITY))
            .collect();
        rules.push(self.active_rule());
        rules
    }

    /// The reserved rule for the navigation cursor
    pub fn active_rule(&self) -> PaintRule {
        paint_rule(&self.active, ACTIVE_PAINT_PRIORITY)
    }
}

/// Paint rule name for a color id
pub fn rule_name(color_id: &str) -> String {
    format!("{}{}", PAINT_RULE_PREFIX, color_id)
}

fn paint_rule(color: &PaletteColor, priority: i32) -> PaintRule {
    PaintRule {
        name: rule_name(&color.id),
        color_id: color.id.clone(),
        background: color.background.clone(),
        foreground: color.foreground.clone(),
        priority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_rules_cover_palette_plus_active() {
        let palette = Palette::default();
        let rules = palette.paint_rules();

        assert_eq!(rules.len(), palette.colors.len() + 1);
        assert_eq!(rules[0].name, "lumen-yellow");

        let active = rules.last().unwrap();
        assert_eq!(active.color_id, ACTIVE_COLOR_ID);
        assert!(rules[..rules.len() - 1]
            .iter()
            .all(|r| r.priority < active.priority));
    }

    #[test]
    fn test_active_color_is_not_a_palette_color() {
        let palette = Palette::default();
        assert!(palette.contains("green"));
        assert!(!palette.contains(ACTIVE_COLOR_ID));
    }
}
