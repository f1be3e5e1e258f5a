use gravwm_config::GravitySpec;
use tracing::warn;

use crate::core::geometry::Rect;

/// Placement rule in percent of a screen's extent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gravity {
    pub name: String,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Gravity {
    pub fn new(name: &str, x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { name: name.to_string(), x: x.min(100), y: y.min(100), width: width.clamp(1, 100), height: height.clamp(1, 100) }
    }
}

impl From<&GravitySpec> for Gravity {
    fn from(spec: &GravitySpec) -> Self {
        Gravity::new(&spec.name, spec.x, spec.y, spec.width, spec.height)
    }
}

/// Built-in gravity table. Slots 1-9 follow the numeric keypad layout,
/// slot 0 is a centered two-thirds box.
pub fn default_table() -> Vec<Gravity> {
    vec![
        Gravity::new("center66", 50, 50, 66, 66),
        Gravity::new("bottom_left", 0, 100, 50, 50),
        Gravity::new("bottom", 0, 100, 100, 50),
        Gravity::new("bottom_right", 100, 100, 50, 50),
        Gravity::new("left", 0, 0, 50, 100),
        Gravity::new("center", 50, 50, 100, 100),
        Gravity::new("right", 100, 0, 50, 100),
        Gravity::new("top_left", 0, 0, 50, 50),
        Gravity::new("top", 0, 0, 100, 50),
        Gravity::new("top_right", 100, 0, 50, 50),
    ]
}

/// Built-in table with the configured gravities applied on top; entries
/// with a slot replace that slot, the rest are appended.
pub fn build_table(specs: &[GravitySpec]) -> Vec<Gravity> {
    let mut table = default_table();
    for spec in specs {
        match spec.slot {
            Some(slot) if slot < table.len() => table[slot] = Gravity::from(spec),
            Some(slot) => {
                warn!("Gravity {} names slot {} beyond the table, appending", spec.name, slot);
                table.push(Gravity::from(spec));
            }
            None => table.push(Gravity::from(spec)),
        }
    }
    table
}

/// Map a gravity onto a screen rect.
///
/// The cell is computed in percent of `screen`, shrunk by `gap` on all
/// sides, and the returned content rect leaves room for `border` on both
/// sides so that the window including its border covers the cell exactly.
pub fn place(screen: &Rect, gravity: &Gravity, border: u16, gap: u16) -> Rect {
    let width = screen.width * gravity.width as i32 / 100;
    let height = screen.height * gravity.height as i32 / 100;
    let x = screen.x + (screen.width - width) * gravity.x as i32 / 100;
    let y = screen.y + (screen.height - height) * gravity.y as i32 / 100;

    let cell = Rect::new(x, y, width.max(1), height.max(1)).inset(gap as i32);
    let border = border as i32;

    Rect {
        x: cell.x,
        y: cell.y,
        width: (cell.width - 2 * border).max(1),
        height: (cell.height - 2 * border).max(1),
    }
}
