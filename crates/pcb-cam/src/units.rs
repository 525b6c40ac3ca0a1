//! Dimensioned values used by supplements such as `bloat=0.2mm`.

/// Length units accepted as a suffix on dimension values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Nanometer,
    Micron,
    Millimeter,
    Centimeter,
    Mils,
    Inch,
}

impl Unit {
    pub fn from_suffix(suffix: &str) -> Option<Unit> {
        match suffix {
            "nm" => Some(Unit::Nanometer),
            "um" => Some(Unit::Micron),
            "" | "mm" => Some(Unit::Millimeter),
            "cm" => Some(Unit::Centimeter),
            "mil" => Some(Unit::Mils),
            "in" | "inch" => Some(Unit::Inch),
            _ => None,
        }
    }
}

/// Convert a value from the given units to millimeters (canonical internal unit)
pub fn to_mm(value: f64, from_units: Unit) -> f64 {
    match from_units {
        Unit::Nanometer => value * 0.000_001,
        Unit::Micron => value * 0.001,
        Unit::Millimeter => value,
        Unit::Centimeter => value * 10.0,
        Unit::Mils => value * 0.0254,
        Unit::Inch => value * 25.4,
    }
}

/// Parse a signed decimal with an optional unit suffix into millimeters.
///
/// A bare number is taken as millimeters. Whitespace between the number and
/// the unit is allowed.
pub fn parse_mm(text: &str) -> Option<f64> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (num, suffix) = text.split_at(split);
    let value: f64 = num.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let unit = Unit::from_suffix(suffix.trim())?;
    Some(to_mm(value, unit))
}

/// Render a millimeter value the way it is written in an address.
pub fn format_mm(value: f64) -> String {
    format!("{value}mm")
}
