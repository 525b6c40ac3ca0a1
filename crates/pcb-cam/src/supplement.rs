//! Per-address supplements: `purpose=..`, `bloat=..` and rendering flags.

use std::fmt;

use serde::Serialize;

use crate::tokenize::Supplement;
use crate::units;

/// Rendering adjustments applied to one addressed group or virtual layer for
/// the duration of a CAM export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TransformOverride {
    /// Outline growth in millimeters; negative values shrink.
    pub bloat: f64,
    pub faded: bool,
    pub partial: bool,
    pub wireframe: bool,
    pub thin_draw: bool,
    pub thin_draw_poly: bool,
    pub check_planes: bool,
    pub flag_color: bool,
    pub hide_floaters: bool,
}

impl TransformOverride {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn flag_mut(&mut self, key: &str) -> Option<&mut bool> {
        Some(match key {
            "faded" => &mut self.faded,
            "partial" => &mut self.partial,
            "wireframe" => &mut self.wireframe,
            "thin_draw" => &mut self.thin_draw,
            "thin_draw_poly" => &mut self.thin_draw_poly,
            "check_planes" => &mut self.check_planes,
            "flag_color" => &mut self.flag_color,
            "hide_floaters" => &mut self.hide_floaters,
            _ => return None,
        })
    }

    /// Non-default settings rendered as supplement text, e.g. `bloat=0.2mm`.
    pub fn describe(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.bloat != 0.0 {
            out.push(format!("bloat={}", units::format_mm(self.bloat)));
        }
        let flags = [
            ("faded", self.faded),
            ("partial", self.partial),
            ("wireframe", self.wireframe),
            ("thin_draw", self.thin_draw),
            ("thin_draw_poly", self.thin_draw_poly),
            ("check_planes", self.check_planes),
            ("flag_color", self.flag_color),
            ("hide_floaters", self.hide_floaters),
        ];
        out.extend(
            flags
                .into_iter()
                .filter(|(_, on)| *on)
                .map(|(name, _)| name.to_string()),
        );
        out
    }
}

/// Recoverable problems found while reading an instruction. Each one is
/// logged when it is raised and kept on the session for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CamWarning {
    UnknownSupplement { key: String },
    InvalidSupplementValue { key: String, value: String },
    UnknownParam { param: String },
}

impl fmt::Display for CamWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CamWarning::UnknownSupplement { key } => {
                write!(f, "unknown layer supplement '{key}', ignored")
            }
            CamWarning::InvalidSupplementValue { key, value } => {
                write!(f, "invalid value '{value}' for layer supplement '{key}', ignored")
            }
            CamWarning::UnknownParam { param } => {
                write!(f, "unknown CAM parameter '{param}', ignored")
            }
        }
    }
}

pub(crate) fn warn(warnings: &mut Vec<CamWarning>, warning: CamWarning) {
    log::warn!("CAM: {warning}");
    warnings.push(warning);
}

/// Result of applying one clause's supplements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied<'s> {
    pub purpose: Option<&'s str>,
    /// The override differs from the default after applying.
    pub active: bool,
}

/// Apply `supplements` to `xform` and pick up the `purpose` key. Unknown keys
/// and unusable values are reported through `warnings` and skipped.
pub fn apply_supplements<'s>(
    supplements: &'s [Supplement<'_>],
    xform: &mut TransformOverride,
    warnings: &mut Vec<CamWarning>,
) -> Applied<'s> {
    let mut purpose = None;

    for sup in supplements {
        let key = sup.key.replace('-', "_");
        let value = sup.value.as_deref();
        match key.as_str() {
            "purpose" => match value {
                Some(v) if !v.is_empty() => purpose = Some(v),
                _ => warn(
                    warnings,
                    CamWarning::InvalidSupplementValue {
                        key: key.clone(),
                        value: value.unwrap_or_default().to_string(),
                    },
                ),
            },
            "bloat" => match value.and_then(units::parse_mm) {
                Some(mm) => xform.bloat = mm,
                None => warn(
                    warnings,
                    CamWarning::InvalidSupplementValue {
                        key: key.clone(),
                        value: value.unwrap_or_default().to_string(),
                    },
                ),
            },
            other => match xform.flag_mut(other) {
                Some(flag) => *flag = true,
                None => warn(
                    warnings,
                    CamWarning::UnknownSupplement {
                        key: sup.key.to_string(),
                    },
                ),
            },
        }
    }

    Applied {
        purpose,
        active: !xform.is_default(),
    }
}

/// Session-wide flags from a `[..]` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionParams {
    pub okempty_group: bool,
    pub okempty_content: bool,
}

impl SessionParams {
    pub fn apply(&mut self, param: &str, warnings: &mut Vec<CamWarning>) {
        match param.replace('_', "-").as_str() {
            "okempty" => {
                self.okempty_group = true;
                self.okempty_content = true;
            }
            "okempty-group" => self.okempty_group = true,
            "okempty-content" => self.okempty_content = true,
            _ => warn(
                warnings,
                CamWarning::UnknownParam {
                    param: param.to_string(),
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::tokenize;

    fn apply(src: &str) -> (Option<String>, TransformOverride, bool, Vec<CamWarning>) {
        let clauses = tokenize(src).unwrap();
        let mut xform = TransformOverride::default();
        let mut warnings = Vec::new();
        let applied = apply_supplements(&clauses[0].supplements, &mut xform, &mut warnings);
        (
            applied.purpose.map(str::to_string),
            xform,
            applied.active,
            warnings,
        )
    }

    #[test]
    fn test_bloat_and_flag() {
        let (purpose, xform, active, warnings) = apply("top-copper(bloat=0.2mm,wireframe)");
        assert_eq!(purpose, None);
        assert!((xform.bloat - 0.2).abs() < 1e-9);
        assert!(xform.wireframe);
        assert!(active);
        assert!(warnings.is_empty());
        assert_eq!(
            xform,
            TransformOverride {
                bloat: xform.bloat,
                wireframe: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_dashed_keys_are_normalized() {
        let (_, xform, _, warnings) = apply("top-copper(thin-draw, hide-floaters, check_planes)");
        assert!(xform.thin_draw && xform.hide_floaters && xform.check_planes);
        assert!(!xform.thin_draw_poly);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unknown_key_warns() {
        let (purpose, xform, active, warnings) = apply("top-copper(frobnicate)");
        assert_eq!(purpose, None);
        assert!(xform.is_default());
        assert!(!active);
        assert_eq!(
            warnings,
            vec![CamWarning::UnknownSupplement {
                key: "frobnicate".into()
            }]
        );
    }

    #[test]
    fn test_invalid_bloat_keeps_default() {
        let (_, xform, active, warnings) = apply("top-copper(bloat=wide, faded)");
        assert_eq!(xform.bloat, 0.0);
        assert!(xform.faded);
        assert!(active);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].to_string(),
            "invalid value 'wide' for layer supplement 'bloat', ignored"
        );
    }

    #[test]
    fn test_purpose_only_is_not_active() {
        let (purpose, _, active, _) = apply("mech(purpose=udrill)");
        assert_eq!(purpose.as_deref(), Some("udrill"));
        assert!(!active);
    }

    #[test]
    fn test_describe() {
        let xform = TransformOverride {
            bloat: -0.1,
            faded: true,
            thin_draw_poly: true,
            ..Default::default()
        };
        assert_eq!(xform.describe(), vec!["bloat=-0.1mm", "faded", "thin_draw_poly"]);
    }

    #[test]
    fn test_session_params() {
        let mut params = SessionParams::default();
        let mut warnings = Vec::new();
        params.apply("okempty-content", &mut warnings);
        assert!(params.okempty_content && !params.okempty_group);
        params.apply("okempty", &mut warnings);
        assert!(params.okempty_group);
        params.apply("bogus", &mut warnings);
        assert_eq!(warnings.len(), 1);
    }
}
