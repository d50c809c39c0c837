//! The categorized computed-style property list
//!
//! Names use the camelCase form exposed by `CSSStyleDeclaration`, which is
//! how the extractor reads them from `getComputedStyle`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Values the extractor discards: they say nothing about the rendering.
pub const UNINFORMATIVE_VALUES: [&str; 4] = ["", "auto", "initial", "inherit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyCategory {
    Typography,
    Color,
    Background,
    BoxModel,
    Border,
    Position,
    Display,
    Flex,
    Grid,
    Motion,
    Effects,
    Interaction,
    Misc,
}

impl fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PropertyCategory::Typography => "typography",
            PropertyCategory::Color => "color",
            PropertyCategory::Background => "background",
            PropertyCategory::BoxModel => "box model",
            PropertyCategory::Border => "border",
            PropertyCategory::Position => "position",
            PropertyCategory::Display => "display",
            PropertyCategory::Flex => "flex",
            PropertyCategory::Grid => "grid",
            PropertyCategory::Motion => "transform/animation",
            PropertyCategory::Effects => "effects",
            PropertyCategory::Interaction => "interaction",
            PropertyCategory::Misc => "misc",
        };
        f.write_str(label)
    }
}

const TYPOGRAPHY: &[&str] = &[
    "fontFamily",
    "fontSize",
    "fontWeight",
    "fontStyle",
    "fontVariant",
    "lineHeight",
    "letterSpacing",
    "wordSpacing",
    "textAlign",
    "textTransform",
    "textDecorationLine",
    "textDecorationColor",
    "textDecorationStyle",
    "textShadow",
    "textIndent",
    "textOverflow",
    "whiteSpace",
    "wordBreak",
    "verticalAlign",
];

const COLOR: &[&str] = &["color", "opacity", "caretColor", "accentColor", "fill", "stroke"];

const BACKGROUND: &[&str] = &[
    "backgroundColor",
    "backgroundImage",
    "backgroundSize",
    "backgroundPosition",
    "backgroundRepeat",
    "backgroundClip",
    "backgroundOrigin",
    "backgroundAttachment",
    "backgroundBlendMode",
];

const BOX_MODEL: &[&str] = &[
    "width",
    "height",
    "minWidth",
    "minHeight",
    "maxWidth",
    "maxHeight",
    "paddingTop",
    "paddingRight",
    "paddingBottom",
    "paddingLeft",
    "marginTop",
    "marginRight",
    "marginBottom",
    "marginLeft",
    "boxSizing",
];

const BORDER: &[&str] = &[
    "borderTopWidth",
    "borderRightWidth",
    "borderBottomWidth",
    "borderLeftWidth",
    "borderTopStyle",
    "borderRightStyle",
    "borderBottomStyle",
    "borderLeftStyle",
    "borderTopColor",
    "borderRightColor",
    "borderBottomColor",
    "borderLeftColor",
    "borderTopLeftRadius",
    "borderTopRightRadius",
    "borderBottomRightRadius",
    "borderBottomLeftRadius",
    "outlineWidth",
    "outlineStyle",
    "outlineColor",
    "outlineOffset",
];

const POSITION: &[&str] = &["position", "top", "right", "bottom", "left", "zIndex", "float", "clear"];

const DISPLAY: &[&str] = &["display", "visibility", "overflowX", "overflowY"];

const FLEX: &[&str] = &[
    "flexDirection",
    "flexWrap",
    "flexGrow",
    "flexShrink",
    "flexBasis",
    "justifyContent",
    "alignItems",
    "alignContent",
    "alignSelf",
    "order",
    "gap",
    "rowGap",
    "columnGap",
];

const GRID: &[&str] = &[
    "gridTemplateColumns",
    "gridTemplateRows",
    "gridAutoFlow",
    "gridAutoColumns",
    "gridAutoRows",
    "gridColumnStart",
    "gridColumnEnd",
    "gridRowStart",
    "gridRowEnd",
    "justifyItems",
    "justifySelf",
];

const MOTION: &[&str] = &[
    "transform",
    "transformOrigin",
    "transitionProperty",
    "transitionDuration",
    "transitionTimingFunction",
    "transitionDelay",
    "animationName",
    "animationDuration",
    "animationTimingFunction",
    "animationIterationCount",
];

const EFFECTS: &[&str] = &["boxShadow", "filter", "backdropFilter", "mixBlendMode", "clipPath"];

const INTERACTION: &[&str] = &["cursor", "pointerEvents", "userSelect", "touchAction", "scrollBehavior"];

const MISC: &[&str] = &[
    "objectFit",
    "objectPosition",
    "aspectRatio",
    "listStyleType",
    "isolation",
    "content",
];

/// Every extracted property, grouped by category
pub const PROPERTY_CATEGORIES: &[(PropertyCategory, &[&str])] = &[
    (PropertyCategory::Typography, TYPOGRAPHY),
    (PropertyCategory::Color, COLOR),
    (PropertyCategory::Background, BACKGROUND),
    (PropertyCategory::BoxModel, BOX_MODEL),
    (PropertyCategory::Border, BORDER),
    (PropertyCategory::Position, POSITION),
    (PropertyCategory::Display, DISPLAY),
    (PropertyCategory::Flex, FLEX),
    (PropertyCategory::Grid, GRID),
    (PropertyCategory::Motion, MOTION),
    (PropertyCategory::Effects, EFFECTS),
    (PropertyCategory::Interaction, INTERACTION),
    (PropertyCategory::Misc, MISC),
];

/// All property names in category order
pub fn all_properties() -> Vec<&'static str> {
    PROPERTY_CATEGORIES
        .iter()
        .flat_map(|(_, names)| names.iter().copied())
        .collect()
}

pub fn category_of(property: &str) -> Option<PropertyCategory> {
    PROPERTY_CATEGORIES
        .iter()
        .find(|(_, names)| names.contains(&property))
        .map(|(category, _)| *category)
}

pub fn is_known_property(property: &str) -> bool {
    category_of(property).is_some()
}

/// Whether a captured value carries information worth comparing
pub fn is_informative(value: &str) -> bool {
    !UNINFORMATIVE_VALUES.contains(&value.trim())
}
