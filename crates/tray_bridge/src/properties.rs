//! Decoding of the `org.kde.StatusNotifierItem` properties, as returned by `GetAll`.

use crate::*;

use std::collections::HashMap;
use zbus::zvariant::{OwnedValue, Value};

/// The `ToolTip` property.
///
/// The StatusNotifierItem protocol says this is a `(sa(iiay)ss)` structure, but some items just send a string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tooltip {
    Structured { title: String, subtitle: String },
    Simple(String),
    #[default]
    Absent,
}

impl Tooltip {
    fn decode(value: &Value<'_>) -> Self {
        match value {
            Value::Str(s) => Tooltip::Simple(s.to_string()),
            Value::Structure(st) => match st.fields() {
                [_, _, Value::Str(title), Value::Str(subtitle)] => {
                    Tooltip::Structured { title: title.to_string(), subtitle: subtitle.to_string() }
                },
                _ => Tooltip::Absent,
            },
            _ => Tooltip::Absent,
        }
    }

    /// Title and subtitle, with empty strings treated as missing.
    pub fn parts(&self) -> (Option<String>, Option<String>) {
        match self {
            Tooltip::Structured { title, subtitle } => (non_empty(title), non_empty(subtitle)),
            Tooltip::Simple(title) => (non_empty(title), None),
            Tooltip::Absent => (None, None),
        }
    }
}

pub(crate) fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

/// The result of one property fetch.
///
/// A field is `None` when the item did not report that property at all, in which case the
/// cached value is left alone. String properties are kept verbatim (an empty string clears the
/// cached value), and pixmap properties are `Some(None)` when the item reported no usable image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedProperties {
    pub id: Option<String>,
    pub status: Option<String>,
    pub title: Option<String>,
    pub tooltip: Option<Tooltip>,
    pub item_is_menu: Option<bool>,
    pub menu: Option<String>,
    pub icon_theme_path: Option<String>,
    pub icon_name: Option<String>,
    pub icon_pixmap: Option<Option<Pixmap>>,
    pub icon_desc: Option<String>,
    pub attention_icon_name: Option<String>,
    pub attention_icon_pixmap: Option<Option<Pixmap>>,
    pub attention_desc: Option<String>,
    pub overlay_icon_name: Option<String>,
    pub overlay_icon_pixmap: Option<Option<Pixmap>>,
}

impl FetchedProperties {
    pub fn from_map(map: &HashMap<String, OwnedValue>) -> Self {
        Self::from_values(map.iter().map(|(name, value)| (name.as_str(), &**value)))
    }

    pub fn from_values<'a, 'v: 'a>(values: impl IntoIterator<Item = (&'a str, &'a Value<'v>)>) -> Self {
        let mut props = Self::default();
        for (name, value) in values {
            let value = unwrap_variant(value);
            match name {
                "Id" => props.id = string(value),
                "Status" => props.status = string(value),
                "Title" => props.title = string(value),
                "ToolTip" => props.tooltip = Some(Tooltip::decode(value)),
                "ItemIsMenu" => props.item_is_menu = boolean(value),
                "Menu" => props.menu = string(value),
                "IconThemePath" => props.icon_theme_path = string(value),
                "IconName" => props.icon_name = string(value),
                "IconPixmap" => props.icon_pixmap = Some(pixmap(value)),
                "IconAccessibleDesc" => props.icon_desc = string(value),
                "AttentionIconName" => props.attention_icon_name = string(value),
                "AttentionIconPixmap" => props.attention_icon_pixmap = Some(pixmap(value)),
                "AttentionAccessibleDesc" => props.attention_desc = string(value),
                "OverlayIconName" => props.overlay_icon_name = string(value),
                "OverlayIconPixmap" => props.overlay_icon_pixmap = Some(pixmap(value)),
                _ => {}
            }
        }
        props
    }
}

fn unwrap_variant<'a, 'v>(value: &'a Value<'v>) -> &'a Value<'v> {
    match value {
        Value::Value(inner) => unwrap_variant(inner),
        _ => value,
    }
}

fn string(value: &Value<'_>) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.to_string()),
        Value::ObjectPath(p) => Some(p.to_string()),
        _ => None,
    }
}

fn boolean(value: &Value<'_>) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

/// Decode an `a(iiay)` value and pick the largest image from it.
fn pixmap(value: &Value<'_>) -> Option<Pixmap> {
    let Value::Array(images) = value else {
        return None;
    };

    let images = images
        .iter()
        .filter_map(|image| match image {
            Value::Structure(st) => match st.fields() {
                [Value::I32(w), Value::I32(h), Value::Array(data)] => {
                    let bytes = data
                        .iter()
                        .map(|b| match b {
                            Value::U8(b) => Some(*b),
                            _ => None,
                        })
                        .collect::<Option<Vec<u8>>>()?;
                    Some((*w, *h, bytes))
                },
                _ => None,
            },
            _ => None,
        })
        .collect();

    Pixmap::largest(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use zbus::zvariant::{ObjectPath, StructureBuilder};

    #[test]
    fn test_decode_strings_and_flags() {
        let values = vec![
            ("Id", Value::from("nm-applet")),
            ("Status", Value::from("Active")),
            ("ItemIsMenu", Value::from(false)),
            ("Menu", Value::from(ObjectPath::try_from("/MenuBar").unwrap())),
            ("SomethingElse", Value::from(42u32)),
        ];
        let props = FetchedProperties::from_values(values.iter().map(|(k, v)| (*k, v)));
        assert_eq!(props.id.as_deref(), Some("nm-applet"));
        assert_eq!(props.status.as_deref(), Some("Active"));
        assert_eq!(props.item_is_menu, Some(false));
        assert_eq!(props.menu.as_deref(), Some("/MenuBar"));
        assert_eq!(props.title, None);
    }

    #[test]
    fn test_decode_structured_tooltip() {
        let tooltip = StructureBuilder::new()
            .add_field("icon")
            .add_field(0i32)
            .add_field("Network")
            .add_field("Connected")
            .build();
        let value = Value::from(tooltip);
        let props = FetchedProperties::from_values([("ToolTip", &value)]);
        assert_eq!(
            props.tooltip,
            Some(Tooltip::Structured { title: "Network".to_owned(), subtitle: "Connected".to_owned() })
        );
    }

    #[test]
    fn test_decode_simple_and_unknown_tooltip() {
        let simple = Value::from("just text");
        let props = FetchedProperties::from_values([("ToolTip", &simple)]);
        assert_eq!(props.tooltip, Some(Tooltip::Simple("just text".to_owned())));

        let garbage = Value::from(7i32);
        let props = FetchedProperties::from_values([("ToolTip", &garbage)]);
        assert_eq!(props.tooltip, Some(Tooltip::Absent));
    }

    #[test]
    fn test_tooltip_parts_drop_empty_strings() {
        let tooltip = Tooltip::Structured { title: "Title".to_owned(), subtitle: String::new() };
        assert_eq!(tooltip.parts(), (Some("Title".to_owned()), None));
    }

    #[test]
    fn test_decode_pixmap_without_images() {
        let value = Value::from(Vec::<i32>::new());
        let props = FetchedProperties::from_values([("OverlayIconPixmap", &value)]);
        assert_eq!(props.overlay_icon_pixmap, Some(None));

        let value = Value::from("not an image");
        let props = FetchedProperties::from_values([("IconPixmap", &value)]);
        assert_eq!(props.icon_pixmap, Some(None));
        assert_eq!(props.overlay_icon_pixmap, None);
    }
}
