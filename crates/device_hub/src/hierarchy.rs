//! Normalization of vendor UI hierarchies into one JSON tree shape
//!
//! Every node in the normalized tree carries:
//! - `_id`: a fresh UUID, unique per dump
//! - `_type`: the element class (`class` on Android, `type` on iOS)
//! - `rect`: `{x, y, width, height}` in screen pixels, when the vendor reports bounds
//! - `children`: child nodes, omitted for leaves
//!
//! All other vendor attributes are kept as-is, with `"true"`/`"false"`
//! strings turned into booleans.

use crate::error::{DeviceError, Result};
use lazy_static::lazy_static;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

lazy_static! {
    static ref BOUNDS_RE: Regex =
        Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("bounds regex is valid");
}

fn new_id() -> Value {
    Value::String(Uuid::new_v4().to_string())
}

/// Parse uiautomator `bounds="[l,t][r,b]"` into a pixel rect
fn parse_bounds(bounds: &str) -> Option<Value> {
    let caps = BOUNDS_RE.captures(bounds)?;
    let n = |i: usize| caps[i].parse::<i64>().ok();
    let (l, t, r, b) = (n(1)?, n(2)?, n(3)?, n(4)?);
    Some(json!({ "x": l, "y": t, "width": r - l, "height": b - t }))
}

/// Half-built element while its end tag is pending
struct Frame {
    node: Map<String, Value>,
    children: Vec<Value>,
    xpath: String,
    tag_counts: HashMap<String, usize>,
}

impl Frame {
    fn finish(self) -> Value {
        let mut node = self.node;
        if !self.children.is_empty() {
            node.insert("children".to_string(), Value::Array(self.children));
        }
        Value::Object(node)
    }
}

fn element_frame(start: &BytesStart<'_>, parent: Option<&mut Frame>) -> Result<Frame> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let xpath = match parent {
        Some(parent) => {
            let count = parent.tag_counts.entry(tag.clone()).or_insert(0);
            *count += 1;
            format!("{}/{}[{}]", parent.xpath, tag, count)
        }
        None => format!("/{}", tag),
    };

    let mut node = Map::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();

        match key.as_str() {
            "class" => {
                node.insert("_type".to_string(), Value::String(value));
            }
            "bounds" => match parse_bounds(&value) {
                Some(rect) => {
                    node.insert("rect".to_string(), rect);
                }
                None => {
                    node.insert(key, Value::String(value));
                }
            },
            _ if value.eq_ignore_ascii_case("true") => {
                node.insert(key, Value::Bool(true));
            }
            _ if value.eq_ignore_ascii_case("false") => {
                node.insert(key, Value::Bool(false));
            }
            _ => {
                node.insert(key, Value::String(value));
            }
        }
    }

    node.entry("_type".to_string())
        .or_insert_with(|| Value::String(tag));
    node.insert("_id".to_string(), new_id());
    node.insert("xpath".to_string(), Value::String(xpath.clone()));

    Ok(Frame {
        node,
        children: Vec::new(),
        xpath,
        tag_counts: HashMap::new(),
    })
}

/// Convert uiautomator XML into the normalized JSON tree
pub fn android_hierarchy_to_json(page_xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(page_xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let frame = element_frame(&start, stack.last_mut())?;
                stack.push(frame);
            }
            Event::Empty(start) => {
                let frame = element_frame(&start, stack.last_mut())?;
                let node = frame.finish();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| DeviceError::ParseError("unbalanced end tag".to_string()))?;
                let node = frame.finish();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DeviceError::ParseError(
            "hierarchy XML ended inside an element".to_string(),
        ));
    }

    root.ok_or_else(|| DeviceError::ParseError("hierarchy XML has no root element".to_string()))
}

/// Normalize a WebDriverAgent JSON source tree
///
/// WDA reports rects in points; `scale` converts them to screenshot pixels.
pub fn ios_hierarchy_to_json(mut source: Value, scale: f64) -> Value {
    normalize_ios_node(&mut source, scale);
    source
}

fn normalize_ios_node(node: &mut Value, scale: f64) {
    let Some(obj) = node.as_object_mut() else {
        return;
    };

    obj.insert("_id".to_string(), new_id());
    let kind = obj.remove("type").unwrap_or(Value::Null);
    obj.insert("_type".to_string(), kind);

    if let Some(Value::Object(rect)) = obj.get_mut("rect") {
        for value in rect.values_mut() {
            if let Some(v) = value.as_f64() {
                *value = json!(v * scale);
            }
        }
    }

    if let Some(Value::Array(children)) = obj.get_mut("children") {
        for child in children.iter_mut() {
            normalize_ios_node(child, scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" package="com.android.settings" clickable="false" enabled="true" bounds="[0,0][1080,2400]">
    <node index="0" text="Wi-Fi &amp; network" resource-id="android:id/title" class="android.widget.TextView" package="com.android.settings" clickable="true" enabled="true" bounds="[42,300][600,360]" />
    <node index="1" text="Battery" resource-id="android:id/title" class="android.widget.TextView" package="com.android.settings" clickable="true" enabled="false" bounds="[42,400][600,460]" />
  </node>
</hierarchy>"#;

    #[test]
    fn test_android_tree_shape() {
        let tree = android_hierarchy_to_json(PAGE).unwrap();
        assert_eq!(tree["_type"], "hierarchy");
        assert_eq!(tree["xpath"], "/hierarchy");

        let frame = &tree["children"][0];
        assert_eq!(frame["_type"], "android.widget.FrameLayout");
        assert_eq!(frame["clickable"], false);
        assert_eq!(frame["rect"], json!({"x": 0, "y": 0, "width": 1080, "height": 2400}));

        let wifi = &frame["children"][0];
        assert_eq!(wifi["text"], "Wi-Fi & network");
        assert_eq!(wifi["clickable"], true);
        assert_eq!(wifi["rect"]["width"], 558);
        assert_eq!(wifi["xpath"], "/hierarchy/node[1]/node[1]");
        assert!(wifi.get("children").is_none());
        assert!(wifi.get("bounds").is_none());

        let battery = &frame["children"][1];
        assert_eq!(battery["enabled"], false);
        assert_eq!(battery["xpath"], "/hierarchy/node[1]/node[2]");
    }

    #[test]
    fn test_android_ids_are_unique() {
        let tree = android_hierarchy_to_json(PAGE).unwrap();
        let frame = &tree["children"][0];
        let ids = [
            tree["_id"].as_str().unwrap(),
            frame["_id"].as_str().unwrap(),
            frame["children"][0]["_id"].as_str().unwrap(),
            frame["children"][1]["_id"].as_str().unwrap(),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_android_truncated_xml_fails() {
        assert!(android_hierarchy_to_json("<hierarchy><node>").is_err());
    }

    #[test]
    fn test_android_empty_document_fails() {
        assert!(android_hierarchy_to_json("").is_err());
    }

    #[test]
    fn test_ios_rect_scaled_and_type_renamed() {
        let source = json!({
            "type": "XCUIElementTypeApplication",
            "name": "Settings",
            "rect": {"x": 0, "y": 0, "width": 390, "height": 844},
            "children": [
                {"type": "XCUIElementTypeButton", "label": "General",
                 "rect": {"x": 16, "y": 100.5, "width": 358, "height": 44}}
            ]
        });
        let tree = ios_hierarchy_to_json(source, 3.0);

        assert_eq!(tree["_type"], "XCUIElementTypeApplication");
        assert!(tree.get("type").is_none());
        assert_eq!(tree["rect"]["width"].as_f64(), Some(1170.0));

        let button = &tree["children"][0];
        assert_eq!(button["_type"], "XCUIElementTypeButton");
        assert_eq!(button["rect"]["y"].as_f64(), Some(301.5));
        assert!(button["_id"].is_string());
    }

    #[test]
    fn test_ios_missing_type_becomes_null() {
        let tree = ios_hierarchy_to_json(json!({"name": "x"}), 2.0);
        assert_eq!(tree["_type"], Value::Null);
    }
}
