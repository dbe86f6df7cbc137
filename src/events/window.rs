use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Точка на экране
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Размер окна
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Размер пригоден только при строго положительных ширине и высоте
    pub fn is_positive(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Прямоугольник окна или дисплея
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn mid_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn is_empty(&self) -> bool {
        !self.size().is_positive()
    }

    /// Пересечение двух прямоугольников; пустой результат даёт None
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        let rect = Rect::new(left, top, right - left, bottom - top);
        (!rect.is_empty()).then_some(rect)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.0}, {:.0}) {:.0}x{:.0}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Горизонтальная координата: число или символическое "center"
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XValue {
    Absolute(f64),
    Centered,
}

const CENTER_LITERAL: &str = "center";

impl<'de> Deserialize<'de> for XValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct XValueVisitor;

        impl<'de> Visitor<'de> for XValueVisitor {
            type Value = XValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or the string \"center\"")
            }

            // Строка проверяется первой: числовая строка ("100") не считается числом
            fn visit_str<E: de::Error>(self, value: &str) -> Result<XValue, E> {
                if value.eq_ignore_ascii_case(CENTER_LITERAL) {
                    Ok(XValue::Centered)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(value), &self))
                }
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<XValue, E> {
                Ok(XValue::Absolute(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<XValue, E> {
                Ok(XValue::Absolute(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<XValue, E> {
                Ok(XValue::Absolute(value as f64))
            }
        }

        deserializer.deserialize_any(XValueVisitor)
    }
}

impl Serialize for XValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            XValue::Absolute(value) => serializer.serialize_f64(*value),
            XValue::Centered => serializer.serialize_str(CENTER_LITERAL),
        }
    }
}

impl fmt::Display for XValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XValue::Absolute(value) => write!(f, "{}", value),
            XValue::Centered => f.write_str(CENTER_LITERAL),
        }
    }
}

/// Директива размещения всех подходящих окон одного приложения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFrameSpec {
    #[serde(rename = "bundle_identifier")]
    pub application_identifier: String,
    pub x: XValue,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl fmt::Display for WindowFrameSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> x={} y={} {}x{}",
            self.application_identifier, self.x, self.y, self.width, self.height
        )
    }
}

/// Снимок: приложение-владелец и прямоугольник одного его окна
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppWindowEntry {
    pub application_identifier: String,
    pub frame: Rect,
}

impl AppWindowEntry {
    pub fn new(application_identifier: impl Into<String>, frame: Rect) -> Self {
        Self {
            application_identifier: application_identifier.into(),
            frame,
        }
    }
}

impl fmt::Display for AppWindowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {}", self.application_identifier, self.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_center_is_case_insensitive() {
        for literal in ["center", "Center", "CENTER"] {
            let x: XValue = serde_json::from_value(json!(literal)).unwrap();
            assert_eq!(x, XValue::Centered);
        }
    }

    #[test]
    fn test_x_value_rejects_other_types() {
        assert!(serde_json::from_value::<XValue>(json!(true)).is_err());
        assert!(serde_json::from_value::<XValue>(json!("100")).is_err());
        assert!(serde_json::from_value::<XValue>(json!("left")).is_err());
        assert!(serde_json::from_value::<XValue>(json!(null)).is_err());
        assert_eq!(
            serde_json::from_value::<XValue>(json!(-12)).unwrap(),
            XValue::Absolute(-12.0)
        );
    }

    #[test]
    fn test_spec_decode_then_encode_keeps_fields() {
        let raw = json!({
            "bundle_identifier": "com.example.editor",
            "x": "Center",
            "y": 25.5,
            "width": 800,
            "height": 600
        });
        let spec: WindowFrameSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.application_identifier, "com.example.editor");
        assert_eq!(spec.x, XValue::Centered);

        let encoded = serde_json::to_value(&spec).unwrap();
        assert_eq!(encoded["bundle_identifier"], "com.example.editor");
        assert_eq!(encoded["x"], "center");
        assert_eq!(encoded["y"], 25.5);
        assert_eq!(encoded["width"], 800.0);
        assert_eq!(encoded["height"], 600.0);

        let again: WindowFrameSpec = serde_json::from_value(encoded).unwrap();
        assert_eq!(again, spec);
    }

    #[test]
    fn test_rect_intersection() {
        let display = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        let workarea = Rect::new(0.0, 27.0, 1920.0, 1053.0);
        assert_eq!(
            display.intersection(&workarea),
            Some(Rect::new(0.0, 27.0, 1920.0, 1053.0))
        );

        let elsewhere = Rect::new(3000.0, 0.0, 100.0, 100.0);
        assert_eq!(display.intersection(&elsewhere), None);
    }

    #[test]
    fn test_rect_mid_x() {
        assert_eq!(Rect::new(0.0, 0.0, 1200.0, 800.0).mid_x(), 600.0);
        assert_eq!(Rect::new(1920.0, 0.0, 1280.0, 800.0).mid_x(), 2560.0);
    }
}
