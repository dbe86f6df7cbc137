use crate::error::Result;
use crate::server_error;
use crate::events::window::WindowFrameSpec;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

pub const SET_WINDOW_FRAMES: &str = "set_window_frames";
pub const SHOW_WINDOW_FRAMES: &str = "show_window_frames";

/// Команда, декодированная один раз на границе транспорта
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetWindowFrames(Vec<WindowFrameSpec>),
    ShowWindowFrames,
    /// Неизвестный или отсутствующий дискриминатор; молча игнорируется
    Unrecognized(Option<String>),
}

impl Command {
    /// Декодировать команду из JSON-значения.
    ///
    /// Ошибка возвращается только для некорректного `frames` у
    /// `set_window_frames`; всё прочее, что не удалось распознать,
    /// становится `Command::Unrecognized`.
    pub fn decode(raw: &Value) -> Result<Self> {
        let Some(name) = raw.get("command").and_then(Value::as_str) else {
            return Ok(Command::Unrecognized(None));
        };

        match name {
            SET_WINDOW_FRAMES => {
                let frames = raw
                    .get("frames")
                    .ok_or_else(|| server_error!(decode, "в команде {} нет поля frames", SET_WINDOW_FRAMES))?;
                Ok(Command::SetWindowFrames(decode_frames(frames)?))
            }
            SHOW_WINDOW_FRAMES => Ok(Command::ShowWindowFrames),
            other => Ok(Command::Unrecognized(Some(other.to_string()))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Command::SetWindowFrames(_) => SET_WINDOW_FRAMES,
            Command::ShowWindowFrames => SHOW_WINDOW_FRAMES,
            Command::Unrecognized(Some(name)) => name,
            Command::Unrecognized(None) => "<none>",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetWindowFrames(frames) => write!(f, "{} ({} frames)", self.name(), frames.len()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Декодировать массив frames целиком: одна ошибка отклоняет весь пакет
pub fn decode_frames(raw: &Value) -> Result<Vec<WindowFrameSpec>> {
    let frames = Vec::<WindowFrameSpec>::deserialize(raw)
        .map_err(|e| server_error!(decode, "не удалось декодировать frames: {}", e))?;

    if let Some(index) = frames
        .iter()
        .position(|spec| spec.application_identifier.is_empty())
    {
        return Err(server_error!(decode, "пустой bundle_identifier в frames[{}]", index));
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::events::XValue;
    use serde_json::json;

    #[test]
    fn test_decode_set_window_frames() {
        let raw = json!({
            "command": "set_window_frames",
            "frames": [
                { "bundle_identifier": "com.a", "x": 10, "y": 20, "width": 300, "height": 200 },
                { "bundle_identifier": "com.b", "x": "CENTER", "y": 0, "width": 640, "height": 480 }
            ]
        });

        match Command::decode(&raw).unwrap() {
            Command::SetWindowFrames(frames) => {
                assert_eq!(frames.len(), 2);
                assert_eq!(frames[0].x, XValue::Absolute(10.0));
                assert_eq!(frames[1].x, XValue::Centered);
                assert_eq!(frames[1].application_identifier, "com.b");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_one_malformed_frame_rejects_batch() {
        let raw = json!({
            "command": "set_window_frames",
            "frames": [
                { "bundle_identifier": "com.a", "x": 10, "y": 20, "width": 300, "height": 200 },
                { "bundle_identifier": "com.b", "x": true, "y": 0, "width": 640, "height": 480 }
            ]
        });
        assert!(matches!(Command::decode(&raw), Err(ServerError::Decode(_))));
    }

    #[test]
    fn test_missing_fields_and_empty_identifier_rejected() {
        let missing_height = json!([{ "bundle_identifier": "com.a", "x": 1, "y": 2, "width": 3 }]);
        assert!(decode_frames(&missing_height).is_err());

        let empty_id = json!([{ "bundle_identifier": "", "x": 1, "y": 2, "width": 3, "height": 4 }]);
        assert!(decode_frames(&empty_id).is_err());

        let not_array = json!({ "bundle_identifier": "com.a" });
        assert!(decode_frames(&not_array).is_err());

        let missing_frames = json!({ "command": "set_window_frames" });
        assert!(Command::decode(&missing_frames).is_err());
    }

    #[test]
    fn test_non_positive_targets_are_allowed() {
        let raw = json!([{ "bundle_identifier": "com.a", "x": 0, "y": 0, "width": 0, "height": -5 }]);
        let frames = decode_frames(&raw).unwrap();
        assert_eq!(frames[0].height, -5.0);
    }

    #[test]
    fn test_show_and_unrecognized() {
        assert_eq!(
            Command::decode(&json!({ "command": "show_window_frames" })).unwrap(),
            Command::ShowWindowFrames
        );
        assert_eq!(
            Command::decode(&json!({ "command": "set_window_frame" })).unwrap(),
            Command::Unrecognized(Some("set_window_frame".to_string()))
        );
        assert_eq!(Command::decode(&json!({ "frames": [] })).unwrap(), Command::Unrecognized(None));
        assert_eq!(Command::decode(&json!({ "command": 5 })).unwrap(), Command::Unrecognized(None));
        assert_eq!(Command::decode(&json!([1, 2])).unwrap(), Command::Unrecognized(None));
    }
}
