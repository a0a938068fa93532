use serde_json::Value;

use crate::types::{AiLevel, CharacterType, Position};

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Hello {
        name: String,
        character: Option<CharacterType>,
    },
    Start {
        ai: Option<AiLevel>,
    },
    Select {
        pos: Position,
    },
    Skill,
    Bind,
    Pause,
    Resume,
    NextFloor,
    Reset,
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let name = object.get("name")?.as_str()?.to_string();
            let character = match object.get("character") {
                None | Some(Value::Null) => None,
                Some(value) => Some(CharacterType::parse(value.as_str()?)?),
            };
            Some(ParsedClientMessage::Hello { name, character })
        }
        "start" => {
            let ai = match object.get("ai") {
                None | Some(Value::Null) => None,
                Some(value) => Some(AiLevel::parse(value.as_str()?)?),
            };
            Some(ParsedClientMessage::Start { ai })
        }
        "select" => {
            let raw_pos = object.get("pos")?.as_u64()?;
            let pos = Position::new(u8::try_from(raw_pos).ok()?)?;
            Some(ParsedClientMessage::Select { pos })
        }
        "skill" => Some(ParsedClientMessage::Skill),
        "bind" => Some(ParsedClientMessage::Bind),
        "pause" => Some(ParsedClientMessage::Pause),
        "resume" => Some(ParsedClientMessage::Resume),
        "next_floor" => Some(ParsedClientMessage::NextFloor),
        "reset" => Some(ParsedClientMessage::Reset),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hello_message() {
        let parsed = parse_client_message(r#"{"type":"hello","name":"A","character":"thief"}"#)
            .expect("hello message should parse");
        assert_eq!(
            parsed,
            ParsedClientMessage::Hello {
                name: "A".to_string(),
                character: Some(CharacterType::Thief),
            }
        );
    }

    #[test]
    fn parse_hello_without_character() {
        let parsed = parse_client_message(r#"{"type":"hello","name":"A"}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::Hello {
                character: None,
                ..
            })
        ));
    }

    #[test]
    fn parse_hello_rejects_unknown_character() {
        assert!(parse_client_message(r#"{"type":"hello","name":"A","character":"ninja"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"hello"}"#).is_none());
    }

    #[test]
    fn parse_start_message() {
        assert_eq!(
            parse_client_message(r#"{"type":"start","ai":"hard"}"#),
            Some(ParsedClientMessage::Start {
                ai: Some(AiLevel::Hard)
            })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"start"}"#),
            Some(ParsedClientMessage::Start { ai: None })
        );
        assert!(parse_client_message(r#"{"type":"start","ai":"brutal"}"#).is_none());
    }

    #[test]
    fn parse_select_checks_grid_range() {
        let parsed = parse_client_message(r#"{"type":"select","pos":5}"#);
        assert!(matches!(parsed, Some(ParsedClientMessage::Select { pos }) if pos.get() == 5));
        assert!(parse_client_message(r#"{"type":"select","pos":0}"#).is_none());
        assert!(parse_client_message(r#"{"type":"select","pos":10}"#).is_none());
        assert!(parse_client_message(r#"{"type":"select","pos":300}"#).is_none());
        assert!(parse_client_message(r#"{"type":"select","pos":-1}"#).is_none());
        assert!(parse_client_message(r#"{"type":"select","pos":"5"}"#).is_none());
    }

    #[test]
    fn parse_bare_commands() {
        let cases = [
            ("skill", ParsedClientMessage::Skill),
            ("bind", ParsedClientMessage::Bind),
            ("pause", ParsedClientMessage::Pause),
            ("resume", ParsedClientMessage::Resume),
            ("next_floor", ParsedClientMessage::NextFloor),
            ("reset", ParsedClientMessage::Reset),
        ];
        for (kind, expected) in cases {
            let raw = format!(r#"{{"type":"{kind}"}}"#);
            assert_eq!(parse_client_message(&raw), Some(expected));
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_client_message("not json").is_none());
        assert!(parse_client_message("[1,2]").is_none());
        assert!(parse_client_message(r#"{"type":"dance"}"#).is_none());
    }
}
