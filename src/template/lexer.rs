//! Splits a raw template source into literal text and `{{ ... }}` action
//! segments, recognizing trim markers.

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawToken {
    Text(String),
    /// The normalized (whitespace-collapsed) content between the
    /// delimiters, e.g. `if .Show`.
    Action {
        content: String,
        trim_left: bool,
        trim_right: bool,
    },
}

pub(crate) fn lex(source: &str) -> Result<Vec<RawToken>, EngineError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut offset = 0usize;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(RawToken::Text(rest[..start].to_string()));
        }
        let after_open = &rest[start + 2..];
        let end = after_open.find("}}").ok_or_else(|| EngineError::Syntax {
            offset: offset + start,
            message: "unterminated {{ ... }}".to_string(),
        })?;
        let mut inner = &after_open[..end];

        let trim_left = inner.starts_with('-');
        if trim_left {
            inner = inner[1..].trim_start();
        }
        let trim_right = inner.ends_with('-');
        if trim_right {
            inner = inner[..inner.len() - 1].trim_end();
        }
        let content = normalize_whitespace(inner.trim());

        tokens.push(RawToken::Action {
            content,
            trim_left,
            trim_right,
        });

        offset += start + 2 + end + 2;
        rest = &after_open[end + 2..];
    }

    if !rest.is_empty() {
        tokens.push(RawToken::Text(rest.to_string()));
    }

    Ok(apply_trim_markers(tokens))
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim markers operate on the *adjacent text nodes*, not the action
/// itself.
fn apply_trim_markers(mut tokens: Vec<RawToken>) -> Vec<RawToken> {
    let len = tokens.len();
    for i in 0..len {
        let (trim_left, trim_right) = match &tokens[i] {
            RawToken::Action {
                trim_left,
                trim_right,
                ..
            } => (*trim_left, *trim_right),
            RawToken::Text(_) => continue,
        };

        if trim_left && i > 0 {
            if let RawToken::Text(t) = &mut tokens[i - 1] {
                *t = t.trim_end().to_string();
            }
        }
        if trim_right && i + 1 < len {
            if let RawToken::Text(t) = &mut tokens[i + 1] {
                *t = t.trim_start().to_string();
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_text_and_actions() {
        let tokens = lex("<p>Hello {{.Name}}!</p>").unwrap();
        assert_eq!(
            tokens,
            vec![
                RawToken::Text("<p>Hello ".to_string()),
                RawToken::Action {
                    content: ".Name".to_string(),
                    trim_left: false,
                    trim_right: false,
                },
                RawToken::Text("!</p>".to_string()),
            ]
        );
    }

    #[test]
    fn normalizes_whitespace_inside_delimiters() {
        let tokens = lex("{{   if   .Show   }}").unwrap();
        assert_eq!(
            tokens[0],
            RawToken::Action {
                content: "if .Show".to_string(),
                trim_left: false,
                trim_right: false,
            }
        );
    }

    #[test]
    fn trim_markers_eat_adjacent_whitespace() {
        let tokens = lex("a \n {{- .X -}} \n b").unwrap();
        assert_eq!(tokens[0], RawToken::Text("a".to_string()));
        assert_eq!(tokens[2], RawToken::Text("b".to_string()));
    }

    #[test]
    fn unterminated_action_is_syntax_error() {
        let err = lex("{{ .Name").unwrap_err();
        assert!(matches!(err, EngineError::Syntax { .. }));
    }
}
