use super::*;
use crate::markup::{MarkupParse, MarkupParser, MarkupTree};
use std::sync::Arc;

/// A toy collaborator that consumes a single `<Tag>...</Tag>` element and
/// renders it back as its source text.
struct TagParser;
impl MarkupParser for TagParser {
    fn parse_markup(&self, input: &str) -> LangResult<MarkupParse> {
        let close = input.find("</").ok_or_else(|| {
            LangErrorMsg::UnexpectedEndOfInput {
                expected: "closing tag",
            }
            .without_span()
        })?;
        let end = input[close..]
            .find('>')
            .map(|i| close + i + 1)
            .ok_or_else(|| {
                LangErrorMsg::UnexpectedEndOfInput {
                    expected: "'>'",
                }
                .without_span()
            })?;
        Ok(MarkupParse {
            tree: MarkupTree::new(input[..end].to_owned()),
            leftover: input[end..].to_owned(),
        })
    }

    fn render_markup(&self, tree: &MarkupTree) -> Value {
        Value::Str(tree.downcast_ref::<String>().cloned().unwrap_or_default())
    }
}

fn markup_options() -> CompileOptions {
    CompileOptions {
        support_markup: true,
        markup: Some(Arc::new(TagParser)),
        ..CompileOptions::default()
    }
}

#[test]
fn test_markup_expression() {
    let program = compile_with("let ui = <Tag>hi</Tag>; ui", &markup_options()).unwrap();
    assert_eq!(
        Value::Str("<Tag>hi</Tag>".to_owned()),
        program.run(&Value::Null).unwrap()
    );
}

#[test]
fn test_parsing_continues_after_markup() {
    let program =
        compile_with("let ui = <Tag>hi</Tag>; 1 + 2", &markup_options()).unwrap();
    assert_eq!(Value::Int(3), program.run(&Value::Null).unwrap());
}

#[test]
fn test_markup_as_result() {
    let program = compile_with("<Tag>x</Tag>", &markup_options()).unwrap();
    assert_eq!(
        Value::Str("<Tag>x</Tag>".to_owned()),
        program.run(&Value::Null).unwrap()
    );
}

#[test]
fn test_markup_disabled_by_default() {
    assert!(matches!(
        compile_error("let ui = <Tag>hi</Tag>;"),
        LangErrorMsg::UnexpectedToken { .. }
    ));
}

#[test]
fn test_markup_flag_without_collaborator() {
    let options = CompileOptions {
        support_markup: true,
        ..CompileOptions::default()
    };
    let err = compile_with("<Tag>x</Tag>", &options).unwrap_err();
    assert!(matches!(err.msg, LangErrorMsg::UnexpectedToken { .. }));
}
