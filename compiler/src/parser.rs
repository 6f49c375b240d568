use crate::{
    tokenizer::Token,
    types::{
        Annotation, AnnotationValue, Document, FieldDef, MethodDef, ObjectDef, Params,
        Primitive, TypeDef, TypeRef,
    },
    utils::{error, name_error, quote},
    error::IdlError,
};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER:     Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref DECIMAL:        Regex = Regex::new(r"^-?\d+$").unwrap();
    static ref HEXADECIMAL:    Regex = Regex::new(r"^0[xX][0-9a-fA-F]+$").unwrap();
    static ref STRING_LITERAL: Regex = Regex::new(r#"^"(?:[^"\\\n]|\\.)*"$"#).unwrap();
    static ref LEFT_BRACE:     Regex = Regex::new(r"^\{$").unwrap();
    static ref RIGHT_BRACE:    Regex = Regex::new(r"^\}$").unwrap();
    static ref LEFT_PAREN:     Regex = Regex::new(r"^\($").unwrap();
    static ref RIGHT_PAREN:    Regex = Regex::new(r"^\)$").unwrap();
    static ref COLON:          Regex = Regex::new(r"^:$").unwrap();
    static ref COMMA:          Regex = Regex::new(r"^,$").unwrap();
    static ref QUESTION:       Regex = Regex::new(r"^\?$").unwrap();
    static ref AT:             Regex = Regex::new(r"^@$").unwrap();
    static ref ARROW:          Regex = Regex::new(r"^->$").unwrap();
    static ref OBJECT_KEYWORD: Regex = Regex::new(r"^object$").unwrap();
    static ref EOF:            Regex = Regex::new(r"^$").unwrap();
}

/// Parses a token stream into a `Document`. Any malformed sequence rejects
/// the whole document; no partial tree is returned.
pub fn parse_document(tokens: &[Token]) -> Result<Document, IdlError> {
    let mut parser = Parser { tokens, index: 0 };
    let mut objects = Vec::new();
    let mut global_types = Vec::new();

    while !parser.at(&EOF) {
        if parser.at(&OBJECT_KEYWORD) && parser.peek_is(1, &IDENTIFIER) {
            objects.push(parser.parse_object()?);
        } else if parser.at(&IDENTIFIER) {
            global_types.push(parser.parse_type_def()?);
        } else {
            return Err(parser.unexpected_token());
        }
    }

    Ok(Document { objects, global_types })
}

struct Parser<'a> {
    tokens: &'a [Token],
    index:  usize,
}

impl<'a> Parser<'a> {
    fn token_at(&self, index: usize) -> &'a Token {
        // The tokenizer always terminates the stream with an EOF token.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[index.min(last)]
    }

    fn current(&self) -> &'a Token {
        self.token_at(self.index)
    }

    fn at(&self, test: &Regex) -> bool {
        test.is_match(&self.current().text)
    }

    fn peek_is(&self, offset: usize, test: &Regex) -> bool {
        test.is_match(&self.token_at(self.index + offset).text)
    }

    fn eat(&mut self, test: &Regex) -> bool {
        if self.at(test) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, test: &Regex, expected: &str) -> Result<&'a Token, IdlError> {
        let tok = self.current();
        if !self.eat(test) {
            return Err(error(
                &format!("Expected {} but found {}", expected, describe(tok)),
                tok.line,
                tok.column,
            ));
        }
        Ok(tok)
    }

    fn unexpected_token(&self) -> IdlError {
        let tok = self.current();
        error(
            &format!("Unexpected token {}", describe(tok)),
            tok.line,
            tok.column,
        )
    }

    // object <name> { (type_def | method)* }
    fn parse_object(&mut self) -> Result<ObjectDef, IdlError> {
        self.expect(&OBJECT_KEYWORD, "\"object\"")?;
        let name_tok = self.expect(&IDENTIFIER, "object name")?;
        self.expect(&LEFT_BRACE, "\"{\"")?;

        let mut types = Vec::new();
        let mut methods = Vec::new();
        while !self.eat(&RIGHT_BRACE) {
            if self.at(&AT) {
                methods.push(self.parse_method()?);
            } else if self.at(&IDENTIFIER) && self.peek_is(1, &COLON) {
                types.push(self.parse_type_def()?);
            } else if self.at(&IDENTIFIER) && self.peek_is(1, &LEFT_PAREN) {
                methods.push(self.parse_method()?);
            } else if self.at(&IDENTIFIER) {
                self.index += 1;
                return Err(self.unexpected_token());
            } else {
                return Err(self.unexpected_token());
            }
        }

        Ok(ObjectDef {
            name:   name_tok.text.clone(),
            line:   name_tok.line,
            column: name_tok.column,
            types,
            methods,
        })
    }

    // <name> : { (field [,])* }
    fn parse_type_def(&mut self) -> Result<TypeDef, IdlError> {
        let name_tok = self.expect(&IDENTIFIER, "type name")?;
        self.expect(&COLON, "\":\"")?;
        self.expect(&LEFT_BRACE, "\"{\"")?;

        let mut fields = Vec::new();
        while !self.eat(&RIGHT_BRACE) {
            fields.push(self.parse_field()?);
            self.eat(&COMMA);
        }

        Ok(TypeDef {
            name:   name_tok.text.clone(),
            line:   name_tok.line,
            column: name_tok.column,
            fields,
        })
    }

    // <name> [?] : <type-ref>
    fn parse_field(&mut self) -> Result<FieldDef, IdlError> {
        let name_tok = self.expect(&IDENTIFIER, "field name")?;
        let optional = self.eat(&QUESTION);
        self.expect(&COLON, "\":\"")?;
        let type_ = self.parse_type_ref()?;

        Ok(FieldDef {
            name:   name_tok.text.clone(),
            line:   name_tok.line,
            column: name_tok.column,
            type_,
            optional,
        })
    }

    fn parse_type_ref(&mut self) -> Result<TypeRef, IdlError> {
        let tok = self.expect(&IDENTIFIER, "type name")?;
        Ok(match Primitive::from_keyword(&tok.text) {
            Some(primitive) => TypeRef::Primitive(primitive),
            None => TypeRef::Named(tok.text.clone()),
        })
    }

    // annotation* <name> ( [params] ) [(-> | :) <handler>]
    fn parse_method(&mut self) -> Result<MethodDef, IdlError> {
        let mut annotations = Vec::new();
        while self.at(&AT) {
            annotations.push(self.parse_annotation()?);
        }

        let name_tok = self.expect(&IDENTIFIER, "method name")?;
        self.expect(&LEFT_PAREN, "\"(\"")?;
        let params = self.parse_params(&name_tok.text)?;
        self.expect(&RIGHT_PAREN, "\")\"")?;

        let custom_handler = if self.eat(&ARROW) || self.eat(&COLON) {
            let handler_tok = self.expect(&IDENTIFIER, "handler name")?;
            Some(handler_tok.text.clone())
        } else {
            None
        };

        Ok(MethodDef {
            name:   name_tok.text.clone(),
            line:   name_tok.line,
            column: name_tok.column,
            params,
            annotations,
            custom_handler,
        })
    }

    fn parse_params(&mut self, method: &str) -> Result<Params, IdlError> {
        if self.at(&RIGHT_PAREN) {
            return Ok(Params::None);
        }

        let first = self.current();
        if self.peek_is(1, &QUESTION) || self.peek_is(1, &COLON) {
            let mut params = vec![self.parse_field()?];
            while self.eat(&COMMA) {
                let tok = self.current();
                if self.at(&IDENTIFIER) && (self.peek_is(1, &COMMA) || self.peek_is(1, &RIGHT_PAREN)) {
                    return Err(mixed_params(method, tok));
                }
                params.push(self.parse_field()?);
            }
            return Ok(Params::Direct { params });
        }

        let type_tok = self.expect(&IDENTIFIER, "parameter or type name")?;
        if self.at(&COMMA) {
            return Err(mixed_params(method, first));
        }
        Ok(Params::Shared {
            type_name: type_tok.text.clone(),
            line:      type_tok.line,
            column:    type_tok.column,
        })
    }

    // @ <name> ( <string | hex | decimal> )
    fn parse_annotation(&mut self) -> Result<Annotation, IdlError> {
        self.expect(&AT, "\"@\"")?;
        let name_tok = self.expect(&IDENTIFIER, "annotation name")?;
        self.expect(&LEFT_PAREN, "\"(\"")?;

        let value_tok = self.current();
        let value = if self.eat(&STRING_LITERAL) {
            let text = &value_tok.text;
            AnnotationValue::Str(text[1..text.len() - 1].to_string())
        } else if self.eat(&HEXADECIMAL) {
            let digits = &value_tok.text[2..];
            AnnotationValue::Int(i64::from_str_radix(digits, 16).map_err(|_| {
                invalid_integer(value_tok)
            })?)
        } else if self.eat(&DECIMAL) {
            AnnotationValue::Int(value_tok.text.parse::<i64>().map_err(|_| {
                invalid_integer(value_tok)
            })?)
        } else {
            return Err(error(
                &format!("Expected annotation value but found {}", describe(value_tok)),
                value_tok.line,
                value_tok.column,
            ));
        };

        self.expect(&RIGHT_PAREN, "\")\"")?;

        Ok(Annotation {
            name:   name_tok.text.clone(),
            line:   name_tok.line,
            column: name_tok.column,
            value,
        })
    }
}

fn describe(tok: &Token) -> String {
    if tok.text.is_empty() {
        "end of input".to_string()
    } else {
        quote(&tok.text)
    }
}

fn invalid_integer(tok: &Token) -> IdlError {
    error(
        &format!("Invalid integer {}", quote(&tok.text)),
        tok.line,
        tok.column,
    )
}

fn mixed_params(method: &str, tok: &Token) -> IdlError {
    name_error(
        format!(
            "Method {} mixes named parameters with a shared type parameter",
            quote(method)
        ),
        tok.line,
        tok.column,
    )
}
