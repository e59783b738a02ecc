//! Expression support for the in-memory store.
//!
//! Covers the subset of the DynamoDB expression language the document
//! client commonly sends:
//!
//! - update: `SET a = operand [(+|-) operand]`, `if_not_exists(path, operand)`,
//!   `list_append(operand, operand)`, `REMOVE a, b`
//! - condition: `attribute_exists(path)` / `attribute_not_exists(path)` joined by `AND`
//! - projection: comma-separated paths
//!
//! Paths are top-level attribute names or `#name` placeholders. Values are
//! `:value` placeholders. Nested document paths are rejected.

use std::collections::{BTreeMap, HashSet};

use recordgate_core::Item;
use serde_json::{Number, Value};

use super::error::StoreError;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Equals,
    Plus,
    Minus,
    Comma,
    LParen,
    RParen,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '#' | ':')
}

fn tokenize(expr: &str) -> Result<Vec<Token>, StoreError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        let single = match c {
            '=' => Some(Token::Equals),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };

        if let Some(token) = single {
            chars.next();
            tokens.push(token);
        } else if c.is_whitespace() {
            chars.next();
        } else if is_word_char(c) {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if !is_word_char(c) {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        } else {
            return Err(StoreError::validation(format!(
                "Invalid expression: unsupported token '{c}'"
            )));
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parsed forms
// ---------------------------------------------------------------------------

/// Right-hand side building block of a `SET` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Current value of an attribute.
    Path(String),
    /// Resolved `:value` placeholder.
    Literal(Value),
    /// Attribute value if present, otherwise the fallback.
    IfNotExists(String, Box<Operand>),
    /// Concatenation of two lists.
    ListAppend(Box<Operand>, Box<Operand>),
}

/// Full right-hand side of a `SET` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Operand(Operand),
    Add(Operand, Operand),
    Subtract(Operand, Operand),
}

/// One action of an update expression.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set { attribute: String, value: SetValue },
    Remove { attribute: String },
}

impl UpdateAction {
    /// Attribute this action writes.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Set { attribute, .. } | Self::Remove { attribute } => attribute,
        }
    }
}

/// One term of a condition expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Exists(String),
    NotExists(String),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Placeholder tables supplied alongside an expression.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub names: &'a BTreeMap<String, String>,
    pub values: &'a Item,
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    placeholders: Placeholders<'a>,
}

impl<'a> Parser<'a> {
    fn new(expr: &str, placeholders: Placeholders<'a>) -> Result<Self, StoreError> {
        Ok(Self {
            tokens: tokenize(expr)?,
            pos: 0,
            placeholders,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), StoreError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(syntax_error(self.peek()))
        }
    }

    fn resolve_name(&self, word: &str) -> Result<String, StoreError> {
        if word.starts_with('#') {
            self.placeholders.names.get(word).cloned().ok_or_else(|| {
                StoreError::validation(format!(
                    "An expression attribute name used in the document path is not defined; attribute name: {word}"
                ))
            })
        } else if word.starts_with(':') || word.contains(['#', ':']) {
            Err(syntax_error(Some(&Token::Word(word.to_string()))))
        } else {
            Ok(word.to_string())
        }
    }

    fn resolve_value(&self, word: &str) -> Result<Value, StoreError> {
        self.placeholders.values.get(word).cloned().ok_or_else(|| {
            StoreError::validation(format!(
                "An expression attribute value used in expression is not defined; attribute value: {word}"
            ))
        })
    }

    fn path(&mut self) -> Result<String, StoreError> {
        match self.next_token() {
            Some(Token::Word(word)) => self.resolve_name(&word),
            other => Err(syntax_error(other.as_ref())),
        }
    }

    fn operand(&mut self) -> Result<Operand, StoreError> {
        let word = match self.next_token() {
            Some(Token::Word(word)) => word,
            other => return Err(syntax_error(other.as_ref())),
        };

        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let operand = match word.to_ascii_lowercase().as_str() {
                "if_not_exists" => {
                    let path = self.path()?;
                    self.expect(&Token::Comma)?;
                    let fallback = self.operand()?;
                    Operand::IfNotExists(path, Box::new(fallback))
                }
                "list_append" => {
                    let left = self.operand()?;
                    self.expect(&Token::Comma)?;
                    let right = self.operand()?;
                    Operand::ListAppend(Box::new(left), Box::new(right))
                }
                _ => {
                    return Err(StoreError::validation(format!(
                        "Invalid UpdateExpression: Invalid function name; function: {word}"
                    )))
                }
            };
            self.expect(&Token::RParen)?;
            return Ok(operand);
        }

        if word.starts_with(':') {
            Ok(Operand::Literal(self.resolve_value(&word)?))
        } else {
            Ok(Operand::Path(self.resolve_name(&word)?))
        }
    }

    fn set_value(&mut self) -> Result<SetValue, StoreError> {
        let left = self.operand()?;
        if self.eat(&Token::Plus) {
            Ok(SetValue::Add(left, self.operand()?))
        } else if self.eat(&Token::Minus) {
            Ok(SetValue::Subtract(left, self.operand()?))
        } else {
            Ok(SetValue::Operand(left))
        }
    }
}

fn syntax_error(found: Option<&Token>) -> StoreError {
    match found {
        Some(token) => StoreError::validation(format!(
            "Invalid expression: Syntax error; token: {token:?}"
        )),
        None => StoreError::validation("Invalid expression: Syntax error; unexpected end of input"),
    }
}

/// Parses an `UpdateExpression` into its actions.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] on syntax errors, undefined
/// placeholders, unsupported clauses (`ADD`, `DELETE`), repeated clauses,
/// or two actions on the same attribute.
pub fn parse_update(
    expr: &str,
    placeholders: Placeholders<'_>,
) -> Result<Vec<UpdateAction>, StoreError> {
    let mut parser = Parser::new(expr, placeholders)?;
    let mut actions = Vec::new();
    let mut clauses = HashSet::new();

    while let Some(token) = parser.next_token() {
        let Token::Word(keyword) = token else {
            return Err(syntax_error(Some(&token)));
        };
        let keyword = keyword.to_ascii_uppercase();
        if !clauses.insert(keyword.clone()) {
            return Err(StoreError::validation(format!(
                "Invalid UpdateExpression: The \"{keyword}\" section can only be used once in an update expression"
            )));
        }

        match keyword.as_str() {
            "SET" => loop {
                let attribute = parser.path()?;
                parser.expect(&Token::Equals)?;
                let value = parser.set_value()?;
                actions.push(UpdateAction::Set { attribute, value });
                if !parser.eat(&Token::Comma) {
                    break;
                }
            },
            "REMOVE" => loop {
                let attribute = parser.path()?;
                actions.push(UpdateAction::Remove { attribute });
                if !parser.eat(&Token::Comma) {
                    break;
                }
            },
            "ADD" | "DELETE" => {
                return Err(StoreError::validation(format!(
                    "Invalid UpdateExpression: {keyword} clauses are not supported"
                )))
            }
            _ => return Err(syntax_error(Some(&Token::Word(keyword)))),
        }
    }

    if actions.is_empty() {
        return Err(StoreError::validation(
            "Invalid UpdateExpression: The expression can not be empty",
        ));
    }

    let mut seen = HashSet::new();
    for action in &actions {
        if !seen.insert(action.attribute()) {
            return Err(StoreError::validation(format!(
                "Invalid UpdateExpression: Two document paths overlap with each other; path: [{}]",
                action.attribute()
            )));
        }
    }

    Ok(actions)
}

/// Parses a `ConditionExpression` into predicates that must all hold.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] for anything other than
/// `attribute_exists`/`attribute_not_exists` terms joined by `AND`.
pub fn parse_condition(
    expr: &str,
    placeholders: Placeholders<'_>,
) -> Result<Vec<Predicate>, StoreError> {
    let mut parser = Parser::new(expr, placeholders)?;
    let mut predicates = Vec::new();

    loop {
        let function = match parser.next_token() {
            Some(Token::Word(word)) => word.to_ascii_lowercase(),
            other => return Err(syntax_error(other.as_ref())),
        };
        parser.expect(&Token::LParen)?;
        let path = parser.path()?;
        parser.expect(&Token::RParen)?;

        match function.as_str() {
            "attribute_exists" => predicates.push(Predicate::Exists(path)),
            "attribute_not_exists" => predicates.push(Predicate::NotExists(path)),
            _ => {
                return Err(StoreError::validation(format!(
                    "Invalid ConditionExpression: unsupported function {function}"
                )))
            }
        }

        match parser.next_token() {
            None => break,
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("AND") => {}
            other => return Err(syntax_error(other.as_ref())),
        }
    }

    Ok(predicates)
}

/// Parses a `ProjectionExpression` into attribute names.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] on syntax errors or undefined `#name`
/// placeholders.
pub fn parse_projection(
    expr: &str,
    names: &BTreeMap<String, String>,
) -> Result<Vec<String>, StoreError> {
    let values = Item::new();
    let mut parser = Parser::new(expr, Placeholders { names, values: &values })?;
    let mut attributes = Vec::new();

    loop {
        attributes.push(parser.path()?);
        if parser.at_end() {
            break;
        }
        parser.expect(&Token::Comma)?;
    }

    Ok(attributes)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Returns `true` when every predicate holds for `item` (`None` = absent item).
#[must_use]
pub fn condition_holds(predicates: &[Predicate], item: Option<&Item>) -> bool {
    predicates.iter().all(|predicate| match predicate {
        Predicate::Exists(attr) => item.is_some_and(|i| i.contains_key(attr)),
        Predicate::NotExists(attr) => !item.is_some_and(|i| i.contains_key(attr)),
    })
}

/// Applies update actions to `old`, returning the new item.
///
/// Every right-hand side is evaluated against `old`, so assignments within
/// one expression do not observe each other.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] when a path operand is missing from
/// the item or an operand has the wrong type.
pub fn apply_update(actions: &[UpdateAction], old: &Item) -> Result<Item, StoreError> {
    let mut evaluated = Vec::with_capacity(actions.len());
    for action in actions {
        match action {
            UpdateAction::Set { attribute, value } => {
                evaluated.push((attribute, Some(eval_set_value(value, old)?)));
            }
            UpdateAction::Remove { attribute } => evaluated.push((attribute, None)),
        }
    }

    let mut item = old.clone();
    for (attribute, value) in evaluated {
        match value {
            Some(value) => {
                item.insert(attribute.clone(), value);
            }
            None => {
                item.remove(attribute);
            }
        }
    }
    Ok(item)
}

fn eval_set_value(value: &SetValue, item: &Item) -> Result<Value, StoreError> {
    match value {
        SetValue::Operand(operand) => eval_operand(operand, item),
        SetValue::Add(left, right) => {
            arithmetic(&eval_operand(left, item)?, &eval_operand(right, item)?, false)
        }
        SetValue::Subtract(left, right) => {
            arithmetic(&eval_operand(left, item)?, &eval_operand(right, item)?, true)
        }
    }
}

fn eval_operand(operand: &Operand, item: &Item) -> Result<Value, StoreError> {
    match operand {
        Operand::Path(attr) => item.get(attr).cloned().ok_or_else(|| {
            StoreError::validation(
                "The provided expression refers to an attribute that does not exist in the item",
            )
        }),
        Operand::Literal(value) => Ok(value.clone()),
        Operand::IfNotExists(attr, fallback) => match item.get(attr) {
            Some(value) => Ok(value.clone()),
            None => eval_operand(fallback, item),
        },
        Operand::ListAppend(left, right) => {
            match (eval_operand(left, item)?, eval_operand(right, item)?) {
                (Value::Array(mut head), Value::Array(tail)) => {
                    head.extend(tail);
                    Ok(Value::Array(head))
                }
                _ => Err(StoreError::validation(
                    "Incorrect operand type for operator or function; operator or function: list_append",
                )),
            }
        }
    }
}

fn arithmetic(left: &Value, right: &Value, subtract: bool) -> Result<Value, StoreError> {
    let operator = if subtract { "-" } else { "+" };
    let type_error = || {
        StoreError::validation(format!(
            "Incorrect operand type for operator or function; operator: {operator}"
        ))
    };

    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(type_error());
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let result = if subtract {
            x.checked_sub(y)
        } else {
            x.checked_add(y)
        };
        if let Some(result) = result {
            return Ok(Value::Number(Number::from(result)));
        }
    }

    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return Err(type_error());
    };
    let result = if subtract { x - y } else { x + y };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| StoreError::validation("Number overflow. Attempting to store a number with magnitude larger than supported range"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn names(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn set_with_placeholders() {
        let names = names(&[("#v", "val")]);
        let values = object(json!({":v": "y"}));
        let actions = parse_update(
            "SET #v = :v",
            Placeholders { names: &names, values: &values },
        )
        .unwrap();

        let item = apply_update(&actions, &object(json!({"id": "1", "val": "x"}))).unwrap();
        assert_eq!(Value::Object(item), json!({"id": "1", "val": "y"}));
    }

    #[test]
    fn set_and_remove_in_one_expression() {
        let empty = BTreeMap::new();
        let values = object(json!({":one": 1}));
        let actions = parse_update(
            "set counter = counter + :one remove stale",
            Placeholders { names: &empty, values: &values },
        )
        .unwrap();
        assert_eq!(actions.len(), 2);

        let old = object(json!({"id": "1", "counter": 41, "stale": true}));
        let item = apply_update(&actions, &old).unwrap();
        assert_eq!(Value::Object(item), json!({"id": "1", "counter": 42}));
    }

    #[test]
    fn if_not_exists_and_list_append() {
        let empty = BTreeMap::new();
        let values = object(json!({":empty": [], ":tags": ["a"], ":zero": 0}));
        let actions = parse_update(
            "SET tags = list_append(if_not_exists(tags, :empty), :tags), hits = if_not_exists(hits, :zero)",
            Placeholders { names: &empty, values: &values },
        )
        .unwrap();

        let first = apply_update(&actions, &object(json!({"id": "1"}))).unwrap();
        assert_eq!(first["tags"], json!(["a"]));
        assert_eq!(first["hits"], json!(0));

        let second = apply_update(&actions, &first).unwrap();
        assert_eq!(second["tags"], json!(["a", "a"]));
    }

    #[test]
    fn right_hand_sides_see_old_item() {
        let empty = BTreeMap::new();
        let values = Item::new();
        let actions = parse_update(
            "SET a = b, b = a",
            Placeholders { names: &empty, values: &values },
        )
        .unwrap();
        let item = apply_update(&actions, &object(json!({"a": 1, "b": 2}))).unwrap();
        assert_eq!(Value::Object(item), json!({"a": 2, "b": 1}));
    }

    #[test]
    fn float_arithmetic() {
        let empty = BTreeMap::new();
        let values = object(json!({":d": 0.5}));
        let actions = parse_update(
            "SET price = price - :d",
            Placeholders { names: &empty, values: &values },
        )
        .unwrap();
        let item = apply_update(&actions, &object(json!({"price": 2}))).unwrap();
        assert_eq!(item["price"], json!(1.5));
    }

    #[test]
    fn arithmetic_on_strings_is_rejected() {
        let empty = BTreeMap::new();
        let values = object(json!({":one": 1}));
        let actions = parse_update(
            "SET val = val + :one",
            Placeholders { names: &empty, values: &values },
        )
        .unwrap();
        let err = apply_update(&actions, &object(json!({"val": "x"}))).unwrap_err();
        assert!(matches!(err, StoreError::Validation(msg) if msg.contains("operator: +")));
    }

    #[test]
    fn missing_path_operand_is_rejected() {
        let empty = BTreeMap::new();
        let values = Item::new();
        let actions = parse_update(
            "SET a = missing",
            Placeholders { names: &empty, values: &values },
        )
        .unwrap();
        assert!(apply_update(&actions, &Item::new()).is_err());
    }

    #[test]
    fn undefined_placeholders_are_rejected() {
        let empty = BTreeMap::new();
        let values = Item::new();
        let err = parse_update(
            "SET #a = :v",
            Placeholders { names: &empty, values: &values },
        )
        .unwrap_err();
        assert!(err.to_string().contains("#a"));

        let names = names(&[("#a", "a")]);
        let err = parse_update(
            "SET #a = :v",
            Placeholders { names: &names, values: &values },
        )
        .unwrap_err();
        assert!(err.to_string().contains(":v"));
    }

    #[test]
    fn rejects_unsupported_and_malformed_expressions() {
        let empty = BTreeMap::new();
        let values = object(json!({":v": 1}));
        let ph = Placeholders { names: &empty, values: &values };

        assert!(parse_update("ADD counter :v", ph).is_err());
        assert!(parse_update("SET a = :v SET b = :v", ph).is_err());
        assert!(parse_update("SET a = :v, a = :v", ph).is_err());
        assert!(parse_update("SET a.b = :v", ph).is_err());
        assert!(parse_update("SET a :v", ph).is_err());
        assert!(parse_update("", ph).is_err());
        assert!(parse_update("SET a = size(b)", ph).is_err());
    }

    #[test]
    fn condition_exists_and_not_exists() {
        let names = names(&[("#id", "id")]);
        let values = Item::new();
        let predicates = parse_condition(
            "attribute_exists(#id) AND attribute_not_exists(locked)",
            Placeholders { names: &names, values: &values },
        )
        .unwrap();
        assert_eq!(
            predicates,
            vec![
                Predicate::Exists("id".to_string()),
                Predicate::NotExists("locked".to_string())
            ]
        );

        let item = object(json!({"id": "1"}));
        assert!(condition_holds(&predicates, Some(&item)));
        let locked = object(json!({"id": "1", "locked": true}));
        assert!(!condition_holds(&predicates, Some(&locked)));
        assert!(!condition_holds(&predicates, None));
    }

    #[test]
    fn condition_rejects_or() {
        let empty = BTreeMap::new();
        let values = Item::new();
        let ph = Placeholders { names: &empty, values: &values };
        assert!(parse_condition("attribute_exists(a) OR attribute_exists(b)", ph).is_err());
        assert!(parse_condition("a = :v", ph).is_err());
    }

    #[test]
    fn projection_resolves_names() {
        let names = names(&[("#v", "val")]);
        let attrs = parse_projection("id, #v", &names).unwrap();
        assert_eq!(attrs, vec!["id".to_string(), "val".to_string()]);
        assert!(parse_projection("id,", &names).is_err());
    }
}
