use crate::error::{Location, RenderError};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::PathBuf;

use super::ast::{BinaryOp, Expr, LoopKind, Node, UnaryOp};
use super::engine::{Template, TemplateEngine};
use super::include::IncludeResolver;
use super::value::{
    add, compare, display, escape_xml, loose_equals, number, strict_equals, to_number, truthy,
    type_of, JsValue,
};

/// Walks a compiled template against one data object
pub struct Renderer<'a> {
    engine: &'a TemplateEngine,
    template: &'a Template,
    /// Top-level data, shared by every template in the include tree
    data: &'a Value,
    /// Variables passed down through `include()`, shadowing `data`
    scope: Map<String, Value>,
    /// Loop bindings and `let` locals, innermost last
    locals: Vec<(String, JsValue<'static>)>,
    /// Include stack shared with nested renders
    stack: &'a mut Vec<PathBuf>,
}

impl<'a> Renderer<'a> {
    pub fn new(
        engine: &'a TemplateEngine,
        template: &'a Template,
        data: &'a Value,
        scope: Map<String, Value>,
        stack: &'a mut Vec<PathBuf>,
    ) -> Self {
        Self {
            engine,
            template,
            data,
            scope,
            locals: Vec::new(),
            stack,
        }
    }

    pub fn run(mut self) -> Result<String, RenderError> {
        let template = self.template;
        let mut out = String::with_capacity(template.source.len());
        self.render_block(&template.nodes, &mut out)?;
        Ok(out)
    }

    fn render_block(&mut self, nodes: &[Node], out: &mut String) -> Result<(), RenderError> {
        let mark = self.locals.len();
        for node in nodes {
            self.render_node(node, out)?;
        }
        self.locals.truncate(mark);
        Ok(())
    }

    fn render_node(&mut self, node: &Node, out: &mut String) -> Result<(), RenderError> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output {
                expr,
                escape,
                offset,
            } => {
                let value = self.eval(expr, *offset)?;
                let text = display(&value);
                if *escape {
                    out.push_str(&escape_xml(&text));
                } else {
                    out.push_str(&text);
                }
            }
            Node::If {
                cond,
                then,
                otherwise,
                offset,
            } => {
                let value = self.eval(cond, *offset)?;
                if truthy(&value) {
                    self.render_block(then, out)?;
                } else {
                    self.render_block(otherwise, out)?;
                }
            }
            Node::For {
                kind,
                binding,
                index,
                iterable,
                body,
                offset,
            } => {
                let items = self.iteration_items(*kind, iterable, *offset)?;
                for (position, item) in items.into_iter().enumerate() {
                    self.locals.push((binding.clone(), item));
                    if let Some(index) = index {
                        self.locals
                            .push((index.clone(), JsValue::owned(Value::from(position))));
                    }
                    self.render_block(body, out)?;
                    self.locals.pop();
                    if index.is_some() {
                        self.locals.pop();
                    }
                }
            }
            Node::Let {
                name,
                value,
                offset,
            } => {
                let value = self.eval(value, *offset)?;
                self.locals.push((name.clone(), value));
            }
        }
        Ok(())
    }

    /// Values for `for...of` / `forEach`, keys for `for...in`
    fn iteration_items(
        &mut self,
        kind: LoopKind,
        iterable: &Expr,
        offset: usize,
    ) -> Result<Vec<JsValue<'static>>, RenderError> {
        let value = self.eval(iterable, offset)?;
        if kind == LoopKind::Of && value.is_nullish() && !self.engine.strict() {
            return Ok(Vec::new());
        }

        let indices = |len: usize| {
            (0..len)
                .map(|i| JsValue::owned(Value::String(i.to_string())))
                .collect::<Vec<_>>()
        };
        let items = match (kind, value) {
            (LoopKind::Of, JsValue::Json(value)) => match value.into_owned() {
                Value::Array(items) => Some(items.into_iter().map(JsValue::owned).collect()),
                Value::String(s) => Some(
                    s.chars()
                        .map(|c| JsValue::owned(Value::String(c.to_string())))
                        .collect(),
                ),
                _ => None,
            },
            (LoopKind::Of, _) => None,
            (LoopKind::In, JsValue::Json(value)) => Some(match value.as_ref() {
                Value::Object(map) => map
                    .keys()
                    .map(|key| JsValue::owned(Value::String(key.clone())))
                    .collect(),
                Value::Array(items) => indices(items.len()),
                Value::String(s) => indices(s.chars().count()),
                _ => Vec::new(),
            }),
            (LoopKind::In, _) => Some(Vec::new()),
        };

        items.ok_or_else(|| {
            self.runtime_error(offset, format!("{} is not iterable", iterable.describe()))
        })
    }

    fn eval(&mut self, expr: &Expr, offset: usize) -> Result<JsValue<'static>, RenderError> {
        match expr {
            Expr::Literal(value) => Ok(JsValue::owned(value.clone())),
            Expr::Undefined => Ok(JsValue::Undefined),
            Expr::Ident(_) | Expr::Member(..) | Expr::Index(..) => {
                if let Some((root, keys)) = self.path(expr, offset)? {
                    return Ok(self.walk(root, &keys, offset)?.into_owned());
                }
                match expr {
                    Expr::Member(target, name) => {
                        let target = self.eval(target, offset)?;
                        self.property(target, name, offset)
                    }
                    Expr::Index(target, index) => {
                        let target = self.eval(target, offset)?;
                        let key = display(&self.eval(index, offset)?);
                        self.property(target, &key, offset)
                    }
                    _ => Ok(JsValue::Undefined),
                }
            }
            Expr::Call {
                target,
                method,
                args,
            } => self.call(target, method, args, offset),
            Expr::Include(path, locals) => {
                let name = display(&self.eval(path, offset)?);
                let locals = match locals {
                    Some(locals) => self.eval(locals, offset)?.into_json(),
                    None => None,
                };
                if !matches!(locals, None | Some(Value::Object(_))) {
                    return Err(self.runtime_error(offset, "include() locals must be an object"));
                }
                let scope = IncludeResolver::scope(&self.scope, locals);
                let rendered = self.engine.render_include(
                    self.template.path.as_deref(),
                    &name,
                    self.data,
                    scope,
                    &mut *self.stack,
                )?;
                Ok(JsValue::owned(Value::String(rendered)))
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, offset)?.into_json().unwrap_or(Value::Null));
                }
                Ok(JsValue::owned(Value::Array(values)))
            }
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    if let Some(value) = self.eval(value, offset)?.into_json() {
                        map.insert(key.clone(), value);
                    }
                }
                Ok(JsValue::owned(Value::Object(map)))
            }
            Expr::Unary(op, operand) => {
                // typeof never throws, even for undeclared names in strict mode
                let value = match (op, operand.as_ref()) {
                    (UnaryOp::TypeOf, Expr::Ident(name)) => {
                        let kind = self.lookup(name).map_or("undefined", |v| type_of(&v));
                        return Ok(JsValue::owned(Value::String(kind.to_string())));
                    }
                    _ => self.eval(operand, offset)?,
                };
                Ok(match op {
                    UnaryOp::Not => JsValue::owned(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => number(-to_number(&value)),
                    UnaryOp::TypeOf => JsValue::owned(Value::String(type_of(&value).to_string())),
                })
            }
            Expr::Binary(op, left, right) => self.binary(*op, left, right, offset),
            Expr::Ternary(cond, then, otherwise) => {
                let cond = self.eval(cond, offset)?;
                if truthy(&cond) {
                    self.eval(then, offset)
                } else {
                    self.eval(otherwise, offset)
                }
            }
        }
    }

    /// Split `a.b[c]` into its root identifier and evaluated keys, or `None`
    /// when the chain does not start at an identifier
    fn path<'e>(
        &mut self,
        expr: &'e Expr,
        offset: usize,
    ) -> Result<Option<(&'e str, Vec<String>)>, RenderError> {
        match expr {
            Expr::Ident(name) => Ok(Some((name.as_str(), Vec::new()))),
            Expr::Member(target, name) => {
                let Some((root, mut keys)) = self.path(target, offset)? else {
                    return Ok(None);
                };
                keys.push(name.clone());
                Ok(Some((root, keys)))
            }
            Expr::Index(target, index) => {
                let Some((root, mut keys)) = self.path(target, offset)? else {
                    return Ok(None);
                };
                keys.push(display(&self.eval(index, offset)?));
                Ok(Some((root, keys)))
            }
            _ => Ok(None),
        }
    }

    /// Follow a path through locals and data without cloning what it passes
    fn walk(&self, root: &str, keys: &[String], offset: usize) -> Result<JsValue<'_>, RenderError> {
        let mut current = match self.lookup(root) {
            Some(value) => value,
            None if self.engine.strict() => {
                return Err(RenderError::UndefinedVariable {
                    name: root.to_string(),
                    location: self.location(offset),
                })
            }
            None => JsValue::Undefined,
        };
        for key in keys {
            current = self.property(current, key, offset)?;
        }
        Ok(current)
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        offset: usize,
    ) -> Result<JsValue<'static>, RenderError> {
        let left = self.eval(left, offset)?;
        match op {
            BinaryOp::Or if truthy(&left) => return Ok(left),
            BinaryOp::And if !truthy(&left) => return Ok(left),
            _ => {}
        }
        let right = self.eval(right, offset)?;
        Ok(apply_binary(op, left, right))
    }

    fn call(
        &mut self,
        target: &Expr,
        method: &str,
        args: &[Expr],
        offset: usize,
    ) -> Result<JsValue<'static>, RenderError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, offset)?);
        }
        let arg = |i: usize| values.get(i).map_or(JsValue::Undefined, JsValue::view);

        if let Expr::Ident(name) = target {
            if name == "JSON" && method == "stringify" && self.lookup(name).is_none() {
                return Ok(match json_stringify(&arg(0), &arg(2)) {
                    Some(text) => JsValue::owned(Value::String(text)),
                    None => JsValue::Undefined,
                });
            }
        }

        let receiver = match self.path(target, offset)? {
            Some((root, keys)) => self.walk(root, &keys, offset)?,
            None => self.eval(target, offset)?,
        };
        if receiver.is_nullish() {
            if self.engine.strict() {
                return Err(RenderError::PropertyOfUndefined {
                    property: method.to_string(),
                    location: self.location(offset),
                });
            }
            return Ok(JsValue::Undefined);
        }

        let text_arg = |i: usize| display(&arg(i));
        let result = match (receiver.as_json(), method) {
            (Some(Value::String(s)), "toUpperCase") => Value::String(s.to_uppercase()),
            (Some(Value::String(s)), "toLowerCase") => Value::String(s.to_lowercase()),
            (Some(Value::String(s)), "trim") => Value::String(s.trim().to_string()),
            (Some(Value::String(s)), "includes") => Value::Bool(s.contains(&text_arg(0))),
            (Some(Value::String(s)), "startsWith") => Value::Bool(s.starts_with(&text_arg(0))),
            (Some(Value::String(s)), "endsWith") => Value::Bool(s.ends_with(&text_arg(0))),
            (Some(Value::String(s)), "indexOf") => match s.find(&text_arg(0)) {
                Some(byte) => Value::from(s[..byte].chars().count()),
                None => Value::from(-1),
            },
            (Some(Value::String(s)), "split") => {
                let sep = text_arg(0);
                let parts: Vec<Value> = if sep.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(sep.as_str())
                        .map(|part| Value::String(part.to_string()))
                        .collect()
                };
                Value::Array(parts)
            }
            (Some(Value::Array(items)), "join") => {
                let sep = match arg(0) {
                    JsValue::Undefined => ",".to_string(),
                    sep => display(&sep),
                };
                Value::String(
                    items
                        .iter()
                        .map(|item| display(&JsValue::borrowed(item)))
                        .collect::<Vec<_>>()
                        .join(&sep),
                )
            }
            (Some(Value::Array(items)), "includes") => {
                let needle = arg(0);
                Value::Bool(
                    items
                        .iter()
                        .any(|item| strict_equals(&JsValue::borrowed(item), &needle)),
                )
            }
            (Some(Value::Array(items)), "indexOf") => {
                let needle = arg(0);
                match items
                    .iter()
                    .position(|item| strict_equals(&JsValue::borrowed(item), &needle))
                {
                    Some(i) => Value::from(i),
                    None => Value::from(-1),
                }
            }
            (Some(Value::Number(n)), "toFixed") => {
                let digits = to_number(&arg(0));
                let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
                Value::String(format!("{:.*}", digits, n.as_f64().unwrap_or(f64::NAN)))
            }
            (None, "toFixed") | (_, "toString") => Value::String(display(&receiver)),
            _ => {
                return Err(self.runtime_error(
                    offset,
                    format!("{}.{} is not a function", target.describe(), method),
                ))
            }
        };
        Ok(JsValue::owned(result))
    }

    /// `target[name]`; reading through `undefined` or `null` is an error in strict mode
    fn property<'v>(
        &self,
        target: JsValue<'v>,
        name: &str,
        offset: usize,
    ) -> Result<JsValue<'v>, RenderError> {
        if target.is_nullish() {
            if self.engine.strict() {
                return Err(RenderError::PropertyOfUndefined {
                    property: name.to_string(),
                    location: self.location(offset),
                });
            }
            return Ok(JsValue::Undefined);
        }
        Ok(member(target, name))
    }

    /// `None` when nothing declares `name`; a declared name may still hold `undefined`
    fn lookup(&self, name: &str) -> Option<JsValue<'_>> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| local == name) {
            return Some(value.view());
        }
        if let Some(value) = self.scope.get(name) {
            return Some(JsValue::borrowed(value));
        }
        if let Some(value) = self.data.get(name) {
            return Some(JsValue::borrowed(value));
        }
        if name == "locals" {
            return Some(self.all_locals());
        }
        None
    }

    /// The `locals` object: the data with any include variables laid over it
    fn all_locals(&self) -> JsValue<'_> {
        if self.scope.is_empty() {
            return JsValue::borrowed(self.data);
        }
        let mut merged = match self.data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        merged.extend(self.scope.clone());
        JsValue::owned(Value::Object(merged))
    }

    fn location(&self, offset: usize) -> Location {
        Location::from_offset(&self.template.source, offset, &self.template.name)
    }

    fn runtime_error(&self, offset: usize, message: impl Into<String>) -> RenderError {
        RenderError::TemplateRuntime {
            message: message.into(),
            location: self.location(offset),
        }
    }
}

/// Operators whose operands are both evaluated
fn apply_binary(op: BinaryOp, left: JsValue<'static>, right: JsValue<'static>) -> JsValue<'static> {
    let boolean = |b: bool| JsValue::owned(Value::Bool(b));
    match op {
        BinaryOp::Or => {
            if truthy(&left) {
                left
            } else {
                right
            }
        }
        BinaryOp::And => {
            if truthy(&left) {
                right
            } else {
                left
            }
        }
        BinaryOp::StrictEq => boolean(strict_equals(&left, &right)),
        BinaryOp::StrictNe => boolean(!strict_equals(&left, &right)),
        BinaryOp::LooseEq => boolean(loose_equals(&left, &right)),
        BinaryOp::LooseNe => boolean(!loose_equals(&left, &right)),
        BinaryOp::Lt => boolean(compare(&left, &right) == Some(Ordering::Less)),
        BinaryOp::Le => boolean(matches!(
            compare(&left, &right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => boolean(compare(&left, &right) == Some(Ordering::Greater)),
        BinaryOp::Ge => boolean(matches!(
            compare(&left, &right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Add => add(&left, &right),
        BinaryOp::Sub => number(to_number(&left) - to_number(&right)),
        BinaryOp::Mul => number(to_number(&left) * to_number(&right)),
        BinaryOp::Div => number(to_number(&left) / to_number(&right)),
        BinaryOp::Rem => number(to_number(&left) % to_number(&right)),
    }
}

/// Property read on a non-nullish value, borrowing from `target` when it is borrowed
fn member<'v>(target: JsValue<'v>, name: &str) -> JsValue<'v> {
    let element = |len: usize| name.parse::<usize>().ok().filter(|i| *i < len);
    match target {
        JsValue::Json(std::borrow::Cow::Borrowed(value)) => match value {
            Value::Object(map) => map.get(name).map_or(JsValue::Undefined, JsValue::borrowed),
            Value::Array(items) if name != "length" => element(items.len())
                .map_or(JsValue::Undefined, move |i| JsValue::borrowed(&items[i])),
            other => derived(other, name),
        },
        JsValue::Json(std::borrow::Cow::Owned(value)) => match value {
            Value::Object(mut map) => map.remove(name).map_or(JsValue::Undefined, JsValue::owned),
            Value::Array(mut items) if name != "length" => element(items.len())
                .map_or(JsValue::Undefined, |i| JsValue::owned(items.swap_remove(i))),
            other => derived(&other, name),
        },
        JsValue::Undefined | JsValue::NonFinite(_) => JsValue::Undefined,
    }
}

/// Properties computed from a value rather than stored in it
fn derived<'v>(value: &Value, name: &str) -> JsValue<'v> {
    match (value, name) {
        (Value::Array(items), "length") => JsValue::owned(Value::from(items.len())),
        (Value::String(s), "length") => JsValue::owned(Value::from(s.chars().count())),
        (Value::String(s), _) => name
            .parse::<usize>()
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map_or(JsValue::Undefined, |c| JsValue::owned(Value::String(c.to_string()))),
        _ => JsValue::Undefined,
    }
}

/// `JSON.stringify(value, null, indent)`; `undefined` stays undefined
fn json_stringify(value: &JsValue<'_>, indent: &JsValue<'_>) -> Option<String> {
    let value = match value {
        JsValue::Undefined => return None,
        JsValue::NonFinite(_) => return Some("null".to_string()),
        JsValue::Json(value) => value,
    };
    let text = if to_number(indent) > 0.0 {
        serde_json::to_string_pretty(value.as_ref())
    } else {
        serde_json::to_string(value.as_ref())
    };
    text.ok()
}
