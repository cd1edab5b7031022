use anyhow::{bail, Result};
use atomic_float::AtomicF64;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError, RwLock};

use crate::common::{finite_or_zero, ControlState, NumInterval};
use crate::numeric_setting::{NumericSetting, SettingDetails};

/// Device facing end of a binding: the backend stores, bindings load.
#[derive(Debug)]
pub struct InputCell {
    name: String,
    value: AtomicF64,
}

impl InputCell {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            value: AtomicF64::new(0.0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self, value: ControlState) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> ControlState {
        self.value.load(Ordering::Relaxed)
    }
}

/// Binding expression over input cells.
///
/// Built once when a binding changes, evaluated on every poll without allocating.
#[derive(Debug, Clone)]
pub enum Expression {
    Input(Arc<InputCell>),
    /// `1 - x`, with `x` clamped to `[0, 1]` first.
    Not(Box<Expression>),
    Scale(Box<Expression>, ControlState),
    Sum(Vec<Expression>),
    /// Either input pressed.
    Max(Vec<Expression>),
    /// Both inputs pressed.
    Min(Vec<Expression>),
}

impl Expression {
    pub fn value(&self) -> ControlState {
        match self {
            Expression::Input(cell) => cell.get(),
            Expression::Not(inner) => 1.0 - inner.value().clamp(0.0, 1.0),
            Expression::Scale(inner, factor) => inner.value() * factor,
            Expression::Sum(terms) => terms.iter().map(Expression::value).sum(),
            Expression::Max(terms) => terms
                .iter()
                .map(Expression::value)
                .reduce(ControlState::max)
                .unwrap_or(0.0),
            Expression::Min(terms) => terms
                .iter()
                .map(Expression::value)
                .reduce(ControlState::min)
                .unwrap_or(0.0),
        }
    }

    /// Parses the textual binding form.
    ///
    /// Grammar, loosest binding first: `a | b` (max), `a & b` (min), `a + b` (sum),
    /// then factors: `0.5 * x`, `!x`, `(x)` and input names. `resolve` maps an
    /// input name to its cell.
    pub fn parse<F>(text: &str, resolve: F) -> Result<Expression>
    where
        F: Fn(&str) -> Option<Arc<InputCell>>,
    {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
            resolve: &resolve,
        };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            bail!("Unexpected '{token}' in binding expression '{text}'");
        }
        Ok(expr)
    }

    /// Visits every input cell the expression reads, repeats included.
    pub fn for_each_input<'a>(&'a self, visit: &mut impl FnMut(&'a InputCell)) {
        match self {
            Expression::Input(cell) => visit(cell.as_ref()),
            Expression::Not(inner) | Expression::Scale(inner, _) => inner.for_each_input(visit),
            Expression::Sum(terms) | Expression::Max(terms) | Expression::Min(terms) => {
                for term in terms {
                    term.for_each_input(visit);
                }
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, terms: &[Expression], op: &str| {
            write!(f, "(")?;
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{term}")?;
            }
            write!(f, ")")
        };
        match self {
            Expression::Input(cell) => write!(f, "{}", cell.name()),
            Expression::Not(inner) => write!(f, "!{inner}"),
            Expression::Scale(inner, factor) => write!(f, "{factor} * {inner}"),
            Expression::Sum(terms) => join(f, terms, "+"),
            Expression::Max(terms) => join(f, terms, "|"),
            Expression::Min(terms) => join(f, terms, "&"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Number(ControlState),
    Op(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => write!(f, "{name}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Op(c) => write!(f, "{c}"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if "|&+*!()".contains(c) {
            tokens.push(Token::Op(c));
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut end = start;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let literal = &text[start..end];
            match literal.parse::<ControlState>() {
                Ok(n) => tokens.push(Token::Number(n)),
                Err(_) => bail!("Invalid number '{literal}' in binding expression '{text}'"),
            }
        } else if c.is_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' || d == '.' || d == '-' {
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Name(text[start..end].to_string()));
        } else {
            bail!("Unexpected character '{c}' in binding expression '{text}'");
        }
    }
    if tokens.is_empty() {
        bail!("Empty binding expression");
    }
    Ok(tokens)
}

/// Deepest accepted nesting of parentheses, `!` and `k *` prefixes.
const MAX_NESTING: usize = 64;

struct Parser<'t, F> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
    resolve: &'t F,
}

impl<F> Parser<'_, F>
where
    F: Fn(&str) -> Option<Arc<InputCell>>,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, op: char) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Result<Expression>) -> Result<Expression> {
        if self.depth >= MAX_NESTING {
            bail!("Binding expression nested too deeply (limit {MAX_NESTING})");
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_binary(
        &mut self,
        op: char,
        operand: fn(&mut Self) -> Result<Expression>,
        combine: fn(Vec<Expression>) -> Expression,
    ) -> Result<Expression> {
        let mut terms = vec![operand(self)?];
        while self.eat(op) {
            terms.push(operand(self)?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            combine(terms)
        })
    }

    fn parse_or(&mut self) -> Result<Expression> {
        self.parse_binary('|', Self::parse_and, Expression::Max)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        self.parse_binary('&', Self::parse_sum, Expression::Min)
    }

    fn parse_sum(&mut self) -> Result<Expression> {
        self.parse_binary('+', Self::parse_factor, Expression::Sum)
    }

    fn parse_factor(&mut self) -> Result<Expression> {
        match self.next() {
            Some(Token::Number(factor)) => {
                if !self.eat('*') {
                    bail!("Expected '*' after factor {factor}");
                }
                let inner = self.nested(Self::parse_factor)?;
                Ok(Expression::Scale(Box::new(inner), factor))
            }
            Some(Token::Op('!')) => Ok(Expression::Not(Box::new(
                self.nested(Self::parse_factor)?,
            ))),
            Some(Token::Op('(')) => {
                let inner = self.nested(Self::parse_or)?;
                if !self.eat(')') {
                    bail!("Missing ')' in binding expression");
                }
                Ok(inner)
            }
            Some(Token::Name(name)) => match (self.resolve)(&name) {
                Some(cell) => Ok(Expression::Input(cell)),
                None => bail!("Unknown input '{name}'"),
            },
            Some(token) => bail!("Unexpected '{token}' in binding expression"),
            None => bail!("Binding expression ends unexpectedly"),
        }
    }
}

/// One bound control slot of a group.
///
/// Reads go through the current binding on every call; nothing is cached
/// between polls. An unbound reference reads 0.
#[derive(Debug)]
pub struct ControlReference {
    binding: RwLock<Option<Expression>>,
    range: NumericSetting,
    output_range: NumInterval<ControlState>,
}

impl ControlReference {
    pub fn new(output_range: NumInterval<ControlState>) -> Self {
        Self {
            binding: RwLock::new(None),
            range: NumericSetting::new(
                "range",
                SettingDetails::new("Range", "×", "Multiplier applied to the bound input."),
                1.0,
                0.0,
                5.0,
            ),
            output_range,
        }
    }

    /// Current reading, multiplied by the range setting and clamped to the role's range.
    pub fn state(&self) -> ControlState {
        let raw = self
            .binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0.0, Expression::value);
        self.output_range
            .clamp(finite_or_zero(raw * self.range.value()))
    }

    pub fn bind(&self, expression: Expression) {
        *self.binding.write().unwrap_or_else(PoisonError::into_inner) = Some(expression);
    }

    pub fn unbind(&self) {
        *self.binding.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_bound(&self) -> bool {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn expression_text(&self) -> Option<String> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Expression::to_string)
    }

    pub fn range(&self) -> &NumericSetting {
        &self.range
    }

    pub fn output_range(&self) -> NumInterval<ControlState> {
        self.output_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{SYMM_UNIT_INTERVAL, UNIT_INTERVAL};
    use std::collections::HashMap;

    struct Inputs(HashMap<String, Arc<InputCell>>);

    impl Inputs {
        fn new(names: &[&str]) -> Self {
            Self(
                names
                    .iter()
                    .map(|n| (n.to_string(), InputCell::new(n)))
                    .collect(),
            )
        }

        fn set(&self, name: &str, value: f64) {
            self.0[name].set(value);
        }

        fn parse(&self, text: &str) -> Result<Expression> {
            Expression::parse(text, |name| self.0.get(name).cloned())
        }
    }

    #[test]
    fn test_unbound_reads_zero() {
        let reference = ControlReference::new(UNIT_INTERVAL);
        assert!(!reference.is_bound());
        assert_eq!(reference.state(), 0.0);
        assert_eq!(reference.expression_text(), None);
    }

    #[test]
    fn test_single_input_binding() {
        let inputs = Inputs::new(&["key_w"]);
        let reference = ControlReference::new(UNIT_INTERVAL);
        reference.bind(inputs.parse("key_w").unwrap());
        assert_eq!(reference.state(), 0.0);
        inputs.set("key_w", 1.0);
        assert_eq!(reference.state(), 1.0);
        inputs.set("key_w", 0.25);
        assert_eq!(reference.state(), 0.25, "state must not be cached");
    }

    #[test]
    fn test_range_and_output_clamp() {
        let inputs = Inputs::new(&["trigger", "axis"]);
        let reference = ControlReference::new(UNIT_INTERVAL);
        reference.bind(inputs.parse("trigger").unwrap());
        inputs.set("trigger", 0.4);
        reference.range().set_value(2.0);
        assert!((reference.state() - 0.8).abs() < 1e-12);
        reference.range().set_value(5.0);
        assert_eq!(reference.state(), 1.0);

        inputs.set("axis", -0.7);
        let bipolar = ControlReference::new(SYMM_UNIT_INTERVAL);
        bipolar.bind(inputs.parse("axis").unwrap());
        assert_eq!(bipolar.state(), -0.7);
        let unipolar = ControlReference::new(UNIT_INTERVAL);
        unipolar.bind(inputs.parse("axis").unwrap());
        assert_eq!(unipolar.state(), 0.0);
    }

    #[test]
    fn test_non_finite_input_reads_zero() {
        let inputs = Inputs::new(&["broken"]);
        let reference = ControlReference::new(UNIT_INTERVAL);
        reference.bind(inputs.parse("broken").unwrap());
        inputs.set("broken", f64::NAN);
        assert_eq!(reference.state(), 0.0);
    }

    #[test]
    fn test_rebind_and_unbind() {
        let inputs = Inputs::new(&["a", "b"]);
        inputs.set("a", 0.2);
        inputs.set("b", 0.9);
        let reference = ControlReference::new(UNIT_INTERVAL);
        reference.bind(inputs.parse("a").unwrap());
        assert_eq!(reference.state(), 0.2);
        reference.bind(inputs.parse("b").unwrap());
        assert_eq!(reference.state(), 0.9);
        reference.unbind();
        assert_eq!(reference.state(), 0.0);
    }

    #[test]
    fn test_expression_operators() {
        let inputs = Inputs::new(&["a", "b", "c"]);
        inputs.set("a", 0.2);
        inputs.set("b", 0.7);
        inputs.set("c", 1.0);

        let eval = |text: &str| inputs.parse(text).unwrap().value();
        assert_eq!(eval("a | b"), 0.7);
        assert_eq!(eval("a & b"), 0.2);
        assert!((eval("a + b") - 0.9).abs() < 1e-12);
        assert!((eval("!a") - 0.8).abs() < 1e-12);
        assert!((eval("0.5 * c") - 0.5).abs() < 1e-12);
        assert!((eval("c & !a") - 0.8).abs() < 1e-12);
        // '+' binds tighter than '|'.
        assert!((eval("a + b | c") - 1.0).abs() < 1e-12);
        assert!((eval("0.5 * (a + b)") - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_expression_display() {
        let inputs = Inputs::new(&["pad_up", "stick_up", "shift"]);
        let expr = inputs.parse("pad_up | 0.5 * stick_up & !shift").unwrap();
        assert_eq!(expr.to_string(), "(pad_up | (0.5 * stick_up & !shift))");
    }

    #[test]
    fn test_expression_inputs() {
        let inputs = Inputs::new(&["a", "b"]);
        let expr = inputs.parse("a | (b & a)").unwrap();
        let mut names = Vec::new();
        expr.for_each_input(&mut |cell| names.push(cell.name().to_string()));
        assert_eq!(names, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_expression_errors() {
        let inputs = Inputs::new(&["a"]);
        assert!(inputs.parse("").is_err());
        assert!(inputs.parse("missing").is_err());
        assert!(inputs.parse("a |").is_err());
        assert!(inputs.parse("(a").is_err());
        assert!(inputs.parse("a)").is_err());
        assert!(inputs.parse("0.5 a").is_err());
        assert!(inputs.parse("a $ a").is_err());
        assert!(inputs.parse("1.2.3 * a").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let inputs = Inputs::new(&["a"]);
        let deep = format!("{}a{}", "(".repeat(200_000), ")".repeat(200_000));
        let err = inputs.parse(&deep).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"), "{err}");
        assert!(inputs.parse(&format!("{}a", "!".repeat(200_000))).is_err());
        assert!(inputs
            .parse(&format!("{}a", "0.5 * ".repeat(200_000)))
            .is_err());

        let shallow = format!("{}a{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(inputs.parse(&shallow).unwrap().to_string(), "a");
        assert!(inputs.parse(&format!("{}!a", "!".repeat(MAX_NESTING - 1))).is_ok());
    }
}
