//! Iterator-position properties.
//!
//! These are values that depend on where the renderer is inside the current
//! loop (`$First`, `$EvenOdd`, `$Pos`, ...). Providers are stateless: the
//! resolver passes the current [`IteratorPosition`] with every lookup, and
//! outside a loop the position is `(0, 1)`, i.e. a list of one element.

use crate::model::Value;

/// Index and total of the active iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IteratorPosition {
    pub index: usize,
    pub total: usize,
}

impl IteratorPosition {
    pub const fn new(index: usize, total: usize) -> Self {
        Self {
            index,
            total,
        }
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.total
    }
}

impl Default for IteratorPosition {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

/// A property name a provider exposes, with its declared casting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDeclaration {
    pub name: String,
    pub casting: Option<String>,
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, casting: Option<&str>) -> Self {
        Self {
            name: name.into(),
            casting: casting.map(str::to_string),
        }
    }
}

/// Supplies values that depend on the iteration position.
pub trait IteratorPropertyProvider: Send + Sync {
    /// Names this provider answers for.
    fn iterator_properties(&self) -> Vec<PropertyDeclaration>;

    /// Value of `name` at `position`. `None` renders as an empty value.
    fn iterator_value(
        &self,
        name: &str,
        position: IteratorPosition,
        args: &[serde_json::Value],
    ) -> Option<Value>;
}

/// The standard loop helpers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicIteratorSupport;

const BOOLEAN: Option<&str> = Some("Boolean");
const INT: Option<&str> = Some("Int");
const TEXT: Option<&str> = Some("Text");

fn int_arg(args: &[serde_json::Value], index: usize, default: i64) -> i64 {
    match args.get(index) {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(default),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

impl BasicIteratorSupport {
    /// `index + start`, or `None` on overflow.
    fn offset(position: IteratorPosition, start: i64) -> Option<i64> {
        i64::try_from(position.index).ok()?.checked_add(start)
    }

    fn odd(position: IteratorPosition, start: i64) -> Option<bool> {
        Self::offset(position, start).map(|pos| pos % 2 != 0)
    }

    fn modulus(position: IteratorPosition, modulus: i64, start: i64) -> Option<i64> {
        if modulus == 0 {
            return Some(0);
        }
        Self::offset(position, start)?.checked_rem_euclid(modulus)
    }

    fn from_end(position: IteratorPosition, offset: i64) -> Option<i64> {
        let total = i64::try_from(position.total).ok()?;
        let index = i64::try_from(position.index).ok()?;
        total.checked_sub(index)?.checked_sub(1)?.checked_add(offset)
    }
}

impl IteratorPropertyProvider for BasicIteratorSupport {
    fn iterator_properties(&self) -> Vec<PropertyDeclaration> {
        [
            ("First", BOOLEAN),
            ("Last", BOOLEAN),
            ("FirstLast", TEXT),
            ("Middle", BOOLEAN),
            ("MiddleString", TEXT),
            ("Even", BOOLEAN),
            ("Odd", BOOLEAN),
            ("EvenOdd", TEXT),
            ("Pos", INT),
            ("FromEnd", INT),
            ("TotalItems", INT),
            ("Modulus", INT),
            ("MultipleOf", BOOLEAN),
        ]
        .into_iter()
        .map(|(name, casting)| PropertyDeclaration::new(name, casting))
        .collect()
    }

    fn iterator_value(
        &self,
        name: &str,
        position: IteratorPosition,
        args: &[serde_json::Value],
    ) -> Option<Value> {
        let first = position.is_first();
        let last = position.is_last();
        let value = match name {
            "First" => Value::from(first),
            "Last" => Value::from(last),
            "FirstLast" => Value::from(match (first, last) {
                (true, true) => "first last",
                (true, false) => "first",
                (false, true) => "last",
                (false, false) => "",
            }),
            "Middle" => Value::from(!first && !last),
            "MiddleString" => Value::from(if !first && !last { "middle" } else { "" }),
            "Even" => Value::from(!Self::odd(position, int_arg(args, 0, 1))?),
            "Odd" => Value::from(Self::odd(position, int_arg(args, 0, 1))?),
            "EvenOdd" => Value::from(if Self::odd(position, int_arg(args, 0, 1))? {
                "odd"
            } else {
                "even"
            }),
            "Pos" => Value::from(Self::offset(position, int_arg(args, 0, 1))?),
            "FromEnd" => Value::from(Self::from_end(position, int_arg(args, 0, 1))?),
            "TotalItems" => Value::from(i64::try_from(position.total).ok()?),
            "Modulus" => Value::from(Self::modulus(
                position,
                int_arg(args, 0, 1),
                int_arg(args, 1, 1),
            )?),
            "MultipleOf" => {
                let factor = int_arg(args, 0, 1);
                Value::from(factor != 0 && Self::modulus(position, factor, int_arg(args, 1, 1))? == 0)
            }
            _ => return None,
        };
        Some(value)
    }
}
