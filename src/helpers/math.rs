// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::helpers::utils::{ensure_args_count, ensure_min_args, ensure_numeric, number_value};
use crate::helpers::{Hash, HelperDefinition, HelperSet};
use crate::number::Number;
use crate::schema::Schema;
use crate::value::Value;

use anyhow::Result;

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "subtract",
            ArithOp::Mul => "multiply",
            ArithOp::Div => "divide",
            ArithOp::Mod => "mod",
        }
    }
}

pub fn register(set: &mut HelperSet) {
    for (op, description) in [
        (ArithOp::Add, "Sum of two numbers."),
        (ArithOp::Sub, "Difference of two numbers."),
        (ArithOp::Mul, "Product of two numbers."),
        (ArithOp::Div, "Quotient of two numbers; undefined when dividing by zero."),
        (ArithOp::Mod, "Remainder of two numbers; undefined when dividing by zero."),
    ] {
        set.insert(
            HelperDefinition::new(op.name(), Schema::number(), move |args, hash| {
                arithmetic(op, args, hash)
            })
            .with_param("a", Schema::number())
            .with_param("b", Schema::number())
            .with_description(description),
        );
    }

    let unary: [(&'static str, fn(Number) -> Number); 4] =
        [("abs", abs), ("round", round), ("floor", floor), ("ceil", ceil)];
    for (name, f) in unary {
        set.insert(
            HelperDefinition::new(name, Schema::number(), move |args, _| {
                ensure_args_count(name, args, 1)?;
                Ok(number_value(f(ensure_numeric(name, 0, &args[0])?)))
            })
            .with_param("value", Schema::number()),
        );
    }

    set.insert(
        HelperDefinition::new("min", Schema::number(), |args, _| extremum("min", args, true))
            .with_param("value", Schema::number())
            .variadic()
            .with_description("Smallest of one or more numbers."),
    );
    set.insert(
        HelperDefinition::new("max", Schema::number(), |args, _| extremum("max", args, false))
            .with_param("value", Schema::number())
            .variadic()
            .with_description("Largest of one or more numbers."),
    );
}

fn arithmetic(op: ArithOp, args: &[Value], _hash: &Hash) -> Result<Value> {
    let name = op.name();
    ensure_args_count(name, args, 2)?;
    let a = ensure_numeric(name, 0, &args[0])?;
    let b = ensure_numeric(name, 1, &args[1])?;

    if matches!(op, ArithOp::Div | ArithOp::Mod) && b.is_zero() {
        return Ok(Value::Undefined);
    }

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if a.is_integer() && b.is_integer() {
            let exact = match op {
                ArithOp::Add => x.checked_add(y),
                ArithOp::Sub => x.checked_sub(y),
                ArithOp::Mul => x.checked_mul(y),
                ArithOp::Mod => x.checked_rem(y),
                ArithOp::Div if x.checked_rem(y) == Some(0) => x.checked_div(y),
                ArithOp::Div => None,
            };
            if let Some(v) = exact {
                return Ok(Value::from(v));
            }
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    Ok(number_value(Number::from(match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
        ArithOp::Mod => x % y,
    })))
}

fn abs(n: Number) -> Number {
    match n {
        Number::Int(i) => match i.checked_abs() {
            Some(v) => Number::from(v),
            None => Number::from(i.unsigned_abs()),
        },
        Number::UInt(_) => n,
        Number::Float(f) => Number::Float(f.abs()),
    }
}

fn round(n: Number) -> Number {
    match n {
        Number::Float(f) => Number::Float(f.round()),
        n => n,
    }
}

fn floor(n: Number) -> Number {
    match n {
        Number::Float(f) => Number::Float(f.floor()),
        n => n,
    }
}

fn ceil(n: Number) -> Number {
    match n {
        Number::Float(f) => Number::Float(f.ceil()),
        n => n,
    }
}

fn extremum(name: &str, args: &[Value], smallest: bool) -> Result<Value> {
    ensure_min_args(name, args, 1)?;
    let mut best = ensure_numeric(name, 0, &args[0])?;
    for (idx, arg) in args.iter().enumerate().skip(1) {
        let n = ensure_numeric(name, idx, arg)?;
        let better = if smallest { n < best } else { n > best };
        if better {
            best = n;
        }
    }
    Ok(number_value(best))
}
