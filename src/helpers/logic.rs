// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::helpers::utils::{ensure_args_count, ensure_min_args};
use crate::helpers::{HelperDefinition, HelperSet};
use crate::schema::Schema;
use crate::value::Value;

use core::cmp::Ordering;

use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

pub fn register(set: &mut HelperSet) {
    let comparisons: [(&'static str, CmpOp); 6] = [
        ("eq", CmpOp::Eq),
        ("ne", CmpOp::Ne),
        ("lt", CmpOp::Lt),
        ("lte", CmpOp::Le),
        ("gt", CmpOp::Gt),
        ("gte", CmpOp::Ge),
    ];
    for (name, op) in comparisons {
        set.insert(
            HelperDefinition::new(name, Schema::boolean(), move |args, _| {
                ensure_args_count(name, args, 2)?;
                compare(name, op, &args[0], &args[1]).map(Value::Bool)
            })
            .with_param("a", Schema::any())
            .with_param("b", Schema::any()),
        );
    }

    set.insert(
        HelperDefinition::new("and", Schema::boolean(), |args, _| {
            ensure_min_args("and", args, 1)?;
            Ok(Value::Bool(args.iter().all(Value::is_truthy)))
        })
        .with_param("value", Schema::any())
        .variadic(),
    );
    set.insert(
        HelperDefinition::new("or", Schema::boolean(), |args, _| {
            ensure_min_args("or", args, 1)?;
            Ok(Value::Bool(args.iter().any(Value::is_truthy)))
        })
        .with_param("value", Schema::any())
        .variadic(),
    );
    set.insert(
        HelperDefinition::new("not", Schema::boolean(), |args, _| {
            ensure_args_count("not", args, 1)?;
            Ok(Value::Bool(!args[0].is_truthy()))
        })
        .with_param("value", Schema::any()),
    );
    set.insert(
        HelperDefinition::new("default", Schema::any(), |args, _| {
            ensure_args_count("default", args, 2)?;
            Ok(if args[0].is_nullish() {
                args[1].clone()
            } else {
                args[0].clone()
            })
        })
        .with_param("value", Schema::any())
        .with_param("fallback", Schema::any())
        .with_description("The value unless it is null or missing, otherwise the fallback."),
    );
}

fn compare(name: &str, op: CmpOp, a: &Value, b: &Value) -> Result<bool> {
    if let CmpOp::Eq | CmpOp::Ne = op {
        let equal = a == b || (a.is_nullish() && b.is_nullish());
        return Ok(matches!(op, CmpOp::Eq) == equal);
    }
    let ordering = match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => bail!(
            "`{name}` expects two numbers or two strings. Got `{}` and `{}` instead",
            a.type_name(),
            b.type_name()
        ),
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Eq | CmpOp::Ne => false,
    })
}
