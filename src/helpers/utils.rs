// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::number::Number;
use crate::value::Value;

use anyhow::{bail, Result};

pub fn ensure_args_count(fcn: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        if expected == 1 {
            bail!("`{fcn}` expects 1 argument, got {}", args.len())
        } else {
            bail!("`{fcn}` expects {expected} arguments, got {}", args.len())
        }
    }
    Ok(())
}

pub fn ensure_min_args(fcn: &str, args: &[Value], min: usize) -> Result<()> {
    if args.len() < min {
        bail!("`{fcn}` expects at least {min} argument(s), got {}", args.len())
    }
    Ok(())
}

pub fn ensure_numeric(fcn: &str, idx: usize, v: &Value) -> Result<Number> {
    Ok(match v {
        Value::Number(n) => *n,
        _ => bail!(
            "`{fcn}` expects numeric argument {}. Got `{v}` instead",
            idx + 1
        ),
    })
}

/// Numeric result with integral floats folded back into integers.
pub fn number_value(n: Number) -> Value {
    Value::Number(n.normalize())
}
