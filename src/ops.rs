//! Named cell operations for the command line
//!
//! An operation is written `name` or `name=argument`, e.g. `mul=10`,
//! `clamp=0:255`, `brighten=1.2`.

use std::sync::Arc;
use thiserror::Error;

use crate::color::{Color, brighten};
use crate::transform::CellOp;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpError {
    #[error("unknown operation '{0}'")]
    Unknown(String),

    #[error("operation '{0}' needs an argument, e.g. {0}=2")]
    MissingArgument(String),

    #[error("operation '{op}' does not take an argument")]
    UnexpectedArgument { op: String },

    #[error("invalid argument for '{op}': {value}")]
    InvalidArgument { op: String, value: String },
}

fn split(spec: &str) -> (&str, Option<&str>) {
    match spec.trim().split_once('=') {
        Some((name, arg)) => (name.trim(), Some(arg.trim())),
        None => (spec.trim(), None),
    }
}

fn number(op: &str, value: &str) -> Result<f64, OpError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| OpError::InvalidArgument {
            op: op.to_string(),
            value: value.to_string(),
        })
}

fn required<'a>(op: &str, arg: Option<&'a str>) -> Result<&'a str, OpError> {
    arg.ok_or_else(|| OpError::MissingArgument(op.to_string()))
}

fn no_argument(op: &str, arg: Option<&str>) -> Result<(), OpError> {
    match arg {
        Some(_) => Err(OpError::UnexpectedArgument { op: op.to_string() }),
        None => Ok(()),
    }
}

/// Operation on numeric cells: `mul`, `add`, `clamp`, `abs`, `neg`, `round`
pub fn number_op(spec: &str) -> Result<CellOp<f64>, OpError> {
    let (name, arg) = split(spec);
    let op: CellOp<f64> = match name {
        "mul" => {
            let k = number(name, required(name, arg)?)?;
            Arc::new(move |v: &f64| v * k)
        }
        "add" => {
            let k = number(name, required(name, arg)?)?;
            Arc::new(move |v: &f64| v + k)
        }
        "clamp" => {
            let raw = required(name, arg)?;
            let invalid = || OpError::InvalidArgument {
                op: name.to_string(),
                value: raw.to_string(),
            };
            let (lo, hi) = raw.split_once(':').ok_or_else(invalid)?;
            let (lo, hi) = (number(name, lo)?, number(name, hi)?);
            if lo > hi {
                return Err(invalid());
            }
            Arc::new(move |v: &f64| v.clamp(lo, hi))
        }
        "abs" => {
            no_argument(name, arg)?;
            Arc::new(|v: &f64| v.abs())
        }
        "neg" => {
            no_argument(name, arg)?;
            Arc::new(|v: &f64| -v)
        }
        "round" => {
            no_argument(name, arg)?;
            Arc::new(|v: &f64| v.round())
        }
        _ => return Err(OpError::Unknown(name.to_string())),
    };
    Ok(op)
}

/// Operation on colour cells: `brighter`, `darker`, `grayscale`, `invert`, `brighten`
pub fn color_op(spec: &str) -> Result<CellOp<Color>, OpError> {
    let (name, arg) = split(spec);
    let op: CellOp<Color> = match name {
        "brighten" => {
            let factor = number(name, required(name, arg)?)?;
            if factor < 0.0 {
                return Err(OpError::InvalidArgument {
                    op: name.to_string(),
                    value: factor.to_string(),
                });
            }
            Arc::new(brighten(factor))
        }
        "brighter" => {
            no_argument(name, arg)?;
            Arc::new(Color::brighter)
        }
        "darker" => {
            no_argument(name, arg)?;
            Arc::new(Color::darker)
        }
        "grayscale" | "greyscale" => {
            no_argument(name, arg)?;
            Arc::new(Color::grayscale)
        }
        "invert" => {
            no_argument(name, arg)?;
            Arc::new(Color::invert)
        }
        _ => return Err(OpError::Unknown(name.to_string())),
    };
    Ok(op)
}
