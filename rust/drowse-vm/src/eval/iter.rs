//! `foreach` iterators.
//!
//! Sequences are walked by position so elements appended during the loop
//! are visited. Maps iterate over a key snapshot taken at creation and skip
//! keys removed since. A closure source is called until it returns the empty
//! value, which makes a `yield`ing closure a generator.

use crate::context::Context;
use crate::dispatch;
use drowse_core::value::{ArrayRef, MapRef};
use drowse_core::{EngineError, Scalar, ScalarValue};

pub(crate) struct IterState {
    key: Option<String>,
    value: String,
    source: IterSource,
    position: usize,
}

enum IterSource {
    Array(ArrayRef),
    Hash { map: MapRef, keys: Vec<String> },
    Generator(Scalar),
    Empty,
}

enum Next {
    Item { key: Scalar, value: Scalar, advance: usize },
    Call(Scalar),
    Done,
}

impl IterSource {
    fn next(&self, position: usize) -> Result<Next, EngineError> {
        match self {
            IterSource::Array(array) => Ok(match array.get_existing(position as i64)? {
                Some(value) => Next::Item {
                    key: Scalar::int(position as i64),
                    value,
                    advance: 1,
                },
                None => Next::Done,
            }),
            IterSource::Hash { map, keys } => {
                for (offset, key) in keys.iter().enumerate().skip(position) {
                    if let Some(value) = map.peek(key).filter(|v| !v.is_null()) {
                        return Ok(Next::Item {
                            key: Scalar::string(key.clone()),
                            value,
                            advance: offset + 1 - position,
                        });
                    }
                }
                Ok(Next::Done)
            }
            IterSource::Generator(closure) => Ok(Next::Call(closure.clone())),
            IterSource::Empty => Ok(Next::Done),
        }
    }
}

impl Context {
    pub(crate) fn iter_create(&mut self, key: Option<&str>, value: &str) -> Result<(), EngineError> {
        let source = self.pop_value();
        self.kill_frame();
        let held = source.get();
        let source = match held.inner() {
            ScalarValue::Array(array) => IterSource::Array(array.clone()),
            ScalarValue::Hash(map) => IterSource::Hash {
                map: map.clone(),
                keys: map.keys(),
            },
            ScalarValue::Closure(_) => IterSource::Generator(source.clone()),
            ScalarValue::Null => IterSource::Empty,
            other => {
                return Err(EngineError::bad_cast(format!(
                    "cannot iterate over a value of type {}",
                    other.type_name()
                )))
            }
        };
        self.iterators.push(IterState {
            key: key.map(str::to_string),
            value: value.to_string(),
            source,
            position: 0,
        });
        Ok(())
    }

    /// Advance the innermost iterator and bind its variables.
    pub(crate) fn iter_next(&mut self) -> Result<bool, EngineError> {
        let (next, position) = {
            let state = self
                .iterators
                .last()
                .ok_or_else(|| EngineError::runtime("no active iterator"))?;
            (state.source.next(state.position)?, state.position)
        };
        let next = match next {
            Next::Call(closure) => {
                let value = dispatch::call_scalar(self, &closure, None, Vec::new())?;
                if value.is_null() {
                    Next::Done
                } else {
                    Next::Item {
                        key: Scalar::int(position as i64),
                        value,
                        advance: 1,
                    }
                }
            }
            other => other,
        };
        match next {
            Next::Item {
                key,
                value,
                advance,
            } => {
                let (key_name, value_name) = match self.iterators.last_mut() {
                    Some(state) => {
                        state.position += advance;
                        (state.key.clone(), state.value.clone())
                    }
                    None => return Ok(false),
                };
                if let Some(key_name) = key_name {
                    self.scope.bind(&key_name, key);
                }
                self.scope.bind(&value_name, value);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
