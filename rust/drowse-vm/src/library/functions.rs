use super::io::HandleObject;
use super::{arg, Library};
use crate::config::DebugFlags;
use crate::context::Context;
use crate::dispatch;
use crate::profile::format_entry;
use crate::taint::TaintPolicy;
use drowse_core::value::taint::{sanitize_deep, taint_deep};
use drowse_core::{EngineError, Scalar, ScalarValue};

/// A fresh cell of the kind the sigil of `name` calls for.
pub(crate) fn fresh_cell(name: &str) -> Scalar {
    match name.chars().next() {
        Some('@') => Scalar::new_array(),
        Some('%') => Scalar::new_hash(),
        _ => Scalar::null(),
    }
}

/// Names passed to `&local` and `&this`, one per argument or space separated.
fn declared_names(args: &[Scalar]) -> Vec<String> {
    args.iter()
        .flat_map(|a| {
            a.as_string()
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn write_out(ctx: &mut Context, args: &[Scalar], newline: bool) -> Result<Scalar, EngineError> {
    if args.len() > 1 {
        if let Some(handle) = HandleObject::from_scalar(&args[0]) {
            let mut text = arg(args, 1).as_string();
            if newline {
                text.push('\n');
            }
            handle.io().write(&text)?;
            return Ok(Scalar::null());
        }
    }
    let text = arg(args, 0).as_string();
    let console = ctx.console();
    if newline {
        console.print_line(&text);
    } else {
        console.print(&text);
    }
    Ok(Scalar::null())
}

pub(super) fn install(lib: &mut Library<'_>) {
    lib.define("&print", |ctx, args| write_out(ctx, &args, false));
    lib.define("&println", |ctx, args| write_out(ctx, &args, true));

    lib.classified("&readln", TaintPolicy::Tainter, |ctx, args| {
        if let Some(handle) = args.first().and_then(HandleObject::from_scalar) {
            return Ok(handle
                .io()
                .read_line()?
                .map(Scalar::string)
                .unwrap_or_default());
        }
        let prompt = args.first().map(Scalar::as_string).unwrap_or_default();
        Ok(ctx
            .console()
            .read_line(&prompt)?
            .map(Scalar::string)
            .unwrap_or_default())
    });

    lib.define("&warn", |ctx, args| {
        ctx.warn(&arg(&args, 0).as_string());
        Ok(Scalar::null())
    });

    // &debug() reads the level, &debug(level) sets it and returns the old one.
    lib.define("&debug", |ctx, args| {
        let previous = ctx.flags().level() as i64;
        if let Some(level) = args.first() {
            let level = u32::try_from(level.as_int())
                .map_err(|_| EngineError::runtime(format!("invalid debug level {}", level.as_int())))?;
            ctx.set_flags(DebugFlags::from_level(level));
        }
        Ok(Scalar::int(previous))
    });

    lib.define("&profile", |ctx, _| {
        let lines = ctx
            .script()
            .profiler()
            .entries()
            .iter()
            .map(|e| Scalar::string(format_entry(e)))
            .collect();
        Ok(Scalar::array_of(lines))
    });

    lib.define("&getStackTrace", |ctx, _| {
        let frames = ctx
            .last_trace()
            .iter()
            .map(|f| Scalar::string(f.to_string()))
            .collect();
        Ok(Scalar::array_of(frames))
    });

    // &import("pkg.Name") makes Name reach pkg.Name; &import("Name", "Alias")
    lib.define("&import", |ctx, args| {
        let full = arg(&args, 0).as_string();
        let short = match args.get(1) {
            Some(alias) => alias.as_string(),
            None => full.rsplit('.').next().unwrap_or_default().to_string(),
        };
        if ctx.hosts().lookup(&full).is_none() {
            return ctx.soft_fault(&format!("&import: class {} not found", full));
        }
        if short != full {
            ctx.hosts().alias(&short, &full);
        }
        Ok(Scalar::string(short))
    });

    lib.define("&typeOf", |_, args| {
        let value = arg(&args, 0).get();
        Ok(Scalar::string(match value.inner() {
            ScalarValue::Object(object) => object.type_name().to_string(),
            other => other.type_name().to_string(),
        }))
    });

    lib.define("&int", |_, args| Ok(Scalar::int(arg(&args, 0).as_int())));
    lib.define("&double", |_, args| Ok(Scalar::float(arg(&args, 0).as_float())));

    lib.define("&local", |ctx, args| {
        for name in declared_names(&args) {
            ctx.scope.declare_local(&name, fresh_cell(&name));
        }
        Ok(Scalar::null())
    });

    lib.define("&this", |ctx, args| {
        for name in declared_names(&args) {
            if !ctx.scope.declare_this(&name, fresh_cell(&name)) {
                return Err(EngineError::runtime(format!(
                    "&this: {} declared outside a closure",
                    name
                )));
            }
        }
        Ok(Scalar::null())
    });

    // &invoke(&closure, @args, message)
    lib.define("&invoke", |ctx, args| {
        let target = arg(&args, 0);
        let call_args = match arg(&args, 1).as_array() {
            Some(list) => list.snapshot()?,
            None => Vec::new(),
        };
        let message = args.get(2).map(Scalar::as_string);
        dispatch::call_scalar(ctx, &target, message.as_deref(), call_args)
    });

    lib.define("&taint", |_, args| {
        let value = arg(&args, 0).copy();
        taint_deep(&value);
        Ok(value)
    });

    lib.classified("&untaint", TaintPolicy::Sanitizer, |_, args| {
        let value = arg(&args, 0).copy();
        sanitize_deep(&value);
        Ok(value)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_names_split_on_whitespace() {
        let names = declared_names(&[Scalar::string("$a @b"), Scalar::string("%c")]);
        assert_eq!(names, vec!["$a", "@b", "%c"]);
    }

    #[test]
    fn test_fresh_cell_by_sigil() {
        assert!(fresh_cell("@list").as_array().is_some());
        assert!(fresh_cell("%map").as_hash().is_some());
        assert!(fresh_cell("$x").is_null());
    }
}
