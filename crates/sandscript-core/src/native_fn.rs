//! Native function storage.
//!
//! Host integrations attach a [`NativeFn`] to whitelisted constructors, methods and
//! field accessors. The catalog never calls them; the dispatch runtime and the
//! reference evaluator do.
//!
//! Calling convention: instance members receive the receiver as `args[0]`,
//! followed by the declared parameters. Static members and constructors receive
//! only the declared parameters.

use std::fmt;
use std::sync::Arc;

use crate::{ScriptFault, Value};

/// Host code callable from a script.
pub trait NativeCallable {
    /// Call this function with the given arguments.
    fn call(&self, args: &[Value]) -> Result<Value, ScriptFault>;
}

impl<F> NativeCallable for F
where
    F: Fn(&[Value]) -> Result<Value, ScriptFault>,
{
    fn call(&self, args: &[Value]) -> Result<Value, ScriptFault> {
        (self)(args)
    }
}

/// Shared handle to a [`NativeCallable`], cloned into every catalog entry that binds it.
///
/// The inner callable is wrapped in an `Arc` so descriptors copied down the
/// inheritance chain share one implementation.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    /// Create a new NativeFn from a callable.
    pub fn new<F>(f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Call this native function.
    pub fn call(&self, args: &[Value]) -> Result<Value, ScriptFault> {
        self.inner.call(args)
    }

    /// Whether both handles share the same underlying callable.
    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

/// Fetch argument `index` or fail with an unrecoverable fault.
///
/// Arity is checked at compile time; a short argument list means a host
/// integration called a native with the wrong convention.
pub fn arg(args: &[Value], index: usize) -> Result<&Value, ScriptFault> {
    args.get(index).ok_or_else(|| {
        ScriptFault::unrecoverable(format!(
            "native call expected argument {index}, got {} argument(s)",
            args.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_closure() {
        let add = NativeFn::new(|args: &[Value]| {
            Ok(Value::Int(arg(args, 0)?.as_i64()? as i32 + arg(args, 1)?.as_i64()? as i32))
        });
        assert_eq!(
            add.call(&[Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn missing_argument_is_unrecoverable() {
        let first = NativeFn::new(|args: &[Value]| arg(args, 0).cloned());
        let err = first.call(&[]).unwrap_err();
        assert!(matches!(err, ScriptFault::Unrecoverable { .. }));
    }

    #[test]
    fn clones_share_callable() {
        let f = NativeFn::new(|_: &[Value]| Ok(Value::Null));
        let g = f.clone();
        let h = NativeFn::new(|_: &[Value]| Ok(Value::Null));
        assert!(f.ptr_eq(&g));
        assert!(!f.ptr_eq(&h));
    }
}
