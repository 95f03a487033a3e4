//! Type-erased invokers ("Jars")
//!
//! A Jar captures a typed accessor (`Fn(&T) -> R`, `Fn(&T, V)`, a method of
//! up to six arguments) behind a uniform call contract over [`Variant`] and
//! `&dyn Object`. The adapter performs the downcast, so a call with an
//! object of the wrong class soft-fails instead of reaching the accessor.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::meta::InvokeError;
use crate::object::{downcast_object, Object};
use crate::variant::{Variant, VariantValue};

/// Read-style invoker (property getters and predicates)
pub trait JarRead: Send + Sync {
    /// Call the accessor and wrap the result
    ///
    /// Returns [`Variant::Invalid`] for `void` results, for a missing object
    /// when the accessor needs one, and for an object of the wrong class.
    fn run_v(&self, obj: Option<&dyn Object>) -> Variant;

    /// Whether the accessor can run without an object
    fn is_static(&self) -> bool {
        false
    }
}

impl dyn JarRead {
    /// Typed convenience over [`JarRead::run_v`]
    pub fn run<R: VariantValue>(&self, obj: Option<&dyn Object>) -> Option<R> {
        let value = self.run_v(obj);
        if !value.is_valid() {
            return None;
        }
        R::from_variant(&value)
    }
}

/// Write-style invoker (property setters)
pub trait JarWrite: Send + Sync {
    /// Convert and store `value`; false if the object or value does not fit
    fn run_v(&self, obj: &dyn Object, value: &Variant) -> bool;
}

/// Reset-style invoker
pub trait JarReset: Send + Sync {
    fn run_v(&self, obj: &dyn Object) -> bool;
}

/// Method invoker
pub trait JarInvoke: Send + Sync {
    /// Invoke with type-erased arguments
    ///
    /// Arguments beyond [`JarInvoke::arity`] are ignored, which lets a slot
    /// receive a signal that carries more parameters than it declares.
    fn invoke(&self, obj: Option<&dyn Object>, args: &[Variant]) -> Result<Variant, InvokeError>;

    /// Number of declared parameters
    fn arity(&self) -> usize;

    fn is_static(&self) -> bool {
        false
    }
}

struct ReadJar<T, R, F> {
    f: F,
    _marker: PhantomData<fn(&T) -> R>,
}

impl<T, R, F> JarRead for ReadJar<T, R, F>
where
    T: Object,
    R: VariantValue,
    F: Fn(&T) -> R + Send + Sync,
{
    fn run_v(&self, obj: Option<&dyn Object>) -> Variant {
        match obj.and_then(downcast_object::<T>) {
            Some(target) => (self.f)(target).to_variant(),
            None => Variant::Invalid,
        }
    }
}

struct StaticReadJar<R, F> {
    f: F,
    _marker: PhantomData<fn() -> R>,
}

impl<R, F> JarRead for StaticReadJar<R, F>
where
    R: VariantValue,
    F: Fn() -> R + Send + Sync,
{
    fn run_v(&self, _obj: Option<&dyn Object>) -> Variant {
        (self.f)().to_variant()
    }

    fn is_static(&self) -> bool {
        true
    }
}

struct ConstantJar(Variant);

impl JarRead for ConstantJar {
    fn run_v(&self, _obj: Option<&dyn Object>) -> Variant {
        self.0.clone()
    }

    fn is_static(&self) -> bool {
        true
    }
}

struct WriteJar<T, V, F> {
    f: F,
    _marker: PhantomData<fn(&T, V)>,
}

impl<T, V, F> JarWrite for WriteJar<T, V, F>
where
    T: Object,
    V: VariantValue,
    F: Fn(&T, V) + Send + Sync,
{
    fn run_v(&self, obj: &dyn Object, value: &Variant) -> bool {
        let Some(target) = downcast_object::<T>(obj) else {
            return false;
        };
        let Some(value) = V::from_variant(value) else {
            return false;
        };
        (self.f)(target, value);
        true
    }
}

struct ResetJar<T, F> {
    f: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> JarReset for ResetJar<T, F>
where
    T: Object,
    F: Fn(&T) + Send + Sync,
{
    fn run_v(&self, obj: &dyn Object) -> bool {
        match downcast_object::<T>(obj) {
            Some(target) => {
                (self.f)(target);
                true
            }
            None => false,
        }
    }
}

/// Callable usable as a method of `T` with argument tuple `Args`
///
/// Implemented for `Fn(&T, A0, .., An) -> R` with up to six arguments.
pub trait MethodFn<T, Args>: Send + Sync + 'static {
    const ARITY: usize;

    fn call(&self, target: &T, args: &[Variant]) -> Result<Variant, InvokeError>;
}

/// Callable usable as a static method with argument tuple `Args`
pub trait StaticMethodFn<Args>: Send + Sync + 'static {
    const ARITY: usize;

    fn call(&self, args: &[Variant]) -> Result<Variant, InvokeError>;
}

fn check_arity(expected: usize, args: &[Variant]) -> Result<(), InvokeError> {
    if args.len() < expected {
        return Err(InvokeError::ArgumentCount {
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn convert_arg<A: VariantValue>(args: &[Variant], index: usize) -> Result<A, InvokeError> {
    args.get(index)
        .and_then(A::from_variant)
        .ok_or(InvokeError::ArgumentType {
            index,
            expected: A::type_name(),
        })
}

macro_rules! impl_method_fn {
    ($arity:literal; $($ty:ident $val:ident $idx:literal),*) => {
        impl<T, F, R, $($ty,)*> MethodFn<T, ($($ty,)*)> for F
        where
            F: Fn(&T, $($ty),*) -> R + Send + Sync + 'static,
            R: VariantValue,
            $($ty: VariantValue,)*
        {
            const ARITY: usize = $arity;

            fn call(&self, target: &T, args: &[Variant]) -> Result<Variant, InvokeError> {
                check_arity(Self::ARITY, args)?;
                $(let $val = convert_arg::<$ty>(args, $idx)?;)*
                Ok((self)(target, $($val),*).to_variant())
            }
        }

        impl<F, R, $($ty,)*> StaticMethodFn<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: VariantValue,
            $($ty: VariantValue,)*
        {
            const ARITY: usize = $arity;

            fn call(&self, args: &[Variant]) -> Result<Variant, InvokeError> {
                check_arity(Self::ARITY, args)?;
                $(let $val = convert_arg::<$ty>(args, $idx)?;)*
                Ok((self)($($val),*).to_variant())
            }
        }
    };
}

impl_method_fn!(0;);
impl_method_fn!(1; A0 a0 0);
impl_method_fn!(2; A0 a0 0, A1 a1 1);
impl_method_fn!(3; A0 a0 0, A1 a1 1, A2 a2 2);
impl_method_fn!(4; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);
impl_method_fn!(5; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4);
impl_method_fn!(6; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5);

struct MethodJar<T, Args, F> {
    f: F,
    _marker: PhantomData<fn(&T, Args)>,
}

impl<T, Args, F> JarInvoke for MethodJar<T, Args, F>
where
    T: Object,
    F: MethodFn<T, Args>,
{
    fn invoke(&self, obj: Option<&dyn Object>, args: &[Variant]) -> Result<Variant, InvokeError> {
        let target = obj
            .and_then(downcast_object::<T>)
            .ok_or(InvokeError::WrongObjectType(std::any::type_name::<T>()))?;
        self.f.call(target, args)
    }

    fn arity(&self) -> usize {
        F::ARITY
    }
}

struct StaticMethodJar<Args, F> {
    f: F,
    _marker: PhantomData<fn(Args)>,
}

impl<Args, F> JarInvoke for StaticMethodJar<Args, F>
where
    F: StaticMethodFn<Args>,
{
    fn invoke(&self, _obj: Option<&dyn Object>, args: &[Variant]) -> Result<Variant, InvokeError> {
        self.f.call(args)
    }

    fn arity(&self) -> usize {
        F::ARITY
    }

    fn is_static(&self) -> bool {
        true
    }
}

/// Jar over a getter `Fn(&T) -> R`
pub fn read_jar<T, R, F>(f: F) -> Arc<dyn JarRead>
where
    T: Object,
    R: VariantValue,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    Arc::new(ReadJar {
        f,
        _marker: PhantomData,
    })
}

/// Jar over an object-free accessor `Fn() -> R`
pub fn static_read_jar<R, F>(f: F) -> Arc<dyn JarRead>
where
    R: VariantValue,
    F: Fn() -> R + Send + Sync + 'static,
{
    Arc::new(StaticReadJar {
        f,
        _marker: PhantomData,
    })
}

/// Static Jar that always yields `value`
pub fn constant_jar(value: impl Into<Variant>) -> Arc<dyn JarRead> {
    Arc::new(ConstantJar(value.into()))
}

/// Jar over a setter `Fn(&T, V)`
pub fn write_jar<T, V, F>(f: F) -> Arc<dyn JarWrite>
where
    T: Object,
    V: VariantValue,
    F: Fn(&T, V) + Send + Sync + 'static,
{
    Arc::new(WriteJar {
        f,
        _marker: PhantomData,
    })
}

/// Jar over a reset accessor `Fn(&T)`
pub fn reset_jar<T, F>(f: F) -> Arc<dyn JarReset>
where
    T: Object,
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(ResetJar {
        f,
        _marker: PhantomData,
    })
}

/// Jar over a method `Fn(&T, A0, ..) -> R`
pub fn method_jar<T, Args, F>(f: F) -> Arc<dyn JarInvoke>
where
    T: Object,
    Args: 'static,
    F: MethodFn<T, Args>,
{
    Arc::new(MethodJar {
        f,
        _marker: PhantomData,
    })
}

/// Jar over a static method `Fn(A0, ..) -> R`
pub fn static_method_jar<Args, F>(f: F) -> Arc<dyn JarInvoke>
where
    Args: 'static,
    F: StaticMethodFn<Args>,
{
    Arc::new(StaticMethodJar {
        f,
        _marker: PhantomData,
    })
}
