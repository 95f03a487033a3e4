//! Interior-mutable storage behind declared properties
//!
//! Objects are shared as `Arc<dyn Object>`, so a property setter only ever
//! sees `&self`. `#[derive(MetaClass)]` reads and writes property fields
//! through this trait.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::variant::VariantValue;

/// A field that stores one property value
pub trait PropertyCell: Send + Sync {
    type Value: VariantValue + Clone + PartialEq;

    fn get(&self) -> Self::Value;

    /// Store `value`; true if it differs from the previous value
    fn replace(&self, value: Self::Value) -> bool;
}

impl<T> PropertyCell for RwLock<T>
where
    T: VariantValue + Clone + PartialEq,
{
    type Value = T;

    fn get(&self) -> T {
        self.read().clone()
    }

    fn replace(&self, value: T) -> bool {
        let mut current = self.write();
        if *current == value {
            return false;
        }
        *current = value;
        true
    }
}

impl<T> PropertyCell for Mutex<T>
where
    T: VariantValue + Clone + PartialEq,
{
    type Value = T;

    fn get(&self) -> T {
        self.lock().clone()
    }

    fn replace(&self, value: T) -> bool {
        let mut current = self.lock();
        if *current == value {
            return false;
        }
        *current = value;
        true
    }
}

macro_rules! impl_atomic_cell {
    ($($atomic:ty => $value:ty),* $(,)?) => {
        $(
            impl PropertyCell for $atomic {
                type Value = $value;

                fn get(&self) -> $value {
                    self.load(Ordering::SeqCst)
                }

                fn replace(&self, value: $value) -> bool {
                    self.swap(value, Ordering::SeqCst) != value
                }
            }
        )*
    };
}

impl_atomic_cell! {
    AtomicBool => bool,
    AtomicI32 => i32,
    AtomicU32 => u32,
    AtomicI64 => i64,
    AtomicU64 => u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_reports_change() {
        let cell = RwLock::new(String::from("a"));
        assert!(!cell.replace("a".to_string()));
        assert!(cell.replace("b".to_string()));
        assert_eq!(PropertyCell::get(&cell), "b");

        let flag = AtomicBool::new(false);
        assert!(flag.replace(true));
        assert!(!flag.replace(true));
    }
}
