//! 代码单元注册表：类型、方法及其标记。
//!
//! 用显式构建的注册表代替运行时反射，fixture 的实例化交给构建时提供的工厂函数。

pub mod builder;
pub mod invoke;
pub mod types;

// Re-export commonly used types
pub use builder::{ModuleBuilder, TypeBuilder};
pub use invoke::{Failure, FailureKind, IntoOutcome, InvocationError, catch_failure};
pub use types::{
    Factory, Instance, Marker, MarkerSet, MethodDef, MethodOrigin, Module, TypeDef, TypeKind,
    Visibility,
};
