use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::module::invoke::{Failure, IntoOutcome, InvocationError, catch_failure};
use crate::module::types::{
    Factory, Instance, Invoker, Marker, MarkerSet, MethodDef, MethodOrigin, Module, TypeDef,
    TypeKind, Visibility,
};

/// 为 Rust 类型 `T` 构建 `TypeDef`
///
/// 方法体签名为 `Fn(&mut T) -> R`，`R` 可以是 `()` 或 `Result<(), E>`。
pub struct TypeBuilder<T> {
    def: TypeDef,
    _type: PhantomData<fn() -> T>,
}

impl<T: 'static> TypeBuilder<T> {
    /// 未带任何标记的普通类型
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            def: TypeDef {
                name: name.into(),
                markers: MarkerSet::new(),
                kind: TypeKind::Concrete,
                factory: None,
                methods: Vec::new(),
            },
            _type: PhantomData,
        }
    }

    /// 带 fixture 标记的类型
    pub fn fixture(name: impl Into<String>) -> Self {
        Self::plain(name).marked(Marker::Fixture)
    }

    pub fn marked(mut self, marker: Marker) -> Self {
        self.def.markers.insert(marker);
        self
    }

    /// 抽象类型，不可实例化
    pub fn abstract_type(mut self) -> Self {
        self.def.kind = TypeKind::Abstract;
        self.def.factory = None;
        self
    }

    /// 静态类型，不可实例化
    pub fn static_type(mut self) -> Self {
        self.def.kind = TypeKind::Static;
        self.def.factory = None;
        self
    }

    /// 指定无参构造函数；构造时的 panic 与 Err 都转成 `Failure`
    pub fn constructor<F, E>(mut self, ctor: F) -> Self
    where
        F: Fn() -> Result<T, E> + 'static,
        E: Into<anyhow::Error>,
    {
        let factory: Factory = Rc::new(move || match catch_failure(&ctor) {
            Ok(Ok(value)) => Ok(Box::new(value) as Instance),
            Ok(Err(err)) => Err(Failure::from_error(err.into())),
            Err(failure) => Err(failure),
        });
        self.def.factory = Some(factory);
        self
    }

    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(|| Ok::<T, anyhow::Error>(T::default()))
    }

    /// 底层接口：添加一个自己声明的方法
    pub fn method<F, R>(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        markers: &[Marker],
        body: F,
    ) -> Self
    where
        F: Fn(&mut T) -> R + 'static,
        R: IntoOutcome,
    {
        let name = name.into();
        let invoker = wrap_body::<T, F, R>(name.clone(), body);
        self.def.methods.push(Rc::new(MethodDef {
            name,
            markers: MarkerSet::from(markers),
            visibility,
            origin: MethodOrigin::Declared,
            invoker,
        }));
        self
    }

    pub fn test<F, R>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut T) -> R + 'static,
        R: IntoOutcome,
    {
        self.method(name, Visibility::Public, &[Marker::Test], body)
    }

    pub fn setup<F, R>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut T) -> R + 'static,
        R: IntoOutcome,
    {
        self.method(name, Visibility::Public, &[Marker::Setup], body)
    }

    pub fn teardown<F, R>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut T) -> R + 'static,
        R: IntoOutcome,
    {
        self.method(name, Visibility::Public, &[Marker::Teardown], body)
    }

    /// 未标记的公开方法
    pub fn helper<F, R>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut T) -> R + 'static,
        R: IntoOutcome,
    {
        self.method(name, Visibility::Public, &[], body)
    }

    /// 继承 `base` 的全部方法。
    ///
    /// 继承来的方法保留原有标记，但来源记为 `Inherited`，
    /// 调用时通过 `project` 拿到内嵌的基类型实例。
    pub fn extends<B: 'static>(mut self, base: &TypeDef, project: fn(&mut T) -> &mut B) -> Self {
        for method in &base.methods {
            let from = match &method.origin {
                MethodOrigin::Declared => base.name.clone(),
                MethodOrigin::Inherited { from } => from.clone(),
            };
            let base_method = Rc::clone(method);
            let name = method.name.clone();
            let invoker: Invoker = Rc::new(move |target: &mut dyn Any| {
                let instance = target
                    .downcast_mut::<T>()
                    .ok_or_else(|| InvocationError::mismatch::<T>(&name))?;
                base_method.invoke(project(instance))
            });

            self.def.methods.push(Rc::new(MethodDef {
                name: method.name.clone(),
                markers: method.markers.clone(),
                visibility: method.visibility,
                origin: MethodOrigin::Inherited { from },
                invoker,
            }));
        }
        self
    }

    pub fn build(self) -> TypeDef {
        self.def
    }
}

fn wrap_body<T, F, R>(name: String, body: F) -> Invoker
where
    T: 'static,
    F: Fn(&mut T) -> R + 'static,
    R: IntoOutcome,
{
    Rc::new(move |target: &mut dyn Any| {
        let instance = target
            .downcast_mut::<T>()
            .ok_or_else(|| InvocationError::mismatch::<T>(&name))?;

        let cause = match catch_failure(|| body(instance).into_outcome()) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => Failure::from_error(err),
            Err(failure) => failure,
        };

        Err(InvocationError::Raised {
            method: name.clone(),
            cause,
        })
    })
}

/// 代码单元构建器
pub struct ModuleBuilder {
    name: String,
    types: Vec<Rc<TypeDef>>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, def: TypeDef) -> Self {
        self.types.push(Rc::new(def));
        self
    }

    pub fn build(self) -> Module {
        Module::new(self.name, self.types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::invoke::FailureKind;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    #[test]
    fn test_method_invocation_mutates_instance() {
        let def = TypeBuilder::<Counter>::fixture("Counter")
            .default_constructor()
            .test("bump", |c: &mut Counter| c.hits += 1)
            .build();

        let mut instance = (def.factory().unwrap())().unwrap();
        def.methods[0].invoke(instance.as_mut()).unwrap();
        def.methods[0].invoke(instance.as_mut()).unwrap();
        assert_eq!(instance.downcast_ref::<Counter>().unwrap().hits, 2);
    }

    #[test]
    fn test_returned_error_becomes_raised_failure() {
        let def = TypeBuilder::<Counter>::fixture("Counter")
            .default_constructor()
            .test("fails", |_: &mut Counter| -> anyhow::Result<()> {
                anyhow::bail!("expected 1, got 2")
            })
            .build();

        let mut instance = (def.factory().unwrap())().unwrap();
        let err = def.methods[0].invoke(instance.as_mut()).unwrap_err();
        let cause = err.inner().unwrap();
        assert_eq!(cause.kind, FailureKind::Error);
        assert_eq!(cause.message, "expected 1, got 2");
    }

    #[test]
    fn test_wrong_target_type_has_no_inner_cause() {
        let def = TypeBuilder::<Counter>::fixture("Counter")
            .test("bump", |c: &mut Counter| c.hits += 1)
            .build();

        let mut other: Box<dyn Any> = Box::new(String::new());
        let err = def.methods[0].invoke(other.as_mut()).unwrap_err();
        assert!(err.inner().is_none());
    }

    #[test]
    fn test_constructor_failure_is_captured() {
        let def = TypeBuilder::<Counter>::fixture("Broken")
            .constructor(|| -> anyhow::Result<Counter> { anyhow::bail!("no database") })
            .build();

        let failure = (def.factory().unwrap())().unwrap_err();
        assert_eq!(failure.message, "no database");
    }

    #[test]
    fn test_abstract_type_is_not_instantiable() {
        let def = TypeBuilder::<Counter>::fixture("Base")
            .default_constructor()
            .abstract_type()
            .build();
        assert!(!def.is_instantiable());
    }

    struct Derived {
        base: Counter,
    }

    #[test]
    fn test_extends_marks_methods_inherited_and_projects() {
        let base = TypeBuilder::<Counter>::fixture("Base")
            .abstract_type()
            .test("bump", |c: &mut Counter| c.hits += 1)
            .build();

        let derived = TypeBuilder::<Derived>::fixture("Derived")
            .constructor(|| {
                Ok::<_, anyhow::Error>(Derived {
                    base: Counter::default(),
                })
            })
            .extends(&base, |d: &mut Derived| &mut d.base)
            .build();

        assert_eq!(derived.methods.len(), 1);
        assert_eq!(
            derived.methods[0].origin,
            MethodOrigin::Inherited {
                from: "Base".to_string()
            }
        );
        assert_eq!(derived.declared_methods().count(), 0);

        let mut instance = (derived.factory().unwrap())().unwrap();
        derived.methods[0].invoke(instance.as_mut()).unwrap();
        assert_eq!(instance.downcast_ref::<Derived>().unwrap().base.hits, 1);
    }
}
