//! 在 `Module` 上发现 fixture 与测试方法。

use std::any::Any;
use std::rc::Rc;

use tracing::debug;

use crate::module::{
    Factory, Failure, Instance, InvocationError, Marker, MethodDef, Module, TypeDef,
};

/// 已发现方法的句柄
#[derive(Debug, Clone)]
pub struct MethodRef(Rc<MethodDef>);

impl MethodRef {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn invoke(&self, target: &mut dyn Any) -> Result<(), InvocationError> {
        self.0.invoke(target)
    }
}

/// 一个可运行的测试夹具
#[derive(Clone)]
pub struct Fixture {
    pub name: String,
    factory: Factory,
    pub setup: Option<MethodRef>,
    pub teardown: Option<MethodRef>,
    pub tests: Vec<MethodRef>,
}

impl Fixture {
    /// 通过无参构造函数创建实例
    pub fn instantiate(&self) -> Result<Instance, Failure> {
        (self.factory)()
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("name", &self.name)
            .field("setup", &self.setup)
            .field("teardown", &self.teardown)
            .field("tests", &self.tests)
            .finish_non_exhaustive()
    }
}

/// 找出模块中所有可实例化、带 fixture 标记的类型，顺序与注册顺序一致
pub fn discover_fixtures(module: &Module) -> Vec<Fixture> {
    module
        .types()
        .iter()
        .filter_map(|def| {
            if !def.has_marker(Marker::Fixture) {
                return None;
            }
            let Some(factory) = def.factory().filter(|_| def.is_instantiable()) else {
                debug!(fixture = %def.name, kind = ?def.kind, "skipping non-instantiable fixture");
                return None;
            };

            let fixture = Fixture {
                name: def.name.clone(),
                factory: Rc::clone(factory),
                setup: find_setup(def),
                teardown: find_teardown(def),
                tests: discover_test_methods(def),
            };
            debug!(
                fixture = %fixture.name,
                tests = fixture.tests.len(),
                setup = fixture.setup.is_some(),
                teardown = fixture.teardown.is_some(),
                "discovered fixture"
            );
            Some(fixture)
        })
        .collect()
}

/// 直接声明在该类型上的测试方法
pub fn discover_test_methods(def: &TypeDef) -> Vec<MethodRef> {
    marked_methods(def, Marker::Test).collect()
}

/// 第一个 setup 方法
pub fn find_setup(def: &TypeDef) -> Option<MethodRef> {
    first_marked(def, Marker::Setup)
}

/// 第一个 teardown 方法
pub fn find_teardown(def: &TypeDef) -> Option<MethodRef> {
    first_marked(def, Marker::Teardown)
}

fn marked_methods(def: &TypeDef, marker: Marker) -> impl Iterator<Item = MethodRef> + '_ {
    def.declared_methods()
        .filter(move |m| m.has_marker(marker))
        .map(|m| MethodRef(Rc::clone(m)))
}

fn first_marked(def: &TypeDef, marker: Marker) -> Option<MethodRef> {
    let mut found = marked_methods(def, marker);
    let first = found.next();
    if let Some(extra) = found.next() {
        debug!(
            fixture = %def.name,
            %marker,
            ignored = extra.name(),
            "multiple methods carry the same marker, using the first"
        );
    }
    first
}
