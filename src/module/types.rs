use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::module::invoke::{Failure, InvocationError};

/// 类型/方法上的角色标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// 测试夹具类型
    Fixture,
    /// 每个测试前执行
    Setup,
    /// 每个测试后执行（无论成败）
    Teardown,
    /// 测试方法
    Test,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Fixture => write!(f, "fixture"),
            Marker::Setup => write!(f, "setup"),
            Marker::Teardown => write!(f, "teardown"),
            Marker::Test => write!(f, "test"),
        }
    }
}

/// 标记集合，按添加顺序保存，不重复
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSet(Vec<Marker>);

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, marker: Marker) {
        if !self.contains(marker) {
            self.0.push(marker);
        }
    }

    pub fn contains(&self, marker: Marker) -> bool {
        self.0.contains(&marker)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Marker> + '_ {
        self.0.iter().copied()
    }
}

impl From<&[Marker]> for MarkerSet {
    fn from(markers: &[Marker]) -> Self {
        let mut set = MarkerSet::new();
        for marker in markers {
            set.insert(*marker);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// 类型能否被实例化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Concrete,
    Abstract,
    Static,
}

/// 方法是自己声明的，还是从基类型继承来的
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOrigin {
    Declared,
    Inherited { from: String },
}

/// 类型擦除后的实例
pub type Instance = Box<dyn Any>;

/// 无参构造函数
pub type Factory = Rc<dyn Fn() -> Result<Instance, Failure>>;

/// 无参实例方法
pub type Invoker = Rc<dyn Fn(&mut dyn Any) -> Result<(), InvocationError>>;

/// 方法定义
pub struct MethodDef {
    pub name: String,
    pub markers: MarkerSet,
    pub visibility: Visibility,
    pub origin: MethodOrigin,
    pub(crate) invoker: Invoker,
}

impl MethodDef {
    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(marker)
    }

    pub fn is_declared(&self) -> bool {
        self.origin == MethodOrigin::Declared
    }

    /// 在 `target` 上调用该方法
    pub fn invoke(&self, target: &mut dyn Any) -> Result<(), InvocationError> {
        (self.invoker)(target)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("markers", &self.markers)
            .field("visibility", &self.visibility)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// 类型定义
pub struct TypeDef {
    pub name: String,
    pub markers: MarkerSet,
    pub kind: TypeKind,
    pub(crate) factory: Option<Factory>,
    pub methods: Vec<Rc<MethodDef>>,
}

impl TypeDef {
    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(marker)
    }

    /// 具体类型且有公开的无参构造函数
    pub fn is_instantiable(&self) -> bool {
        self.kind == TypeKind::Concrete && self.factory.is_some()
    }

    pub fn factory(&self) -> Option<&Factory> {
        self.factory.as_ref()
    }

    /// 自己声明的公开实例方法
    pub fn declared_methods(&self) -> impl Iterator<Item = &Rc<MethodDef>> {
        self.methods
            .iter()
            .filter(|m| m.is_declared() && m.visibility == Visibility::Public)
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("markers", &self.markers)
            .field("kind", &self.kind)
            .field("has_factory", &self.factory.is_some())
            .field("methods", &self.methods)
            .finish()
    }
}

/// 代码单元：一组类型定义，构建后不可变
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    types: Rc<[Rc<TypeDef>]>,
}

impl Module {
    pub(crate) fn new(name: String, types: Vec<Rc<TypeDef>>) -> Self {
        Self {
            name,
            types: types.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[Rc<TypeDef>] {
        &self.types
    }

    pub fn find_type(&self, name: &str) -> Option<&Rc<TypeDef>> {
        self.types.iter().find(|t| t.name == name)
    }
}
