//! 内置示例模块，`markrun` 可执行文件默认运行它。

use crate::module::{Module, ModuleBuilder, TypeBuilder, TypeDef};
use tracing::info;

/// 示例夹具：一个通过的测试、一个失败的测试
#[derive(Debug, Default)]
pub struct UnitTestExample {
    pub initialised: u32,
    pub cleaned_up: u32,
}

/// 带标记的抽象基类型，本身不会被发现
#[derive(Debug, Default)]
pub struct SharedChecks {
    pub checks: u32,
}

/// 继承 `SharedChecks` 的夹具，只有自己声明的测试会运行
#[derive(Debug, Default)]
pub struct DerivedExample {
    pub shared: SharedChecks,
}

fn unit_test_example() -> TypeDef {
    TypeBuilder::<UnitTestExample>::fixture("UnitTestExample")
        .default_constructor()
        .setup("set_up", |fx: &mut UnitTestExample| {
            fx.initialised += 1;
            info!("Initialising test");
        })
        .teardown("clean_up", |fx: &mut UnitTestExample| {
            fx.cleaned_up += 1;
            info!("Cleaning up test");
        })
        .test("passing_unit_test_example", |_: &mut UnitTestExample| {
            assert_eq!(1, 1, "test failed 1 to 1 comparison");
        })
        .test(
            "failing_unit_test_example",
            |_: &mut UnitTestExample| -> anyhow::Result<()> {
                anyhow::bail!("uh oh, you'd better fix this test")
            },
        )
        .build()
}

fn shared_checks() -> TypeDef {
    TypeBuilder::<SharedChecks>::fixture("SharedChecks")
        .abstract_type()
        .test("shared_check", |base: &mut SharedChecks| base.checks += 1)
        .build()
}

fn derived_example(base: &TypeDef) -> TypeDef {
    TypeBuilder::<DerivedExample>::fixture("DerivedExample")
        .default_constructor()
        .extends(base, |fx: &mut DerivedExample| &mut fx.shared)
        .test("derived_check", |fx: &mut DerivedExample| {
            assert_eq!(fx.shared.checks, 0, "inherited test must not have run");
        })
        .build()
}

/// 构建示例模块
pub fn module() -> Module {
    let base = shared_checks();
    let derived = derived_example(&base);

    ModuleBuilder::new("markrun-demo")
        .with_type(unit_test_example())
        .with_type(base)
        .with_type(derived)
        .build()
}
