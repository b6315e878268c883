//! Bean model.
//!
//! Beans, the configs declaring them and the config sets grouping configs into
//! application contexts. The host provides them through [`BeansModel`];
//! [`StaticBeansModel`] keeps them in memory and can read XML configs.

mod model;
mod reader;
mod scope;

pub use model::{
    AUTO_PROXY_CREATOR_BEAN_NAME, Bean, BeansConfig, Component, ConfigSet, PropertyValue,
};
pub use reader::read_beans_config;
pub use scope::{
    BeansModel, StaticBeansModel, config_set_siblings, importing_configs, scope_beans, with_imports,
};
