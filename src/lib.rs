// lib.rs — 全景图观察者核心：等距柱状投影 -> 立方体贴图烘焙与天空盒显示

pub mod baker;
pub mod camera;
pub mod config;
pub mod cubemap;
pub mod error;
pub mod fonts;
pub mod grid;
pub mod i18n;
pub mod input;
pub mod layout;
pub mod mesh;
pub mod panorama;
pub mod projector;
pub mod renderer;
pub mod session;
pub mod skybox;
#[cfg(test)]
mod test_support;

pub use error::{Result, ViewError};
