//! # ODMS Registry
//!
//! 供体、受体、医院与器官记录的注册中心。
//! 作为外部协作方暴露简单的键值读写接口：按键后写胜出，无跨键事务保证。

pub mod memory;
pub mod store;

pub use memory::InMemoryRegistry;
pub use store::RegistryStore;
