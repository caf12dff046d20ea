mod scope;
mod store;

pub use scope::VariableScope;
pub use store::VariableStore;
