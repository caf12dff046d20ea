mod app;
mod general;
mod inputter;
mod list;
mod modeler;
mod runner;

pub use app::AppConfig;
pub use general::Config;
pub use inputter::{InputterConfig, TextUnit};
pub use list::comma_list;
pub use modeler::{BoundaryUnit, ModelerConfig};
pub use runner::RunnerConfig;
