pub mod backend;
pub mod headless;
pub mod ledger;
pub mod renderer;

pub use backend::*;
pub use headless::*;
pub use ledger::*;
pub use renderer::*;
