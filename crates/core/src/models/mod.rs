pub mod denylist;
pub mod history;
pub mod pair;
pub mod portfolio;
pub mod selection;
pub mod settings;
pub mod state;
pub mod token;
