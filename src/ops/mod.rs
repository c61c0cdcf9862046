pub mod bulk;
pub mod check;
pub mod commands;
pub mod ident;
pub mod resolver;
pub mod scheduler;
pub mod sources;
pub mod style;
