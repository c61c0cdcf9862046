pub mod note;
pub mod record;
pub mod settings;
pub mod vault;
pub mod width;

pub use note::*;
pub use record::*;
pub use settings::*;
pub use vault::*;
pub use width::*;
