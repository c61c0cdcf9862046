pub mod frontmatter;

pub use frontmatter::{parse_mapping, render, split, strip, Block, FrontMatterError};
