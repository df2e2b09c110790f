mod catalogue;
pub use catalogue::{Catalogue, CatalogueError};

pub mod directory;
pub use directory::Directory;
