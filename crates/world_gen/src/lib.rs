mod terrain;
mod voxel;

pub use terrain::*;
pub use voxel::*;
