use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::Voxel;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TerrainKind
{
    /// Fractal Perlin height field.
    Hills
    {
        base_height: f64,
        amplitude:   f64,
        frequency:   f64
    },
    /// Constant surface height.
    Flat
    {
        height: i32
    }
}

impl Default for TerrainKind
{
    fn default() -> Self
    {
        TerrainKind::Hills {
            base_height: 48.0,
            amplitude:   28.0,
            frequency:   1.0 / 160.0
        }
    }
}

/// Pure function of (seed, kind, world coordinate). Regenerating a chunk
/// always produces identical voxels.
#[derive(Clone, Debug)]
pub struct TerrainGenerator
{
    kind:         TerrainKind,
    sea_level:    i32,
    snow_line:    i32,
    height_noise: Fbm<Perlin>
}

impl TerrainGenerator
{
    pub const DIRT_DEPTH: i32 = 3;

    pub fn new(seed: u32, kind: TerrainKind) -> TerrainGenerator
    {
        let frequency = match kind
        {
            TerrainKind::Hills {
                frequency, ..
            } => frequency,
            TerrainKind::Flat {
                ..
            } => 1.0
        };

        TerrainGenerator {
            kind,
            sea_level: 38,
            snow_line: 70,
            height_noise: Fbm::<Perlin>::new(seed)
                .set_octaves(5)
                .set_frequency(frequency)
                .set_persistence(0.5)
        }
    }

    /// First empty z above the ground of column (x, y).
    pub fn column_height(&self, x: i32, y: i32) -> i32
    {
        match self.kind
        {
            TerrainKind::Hills {
                base_height,
                amplitude,
                ..
            } =>
            {
                let n = self.height_noise.get([x as f64, y as f64]);

                (base_height + n * amplitude).floor() as i32
            }
            TerrainKind::Flat {
                height
            } => height
        }
    }

    pub fn voxel_in_column(&self, z: i32, height: i32) -> Voxel
    {
        let beach = height <= self.sea_level + 1;

        if z < height - Self::DIRT_DEPTH
        {
            Voxel::Stone
        }
        else if z < height - 1
        {
            if beach { Voxel::Sand } else { Voxel::Dirt }
        }
        else if z < height
        {
            if beach
            {
                Voxel::Sand
            }
            else if height > self.snow_line
            {
                Voxel::Snow
            }
            else
            {
                Voxel::Grass
            }
        }
        else if z < self.sea_level && matches!(self.kind, TerrainKind::Hills { .. })
        {
            Voxel::Water
        }
        else
        {
            Voxel::Air
        }
    }

    pub fn sample(&self, [x, y, z]: [i32; 3]) -> Voxel
    {
        self.voxel_in_column(z, self.column_height(x, y))
    }
}
