//! Which G-buffer view the shading stage produces.

use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawMode {
    /// Full lighting over every light, plus the light markers.
    #[default]
    CompositeLit,
    DiffuseOnly,
    SpecularOnly,
    NormalOnly,
    PositionOnly,
    DepthOnly,
}

impl DrawMode {
    pub const ALL: [DrawMode; 6] = [
        DrawMode::CompositeLit,
        DrawMode::DiffuseOnly,
        DrawMode::SpecularOnly,
        DrawMode::NormalOnly,
        DrawMode::PositionOnly,
        DrawMode::DepthOnly,
    ];

    /// Mode bound to number key `n` (1..=6).
    pub fn from_key_index(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            DrawMode::CompositeLit => "composite",
            DrawMode::DiffuseOnly => "diffuse",
            DrawMode::SpecularOnly => "specular",
            DrawMode::NormalOnly => "normal",
            DrawMode::PositionOnly => "position",
            DrawMode::DepthOnly => "depth",
        }
    }

    /// Whether the light-volume markers are drawn after shading.
    pub fn draws_light_volumes(self) -> bool {
        self == DrawMode::CompositeLit
    }
}

impl fmt::Display for DrawMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_indices() {
        for (i, mode) in DrawMode::ALL.iter().enumerate() {
            assert_eq!(DrawMode::from_key_index(i as u8 + 1), Some(*mode));
        }
        assert_eq!(DrawMode::from_key_index(0), None);
        assert_eq!(DrawMode::from_key_index(7), None);
    }

    #[test]
    fn test_only_composite_draws_volumes() {
        assert_eq!(DrawMode::default(), DrawMode::CompositeLit);
        let with_volumes: Vec<_> = DrawMode::ALL
            .into_iter()
            .filter(|m| m.draws_light_volumes())
            .collect();
        assert_eq!(with_volumes, vec![DrawMode::CompositeLit]);
    }
}
