use core::fmt;
use serde::de::Error as _;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Highest pip value in a double-six set.
pub const MAX_PIP: u8 = 6;

/// Number of tiles in the full double-six set.
pub const TILE_COUNT: usize = 28;

/// A domino tile as a canonical unordered pair with `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    low: u8,
    high: u8,
}

impl Tile {
    /// Every tile in the double-six set, in dense-ID order.
    pub const ALL: [Tile; TILE_COUNT] = {
        let mut tiles = [Tile { low: 0, high: 0 }; TILE_COUNT];
        let mut id = 0u8;
        while (id as usize) < TILE_COUNT {
            tiles[id as usize] = match Tile::from_id(id) {
                Some(tile) => tile,
                None => unreachable!(),
            };
            id += 1;
        }
        tiles
    };

    /// Creates a tile from two pip values, canonicalising their order.
    ///
    /// Panics if either value exceeds [`MAX_PIP`]; out-of-range pips are a
    /// programmer error, not observable input.
    pub const fn new(a: u8, b: u8) -> Self {
        assert!(a <= MAX_PIP && b <= MAX_PIP, "pip value out of range");
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Convert tile to its dense ID in range 0..28.
    /// Encoding: triangular index `high * (high + 1) / 2 + low`,
    /// so (0,0) is 0, (0,1) is 1, (1,1) is 2, ..., (6,6) is 27.
    pub const fn to_id(self) -> u8 {
        self.high * (self.high + 1) / 2 + self.low
    }

    /// Convert ID (0..28) back to a Tile.
    /// Returns None if id >= 28.
    pub const fn from_id(id: u8) -> Option<Self> {
        if id >= TILE_COUNT as u8 {
            return None;
        }
        let mut high = 0u8;
        while (high + 1) * (high + 2) / 2 <= id {
            high += 1;
        }
        let low = id - high * (high + 1) / 2;
        Some(Self { low, high })
    }

    /// The two pip values in canonical order.
    pub const fn values(self) -> (u8, u8) {
        (self.low, self.high)
    }

    pub const fn low(self) -> u8 {
        self.low
    }

    pub const fn high(self) -> u8 {
        self.high
    }

    pub const fn is_double(self) -> bool {
        self.low == self.high
    }

    /// Whether the tile belongs to suit `value`.
    pub const fn has_value(self, value: u8) -> bool {
        self.low == value || self.high == value
    }

    /// The pip on the opposite side of `value`. For a double both sides
    /// carry the same pip, so the result equals `value`.
    pub const fn other_value(self, value: u8) -> u8 {
        if self.low == value {
            self.high
        } else {
            self.low
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}|{}]", self.low, self.high)
    }
}

impl Serialize for Tile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&self.low)?;
        pair.serialize_element(&self.high)?;
        pair.end()
    }
}

impl<'de> Deserialize<'de> for Tile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [a, b] = <[u8; 2]>::deserialize(deserializer)?;
        if a > b || b > MAX_PIP {
            return Err(D::Error::custom(format!("invalid tile [{a},{b}]")));
        }
        Ok(Tile::new(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::{Tile, TILE_COUNT};

    #[test]
    fn tile_id_roundtrip() {
        for id in 0..TILE_COUNT as u8 {
            let tile = Tile::from_id(id).expect("valid id");
            assert_eq!(tile.to_id(), id);
        }
    }

    #[test]
    fn tile_id_known_values() {
        assert_eq!(Tile::new(0, 0).to_id(), 0);
        assert_eq!(Tile::new(0, 1).to_id(), 1);
        assert_eq!(Tile::new(1, 1).to_id(), 2);
        assert_eq!(Tile::new(6, 6).to_id(), 27);
    }

    #[test]
    fn from_id_rejects_out_of_range() {
        assert_eq!(Tile::from_id(28), None);
        assert_eq!(Tile::from_id(255), None);
    }

    #[test]
    fn all_28_tiles_unique() {
        let mut seen = std::collections::HashSet::new();
        for tile in Tile::ALL {
            assert!(seen.insert(tile), "{} appears twice", tile);
        }
        assert_eq!(seen.len(), TILE_COUNT);
    }

    #[test]
    fn all_lists_every_tile_in_id_order() {
        for (index, tile) in Tile::ALL.iter().enumerate() {
            assert_eq!(tile.to_id() as usize, index);
        }
        assert_eq!(Tile::ALL[0], Tile::new(0, 0));
        assert_eq!(Tile::ALL[TILE_COUNT - 1], Tile::new(6, 6));
    }

    #[test]
    fn constructor_canonicalises_order() {
        assert_eq!(Tile::new(5, 2), Tile::new(2, 5));
        assert_eq!(Tile::new(5, 2).values(), (2, 5));
    }

    #[test]
    fn double_keeps_its_value_on_both_sides() {
        let double = Tile::new(4, 4);
        assert!(double.is_double());
        assert_eq!(double.other_value(4), 4);
    }

    #[test]
    fn other_value_flips_sides() {
        let tile = Tile::new(2, 5);
        assert_eq!(tile.other_value(2), 5);
        assert_eq!(tile.other_value(5), 2);
        assert!(tile.has_value(2) && tile.has_value(5));
        assert!(!tile.has_value(3));
    }

    #[test]
    fn serde_uses_pair_form() {
        let tile = Tile::new(2, 5);
        let json = serde_json::to_string(&tile).expect("serialise");
        assert_eq!(json, "[2,5]");
        let back: Tile = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, tile);
    }

    #[test]
    fn serde_rejects_malformed_pairs() {
        assert!(serde_json::from_str::<Tile>("[5,2]").is_err());
        assert!(serde_json::from_str::<Tile>("[0,7]").is_err());
    }
}
