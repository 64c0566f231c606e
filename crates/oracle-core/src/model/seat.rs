use core::fmt;
use serde::{Deserialize, Serialize};

/// A position at the table, in clockwise turn order.
///
/// South is the observer whose hand is known; the other three seats hold
/// the hidden hands the engine reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Seat {
    #[serde(rename = "S")]
    South = 0,
    #[serde(rename = "W")]
    West = 1,
    #[serde(rename = "N")]
    North = 2,
    #[serde(rename = "E")]
    East = 3,
}

impl Seat {
    pub const LOOP: [Seat; 4] = [Seat::South, Seat::West, Seat::North, Seat::East];

    /// The three seats whose hands are unknown to the observer.
    pub const OPPONENTS: [Seat; 3] = [Seat::West, Seat::North, Seat::East];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Seat::South),
            1 => Some(Seat::West),
            2 => Some(Seat::North),
            3 => Some(Seat::East),
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn next(self) -> Seat {
        match self {
            Seat::South => Seat::West,
            Seat::West => Seat::North,
            Seat::North => Seat::East,
            Seat::East => Seat::South,
        }
    }

    pub const fn is_observer(self) -> bool {
        matches!(self, Seat::South)
    }

    /// Dense index into the unknown-seat universe, or None for the observer.
    pub const fn opponent_index(self) -> Option<usize> {
        match self {
            Seat::South => None,
            Seat::West => Some(0),
            Seat::North => Some(1),
            Seat::East => Some(2),
        }
    }

    pub const fn from_opponent_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Seat::West),
            1 => Some(Seat::North),
            2 => Some(Seat::East),
            _ => None,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Seat::South => "South",
            Seat::West => "West",
            Seat::North => "North",
            Seat::East => "East",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::Seat;

    #[test]
    fn next_wraps_around() {
        assert_eq!(Seat::East.next(), Seat::South);
        assert_eq!(Seat::South.next(), Seat::West);
    }

    #[test]
    fn index_roundtrip() {
        for (i, seat) in Seat::LOOP.iter().enumerate() {
            assert_eq!(Seat::from_index(i), Some(*seat));
            assert_eq!(seat.index(), i);
        }
    }

    #[test]
    fn opponent_indices_skip_the_observer() {
        assert_eq!(Seat::South.opponent_index(), None);
        for (i, seat) in Seat::OPPONENTS.iter().enumerate() {
            assert_eq!(seat.opponent_index(), Some(i));
            assert_eq!(Seat::from_opponent_index(i), Some(*seat));
        }
        assert_eq!(Seat::from_opponent_index(3), None);
    }

    #[test]
    fn serde_uses_single_letter_codes() {
        assert_eq!(serde_json::to_string(&Seat::West).unwrap(), "\"W\"");
        let seat: Seat = serde_json::from_str("\"E\"").unwrap();
        assert_eq!(seat, Seat::East);
    }
}
