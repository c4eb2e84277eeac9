// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Eight angular obstacle sectors around a robot.
//!
//! Robot frame: `+x` left, `−x` right, `+y` back, `−y` front.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sector {
    Left,
    Right,
    Front,
    Back,
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
}

/// Which status slot of a summary a sector reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Horizontal,
    Vertical,
    FrontDiagonal,
    BackDiagonal,
}

impl Sector {
    pub const ALL: [Sector; 8] = [
        Sector::Left,
        Sector::Right,
        Sector::Front,
        Sector::Back,
        Sector::FrontLeft,
        Sector::FrontRight,
        Sector::BackLeft,
        Sector::BackRight,
    ];

    /// Classifies a robot-frame offset. `|x| ≥ ratio·|y|` is horizontal,
    /// `|y| ≥ ratio·|x|` is vertical, anything else is diagonal by sign.
    /// A zero vector classifies as `Right`.
    pub fn classify(x: f64, y: f64, ratio: f64) -> Sector {
        let (ax, ay) = (x.abs(), y.abs());
        if ax >= ratio * ay {
            return if x > 0.0 { Sector::Left } else { Sector::Right };
        }
        if ay >= ratio * ax {
            return if y > 0.0 { Sector::Back } else { Sector::Front };
        }
        match (y < 0.0, x > 0.0) {
            (true, true) => Sector::FrontLeft,
            (true, false) => Sector::FrontRight,
            (false, true) => Sector::BackLeft,
            (false, false) => Sector::BackRight,
        }
    }

    /// Direction of a motion vector, with a stronger dominance ratio.
    /// `None` for a zero vector.
    pub fn from_vector(dx: f64, dy: f64, ratio: f64) -> Option<Sector> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        Some(Self::classify(dx, dy, ratio))
    }

    pub fn slot(self) -> Slot {
        match self {
            Sector::Left | Sector::Right => Slot::Horizontal,
            Sector::Front | Sector::Back => Slot::Vertical,
            Sector::FrontLeft | Sector::FrontRight => Slot::FrontDiagonal,
            Sector::BackLeft | Sector::BackRight => Slot::BackDiagonal,
        }
    }

    pub fn is_diagonal(self) -> bool {
        matches!(self.slot(), Slot::FrontDiagonal | Slot::BackDiagonal)
    }

    pub fn contains_left(self) -> bool {
        matches!(self, Sector::Left | Sector::FrontLeft | Sector::BackLeft)
    }

    pub fn contains_front(self) -> bool {
        matches!(self, Sector::Front | Sector::FrontLeft | Sector::FrontRight)
    }

    /// The sector and its two angular neighbours. A diagonal is composed of
    /// its two cardinals; a cardinal is flanked by its two diagonals.
    pub fn triplet(self) -> [Sector; 3] {
        match self {
            Sector::FrontLeft => [Sector::FrontLeft, Sector::Front, Sector::Left],
            Sector::FrontRight => [Sector::FrontRight, Sector::Front, Sector::Right],
            Sector::BackLeft => [Sector::BackLeft, Sector::Back, Sector::Left],
            Sector::BackRight => [Sector::BackRight, Sector::Back, Sector::Right],
            Sector::Front => [Sector::Front, Sector::FrontLeft, Sector::FrontRight],
            Sector::Back => [Sector::Back, Sector::BackLeft, Sector::BackRight],
            Sector::Left => [Sector::Left, Sector::FrontLeft, Sector::BackLeft],
            Sector::Right => [Sector::Right, Sector::FrontRight, Sector::BackRight],
        }
    }

    /// Unit-free world offset of this direction, `(dx, dy)` in {−1, 0, 1}.
    pub fn offset(self) -> (f64, f64) {
        match self {
            Sector::Left => (1.0, 0.0),
            Sector::Right => (-1.0, 0.0),
            Sector::Front => (0.0, -1.0),
            Sector::Back => (0.0, 1.0),
            Sector::FrontLeft => (1.0, -1.0),
            Sector::FrontRight => (-1.0, -1.0),
            Sector::BackLeft => (1.0, 1.0),
            Sector::BackRight => (-1.0, 1.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sector::Left => "left",
            Sector::Right => "right",
            Sector::Front => "front",
            Sector::Back => "back",
            Sector::FrontLeft => "front-left",
            Sector::FrontRight => "front-right",
            Sector::BackLeft => "back-left",
            Sector::BackRight => "back-right",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sector::ALL
            .into_iter()
            .find(|sector| sector.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown sector '{s}'"))
    }
}

/// Set of sectors, one bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorMask(u8);

impl SectorMask {
    pub fn insert(&mut self, sector: Sector) {
        self.0 |= sector.bit();
    }

    pub fn contains(self, sector: Sector) -> bool {
        self.0 & sector.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Sector> {
        Sector::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl FromIterator<Sector> for SectorMask {
    fn from_iter<I: IntoIterator<Item = Sector>>(iter: I) -> Self {
        let mut mask = SectorMask::default();
        for sector in iter {
            mask.insert(sector);
        }
        mask
    }
}
