//! Equal-tempered pitch reference, C0 through B8.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Note {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl Note {
    pub const ALL: [Note; 12] = [
        Note::C,
        Note::CSharp,
        Note::D,
        Note::DSharp,
        Note::E,
        Note::F,
        Note::FSharp,
        Note::G,
        Note::GSharp,
        Note::A,
        Note::ASharp,
        Note::B,
    ];

    /// Semitone offset from C.
    pub fn semitone(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Note::C => "C",
            Note::CSharp => "C#",
            Note::D => "D",
            Note::DSharp => "D#",
            Note::E => "E",
            Note::F => "F",
            Note::FSharp => "F#",
            Note::G => "G",
            Note::GSharp => "G#",
            Note::A => "A",
            Note::ASharp => "A#",
            Note::B => "B",
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pitch {
    pub note: Note,
    pub octave: u8,
    pub frequency: f64,
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.note, self.octave)
    }
}

pub const LOWEST_OCTAVE: u8 = 0;
pub const HIGHEST_OCTAVE: u8 = 8;

// Reference chart frequencies (Hz), rounded to 0.01, one octave per row.
#[rustfmt::skip]
const FREQUENCIES: [f64; 108] = [
    16.35, 17.32, 18.35, 19.45, 20.6, 21.83, 23.12, 24.5, 25.96, 27.5, 29.14, 30.87,
    32.7, 34.65, 36.71, 38.89, 41.2, 43.65, 46.25, 49.0, 51.91, 55.0, 58.27, 61.74,
    65.41, 69.3, 73.42, 77.78, 82.41, 87.31, 92.5, 98.0, 103.83, 110.0, 116.54, 123.47,
    130.81, 138.59, 146.83, 155.56, 164.81, 174.61, 185.0, 196.0, 207.65, 220.0, 233.08, 246.94,
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.0, 415.3, 440.0, 466.16, 493.88,
    523.25, 554.37, 587.33, 622.25, 659.25, 698.46, 739.99, 783.99, 830.61, 880.0, 932.33, 987.77,
    1046.5, 1108.73, 1174.66, 1244.51, 1318.51, 1396.91, 1479.98, 1567.98, 1661.22, 1760.0, 1864.66, 1975.53,
    2093.0, 2217.46, 2349.32, 2489.02, 2637.02, 2793.83, 2959.96, 3135.96, 3322.44, 3520.0, 3729.31, 3951.07,
    4186.01, 4434.92, 4698.63, 4978.03, 5274.04, 5587.65, 5919.91, 6271.93, 6644.88, 7040.0, 7458.62, 7902.13,
];

fn at_index(index: usize) -> Pitch {
    Pitch {
        note: Note::ALL[index % 12],
        octave: (index / 12) as u8,
        frequency: FREQUENCIES[index],
    }
}

/// All pitches in ascending order.
pub fn table() -> impl Iterator<Item = Pitch> {
    (0..FREQUENCIES.len()).map(at_index)
}

pub fn pitch(note: Note, octave: u8) -> Option<Pitch> {
    let index = octave as usize * 12 + note.semitone();
    (index < FREQUENCIES.len()).then(|| at_index(index))
}

/// Pitch whose reference frequency is closest to `frequency`.
pub fn nearest(frequency: f64) -> Pitch {
    let index = FREQUENCIES
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - frequency).abs().total_cmp(&(*b - frequency).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0);
    at_index(index)
}

/// Default lower analysis bound, C2.
pub fn default_min() -> Pitch {
    at_index(24)
}

/// Default upper analysis bound, C6.
pub fn default_max() -> Pitch {
    at_index(72)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePitchError(String);

impl fmt::Display for ParsePitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pitch '{}': expected a note and octave such as C2, F#4 or Bb3", self.0)
    }
}

impl std::error::Error for ParsePitchError {}

impl FromStr for Pitch {
    type Err = ParsePitchError;

    /// Parses `C2`, `F#4`, `Bb3` (flats resolve to the sharp below).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePitchError(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(err)?.to_ascii_uppercase();
        let base: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(err()),
        };

        let rest = chars.as_str();
        let (shift, digits) = if let Some(r) = rest.strip_prefix('#') {
            (1, r)
        } else if let Some(r) = rest.strip_prefix('b') {
            (-1, r)
        } else {
            (0, rest)
        };
        let octave: i32 = digits.parse().map_err(|_| err())?;
        if !(LOWEST_OCTAVE as i32..=HIGHEST_OCTAVE as i32).contains(&octave) {
            return Err(err());
        }

        let index = octave * 12 + base + shift;
        if index < 0 || index as usize >= FREQUENCIES.len() {
            return Err(err());
        }
        Ok(at_index(index as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_ascending() {
        let pitches: Vec<Pitch> = table().collect();
        assert_eq!(pitches.len(), 108);
        assert!(pitches.windows(2).all(|w| w[0].frequency < w[1].frequency));
        assert_eq!(pitches[0].to_string(), "C0");
        assert_eq!(pitches[107].to_string(), "B8");
    }

    #[test]
    fn lookup() {
        assert_eq!(pitch(Note::A, 4).unwrap().frequency, 440.0);
        assert_eq!(default_min().frequency, 65.41);
        assert_eq!(default_max().frequency, 1046.5);
        assert!(pitch(Note::C, 9).is_none());
    }

    #[test]
    fn parse() {
        assert_eq!("C2".parse::<Pitch>().unwrap(), default_min());
        assert_eq!("a4".parse::<Pitch>().unwrap().frequency, 440.0);
        assert_eq!("F#3".parse::<Pitch>().unwrap().note, Note::FSharp);
        let b_flat: Pitch = "Bb3".parse().unwrap();
        assert_eq!((b_flat.note, b_flat.octave), (Note::ASharp, 3));
        assert!("H2".parse::<Pitch>().is_err());
        assert!("C".parse::<Pitch>().is_err());
        assert!("Cb0".parse::<Pitch>().is_err());
        assert!("C12".parse::<Pitch>().is_err());
        assert!("C9".parse::<Pitch>().is_err());
        assert_eq!("B8".parse::<Pitch>().unwrap().frequency, 7902.13);
    }

    #[test]
    fn nearest_pitch() {
        assert_eq!(nearest(441.0).to_string(), "A4");
        assert_eq!(nearest(1.0).to_string(), "C0");
        assert_eq!(nearest(20000.0).to_string(), "B8");
    }
}
