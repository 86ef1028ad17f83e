//! Music sheet: the static catalog of compositions
//!
//! A composition is a list of measures; each measure holds melody notes and harmony
//! chords with beat-relative timing (beats start at 1). The built-in catalog has one
//! song per speed band; a catalog can also be loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Frequency used for pitch names that don't parse
pub const FALLBACK_FREQUENCY: f32 = 440.0;

/// The three speed bands and the song each one plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Song {
    /// Low speed ratio (< 1.3)
    TwinkleStar,
    /// Mid speed ratio (< 2.0)
    HappyBirthday,
    /// High speed ratio
    OdeToJoy,
}

impl Song {
    /// Song for a speed ratio
    pub fn for_speed_ratio(ratio: f32) -> Self {
        if ratio < 1.3 {
            Song::TwinkleStar
        } else if ratio < 2.0 {
            Song::HappyBirthday
        } else {
            Song::OdeToJoy
        }
    }

    /// Catalog id
    pub fn id(&self) -> &'static str {
        match self {
            Song::TwinkleStar => "twinkle_star",
            Song::HappyBirthday => "happy_birthday",
            Song::OdeToJoy => "ode_to_joy",
        }
    }
}

/// Parse scientific pitch notation (`C4`, `F#3`, `Bb5`) into a MIDI note number
pub fn parse_pitch(name: &str) -> Option<i32> {
    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (accidental, octave) = match rest.chars().next()? {
        '#' => (1, &rest[1..]),
        'b' => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i32 = octave.parse().ok()?;
    if !(-1..=9).contains(&octave) {
        return None;
    }
    Some((octave + 1) * 12 + base + accidental)
}

/// Equal-tempered frequency (A4 = 440 Hz) for a pitch name
pub fn pitch_frequency(name: &str) -> Option<f32> {
    let midi = parse_pitch(name)?;
    Some(440.0 * 2f32.powf((midi - 69) as f32 / 12.0))
}

/// Frequency for a pitch name, falling back to A4 with a warning
pub fn frequency_or_fallback(name: &str) -> f32 {
    pitch_frequency(name).unwrap_or_else(|| {
        log::warn!("Unknown pitch '{name}', using {FALLBACK_FREQUENCY} Hz");
        FALLBACK_FREQUENCY
    })
}

/// A melody note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: String,
    /// Length in beats
    pub duration: f32,
    /// Beat offset within the measure (1-based)
    pub beat: f32,
}

/// A harmony chord; every pitch sounds together (with a small stagger)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub pitches: Vec<String>,
    pub duration: f32,
    pub beat: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measure {
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub harmony: Vec<Chord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub composer: String,
    /// Top of the time signature
    pub beats_per_measure: u32,
    /// Base tempo in BPM; the engine default applies when absent
    #[serde(default)]
    pub tempo: Option<f32>,
    pub measures: Vec<Measure>,
}

impl Composition {
    pub fn measure(&self, index: usize) -> Option<&Measure> {
        if self.measures.is_empty() {
            return None;
        }
        self.measures.get(index % self.measures.len())
    }
}

/// The catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicSheet {
    pub compositions: Vec<Composition>,
}

impl Default for MusicSheet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn note(pitch: &str, duration: f32, beat: f32) -> Note {
    Note {
        pitch: pitch.to_string(),
        duration,
        beat,
    }
}

fn chord(pitches: &[&str], duration: f32, beat: f32) -> Chord {
    Chord {
        pitches: pitches.iter().map(|p| p.to_string()).collect(),
        duration,
        beat,
    }
}

fn measure(notes: Vec<Note>, harmony: Vec<Chord>) -> Measure {
    Measure { notes, harmony }
}

const C_MAJOR: [&str; 3] = ["C3", "E3", "G3"];
const F_MAJOR: [&str; 3] = ["F3", "A3", "C4"];
const G_MAJOR: [&str; 3] = ["G3", "B3", "D4"];

impl MusicSheet {
    /// The three built-in songs
    pub fn builtin() -> Self {
        let twinkle = Composition {
            id: Song::TwinkleStar.id().into(),
            title: "Twinkle Twinkle Little Star".into(),
            composer: "Traditional".into(),
            beats_per_measure: 4,
            tempo: Some(120.0),
            measures: vec![
                measure(
                    vec![note("C4", 1.0, 1.0), note("C4", 1.0, 2.0), note("G4", 1.0, 3.0), note("G4", 1.0, 4.0)],
                    vec![chord(&C_MAJOR, 4.0, 1.0)],
                ),
                measure(
                    vec![note("A4", 1.0, 1.0), note("A4", 1.0, 2.0), note("G4", 2.0, 3.0)],
                    vec![chord(&F_MAJOR, 2.0, 1.0), chord(&C_MAJOR, 2.0, 3.0)],
                ),
                measure(
                    vec![note("F4", 1.0, 1.0), note("F4", 1.0, 2.0), note("E4", 1.0, 3.0), note("E4", 1.0, 4.0)],
                    vec![chord(&F_MAJOR, 2.0, 1.0), chord(&C_MAJOR, 2.0, 3.0)],
                ),
                measure(
                    vec![note("D4", 1.0, 1.0), note("D4", 1.0, 2.0), note("C4", 2.0, 3.0)],
                    vec![chord(&G_MAJOR, 2.0, 1.0), chord(&C_MAJOR, 2.0, 3.0)],
                ),
            ],
        };

        let happy_phrase = || {
            measure(
                vec![note("C4", 0.5, 1.0), note("C4", 0.5, 1.5), note("D4", 1.0, 2.0), note("C4", 1.0, 3.0)],
                vec![chord(&C_MAJOR, 3.0, 1.0)],
            )
        };
        let high_phrase = || {
            measure(
                vec![note("C5", 0.5, 1.0), note("C5", 0.5, 1.5), note("A4", 1.0, 2.0), note("F4", 1.0, 3.0)],
                vec![chord(&C_MAJOR, 1.0, 1.0), chord(&F_MAJOR, 2.0, 2.0)],
            )
        };
        let birthday = Composition {
            id: Song::HappyBirthday.id().into(),
            title: "Happy Birthday".into(),
            composer: "Patty Hill & Mildred Hill".into(),
            beats_per_measure: 3,
            tempo: Some(120.0),
            measures: vec![
                happy_phrase(),
                measure(
                    vec![note("F4", 1.0, 1.0), note("E4", 2.0, 2.0)],
                    vec![chord(&F_MAJOR, 1.0, 1.0), chord(&C_MAJOR, 2.0, 2.0)],
                ),
                happy_phrase(),
                measure(
                    vec![note("G4", 1.0, 1.0), note("F4", 2.0, 2.0)],
                    vec![chord(&G_MAJOR, 1.0, 1.0), chord(&F_MAJOR, 2.0, 2.0)],
                ),
                high_phrase(),
                measure(
                    vec![note("E4", 1.0, 1.0), note("D4", 2.0, 2.0)],
                    vec![chord(&C_MAJOR, 1.0, 1.0), chord(&G_MAJOR, 2.0, 2.0)],
                ),
                high_phrase(),
                measure(
                    vec![note("G4", 1.0, 1.0), note("C4", 2.0, 2.0)],
                    vec![chord(&G_MAJOR, 1.0, 1.0), chord(&C_MAJOR, 2.0, 2.0)],
                ),
            ],
        };

        let ode = Composition {
            id: Song::OdeToJoy.id().into(),
            title: "Ode to Joy".into(),
            composer: "Ludwig van Beethoven".into(),
            beats_per_measure: 4,
            tempo: Some(120.0),
            measures: vec![
                measure(
                    vec![note("E4", 1.0, 1.0), note("E4", 1.0, 2.0), note("F4", 1.0, 3.0), note("G4", 1.0, 4.0)],
                    vec![chord(&C_MAJOR, 2.0, 1.0), chord(&F_MAJOR, 1.0, 3.0), chord(&G_MAJOR, 1.0, 4.0)],
                ),
                measure(
                    vec![note("G4", 1.0, 1.0), note("F4", 1.0, 2.0), note("E4", 1.0, 3.0), note("D4", 1.0, 4.0)],
                    vec![chord(&G_MAJOR, 1.0, 1.0), chord(&F_MAJOR, 1.0, 2.0), chord(&C_MAJOR, 2.0, 3.0)],
                ),
                measure(
                    vec![note("C4", 1.0, 1.0), note("C4", 1.0, 2.0), note("D4", 1.0, 3.0), note("E4", 1.0, 4.0)],
                    vec![chord(&C_MAJOR, 2.0, 1.0), chord(&G_MAJOR, 1.0, 3.0), chord(&C_MAJOR, 1.0, 4.0)],
                ),
                measure(
                    vec![note("E4", 1.5, 1.0), note("D4", 0.5, 2.5), note("D4", 2.0, 3.0)],
                    vec![chord(&C_MAJOR, 2.0, 1.0), chord(&G_MAJOR, 2.0, 3.0)],
                ),
            ],
        };

        Self {
            compositions: vec![twinkle, birthday, ode],
        }
    }

    /// Parse a catalog from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let sheet: Self = serde_json::from_str(json)?;
        Ok(sheet)
    }

    pub fn get(&self, id: &str) -> Option<&Composition> {
        self.compositions.iter().find(|c| c.id == id)
    }

    pub fn song(&self, song: Song) -> Option<&Composition> {
        self.get(song.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_frequencies() {
        assert_eq!(pitch_frequency("A4"), Some(440.0));
        assert!((pitch_frequency("C4").unwrap() - 261.63).abs() < 0.01);
        assert!((pitch_frequency("C3").unwrap() - 130.81).abs() < 0.01);
        assert!((pitch_frequency("F#4").unwrap() - 369.99).abs() < 0.01);
        assert_eq!(pitch_frequency("Db4"), pitch_frequency("C#4"));
        assert!((pitch_frequency("C5").unwrap() - 523.25).abs() < 0.01);
    }

    #[test]
    fn test_bad_pitch_falls_back() {
        assert_eq!(pitch_frequency("H2"), None);
        assert_eq!(pitch_frequency("C"), None);
        assert_eq!(pitch_frequency(""), None);
        assert_eq!(frequency_or_fallback("X9"), FALLBACK_FREQUENCY);
    }

    #[test]
    fn test_song_bands() {
        assert_eq!(Song::for_speed_ratio(1.0), Song::TwinkleStar);
        assert_eq!(Song::for_speed_ratio(1.5), Song::HappyBirthday);
        assert_eq!(Song::for_speed_ratio(2.5), Song::OdeToJoy);
        assert_eq!(Song::for_speed_ratio(1.3), Song::HappyBirthday);
        assert_eq!(Song::for_speed_ratio(2.0), Song::OdeToJoy);
    }

    #[test]
    fn test_builtin_catalog() {
        let sheet = MusicSheet::builtin();
        let twinkle = sheet.song(Song::TwinkleStar).unwrap();
        assert_eq!(twinkle.measures.len(), 4);
        assert_eq!(twinkle.beats_per_measure, 4);
        let birthday = sheet.song(Song::HappyBirthday).unwrap();
        assert_eq!(birthday.measures.len(), 8);
        assert_eq!(birthday.beats_per_measure, 3);
        assert_eq!(sheet.song(Song::OdeToJoy).unwrap().measures.len(), 4);

        // Every pitch in the catalog resolves
        for composition in &sheet.compositions {
            for m in &composition.measures {
                for n in &m.notes {
                    assert!(pitch_frequency(&n.pitch).is_some(), "{}", n.pitch);
                }
                for c in &m.harmony {
                    for p in &c.pitches {
                        assert!(pitch_frequency(p).is_some(), "{p}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_measure_wraps() {
        let sheet = MusicSheet::builtin();
        let twinkle = sheet.song(Song::TwinkleStar).unwrap();
        assert_eq!(twinkle.measure(4), twinkle.measure(0));
    }

    #[test]
    fn test_sheet_json_round_trip_keeps_defaults() {
        let json = r#"{ "compositions": [
            { "id": "scale", "title": "Scale", "beats_per_measure": 2,
              "measures": [ { "notes": [ { "pitch": "C4", "duration": 1, "beat": 1 } ] } ] }
        ] }"#;
        let sheet = MusicSheet::from_json(json).unwrap();
        let scale = sheet.get("scale").unwrap();
        assert_eq!(scale.tempo, None);
        assert!(scale.measures[0].harmony.is_empty());
    }
}
