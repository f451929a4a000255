use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempoMarking {
    Largo,
    Adagio,
    Andante,
    Moderato,
    Allegro,
    Presto,
}

impl TempoMarking {
    pub fn from_bpm(bpm: f64) -> Self {
        match bpm {
            b if b < 60.0 => TempoMarking::Largo,
            b if b < 76.0 => TempoMarking::Adagio,
            b if b < 108.0 => TempoMarking::Andante,
            b if b < 120.0 => TempoMarking::Moderato,
            b if b < 168.0 => TempoMarking::Allegro,
            _ => TempoMarking::Presto,
        }
    }
}

impl std::fmt::Display for TempoMarking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TempoMarking::Largo => "Largo",
            TempoMarking::Adagio => "Adagio",
            TempoMarking::Andante => "Andante",
            TempoMarking::Moderato => "Moderato",
            TempoMarking::Allegro => "Allegro",
            TempoMarking::Presto => "Presto",
        };
        f.write_str(name)
    }
}

/// Tempo as shown with a progression: `{ "time": 120, "name": "Allegro" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoDescriptor {
    /// Beats per minute, rounded.
    pub time: u32,
    pub name: String,
}

impl TempoDescriptor {
    pub fn from_bpm(bpm: f64) -> Self {
        let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { 120.0 };
        Self {
            time: bpm.round() as u32,
            name: TempoMarking::from_bpm(bpm).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        assert_eq!(TempoMarking::from_bpm(59.9), TempoMarking::Largo);
        assert_eq!(TempoMarking::from_bpm(60.0), TempoMarking::Adagio);
        assert_eq!(TempoMarking::from_bpm(90.0), TempoMarking::Andante);
        assert_eq!(TempoMarking::from_bpm(108.0), TempoMarking::Moderato);
        assert_eq!(TempoMarking::from_bpm(120.0), TempoMarking::Allegro);
        assert_eq!(TempoMarking::from_bpm(168.0), TempoMarking::Presto);
    }

    #[test]
    fn descriptor_rounds_bpm() {
        let t = TempoDescriptor::from_bpm(89.99998);
        assert_eq!(t.time, 90);
        assert_eq!(t.name, "Andante");
    }

    #[test]
    fn nonsense_bpm_falls_back() {
        assert_eq!(TempoDescriptor::from_bpm(f64::NAN).time, 120);
    }
}
