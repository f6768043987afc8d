use serde::{Deserialize, Serialize};

/// Identity of a single bottom-trawl tow. The serialized form doubles as the
/// filename stem of the haul's flat file under `joined/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HaulKey {
    pub year: i32,
    pub survey: String,
    pub haul: i64,
}

#[derive(Debug, thiserror::Error)]
#[error("malformed haul key: '{0}'")]
pub struct ParseKeyError(String);

impl HaulKey {
    pub fn new(year: i32, survey: impl Into<String>, haul: i64) -> Self {
        Self {
            year,
            survey: survey.into(),
            haul,
        }
    }

    /// The `{year}_{survey}_{haul}` stem shared by haul metadata and joined
    /// flat files.
    pub fn stem(&self) -> String {
        format!("{}_{}_{}", self.year, self.survey, self.haul)
    }

    pub fn joined_path(&self) -> String {
        format!("joined/{}.avro", self.stem())
    }

    pub fn haul_meta_path(&self) -> String {
        format!("haul/{}.avro", self.stem())
    }

    pub fn catch_path(&self) -> String {
        format!("catch/{}.avro", self.haul)
    }

    /// Parse a key back out of an object path such as
    /// `joined/1998_Gulf of Alaska_883.avro`. The survey component may itself
    /// contain underscores, so the year and haul are taken from the ends.
    pub fn from_path(path: &str) -> Result<Self, ParseKeyError> {
        let file = path.rsplit('/').next().unwrap_or(path);
        let stem = file.strip_suffix(".avro").unwrap_or(file);

        let mut parts = stem.splitn(2, '_');
        let year = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(|| ParseKeyError(path.to_string()))?;
        let rest = parts.next().ok_or_else(|| ParseKeyError(path.to_string()))?;

        let (survey, haul) = rest
            .rsplit_once('_')
            .ok_or_else(|| ParseKeyError(path.to_string()))?;
        let haul = haul
            .parse::<i64>()
            .map_err(|_| ParseKeyError(path.to_string()))?;

        Ok(Self::new(year, survey, haul))
    }
}

impl std::fmt::Display for HaulKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stem())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stem_round_trips_through_path() {
        let key = HaulKey::new(2021, "GOA", 883);
        assert_eq!(key.stem(), "2021_GOA_883");
        assert_eq!(key.joined_path(), "joined/2021_GOA_883.avro");
        assert_eq!(HaulKey::from_path(&key.joined_path()).unwrap(), key);
    }

    #[test]
    fn survey_names_may_contain_underscores() {
        let parsed = HaulKey::from_path("haul/1998_Gulf_of_Alaska_17.avro").unwrap();
        assert_eq!(parsed, HaulKey::new(1998, "Gulf_of_Alaska", 17));
    }

    #[test]
    fn rejects_malformed_stems() {
        assert!(HaulKey::from_path("joined/not-a-key.avro").is_err());
        assert!(HaulKey::from_path("joined/2021_GOA.avro").is_err());
    }
}
