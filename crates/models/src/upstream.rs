use crate::Observation;
use serde::{Deserialize, Serialize};

/// One haul-context row from the upstream haul endpoint. Written during
/// ingest as `haul/{year}_{survey}_{hauljoin}.avro`, one record per file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Haul {
    pub year: Option<i32>,
    pub srvy: Option<String>,
    pub survey: Option<String>,
    pub survey_name: Option<String>,
    pub survey_definition_id: Option<i64>,
    pub cruise: Option<i64>,
    pub cruisejoin: Option<i64>,
    pub hauljoin: Option<i64>,
    pub haul: Option<i64>,
    pub stratum: Option<i64>,
    pub station: Option<String>,
    pub vessel_id: Option<i64>,
    pub vessel_name: Option<String>,
    pub date_time: Option<String>,
    pub latitude_dd_start: Option<f64>,
    pub longitude_dd_start: Option<f64>,
    pub latitude_dd_end: Option<f64>,
    pub longitude_dd_end: Option<f64>,
    pub bottom_temperature_c: Option<f64>,
    pub surface_temperature_c: Option<f64>,
    pub depth_m: Option<f64>,
    pub distance_fished_km: Option<f64>,
    pub duration_hr: Option<f64>,
    pub net_width_m: Option<f64>,
    pub net_height_m: Option<f64>,
    pub area_swept_km2: Option<f64>,
    pub performance: Option<f32>,
}

/// One catch row from the upstream catch endpoint, keyed by hauljoin.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catch {
    pub hauljoin: Option<i64>,
    pub species_code: Option<i64>,
    pub cpue_kgkm2: Option<f64>,
    pub cpue_nokm2: Option<f64>,
    pub count: Option<i64>,
    pub weight_kg: Option<f64>,
    pub taxon_confidence: Option<String>,
}

/// One row of the curated species master list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Species {
    pub species_code: Option<i64>,
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    pub id_rank: Option<String>,
    pub worms: Option<i64>,
    pub itis: Option<i64>,
}

impl Haul {
    /// Seed an observation with this haul's context. Species and catch
    /// attributes start null and are filled by the join.
    pub fn to_observation(&self) -> Observation {
        Observation {
            year: self.year,
            srvy: self.srvy.clone(),
            survey: self.survey.clone(),
            survey_name: self.survey_name.clone(),
            survey_definition_id: self.survey_definition_id,
            cruise: self.cruise,
            cruisejoin: self.cruisejoin,
            hauljoin: self.hauljoin,
            haul: self.haul,
            stratum: self.stratum,
            station: self.station.clone(),
            vessel_id: self.vessel_id,
            vessel_name: self.vessel_name.clone(),
            date_time: self.date_time.clone(),
            latitude_dd_start: self.latitude_dd_start,
            longitude_dd_start: self.longitude_dd_start,
            latitude_dd_end: self.latitude_dd_end,
            longitude_dd_end: self.longitude_dd_end,
            bottom_temperature_c: self.bottom_temperature_c,
            surface_temperature_c: self.surface_temperature_c,
            depth_m: self.depth_m,
            distance_fished_km: self.distance_fished_km,
            duration_hr: self.duration_hr,
            net_width_m: self.net_width_m,
            net_height_m: self.net_height_m,
            area_swept_km2: self.area_swept_km2,
            performance: self.performance,
            ..Default::default()
        }
    }
}
