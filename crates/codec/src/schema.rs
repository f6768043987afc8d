//! Parsed Avro schemas for every object the snapshot stores. The JSON here
//! is the wire contract; changing a field changes the snapshot format.

use apache_avro::Schema;

lazy_static::lazy_static! {
    /// `joined/{key}.avro` records.
    pub static ref OBSERVATION_SCHEMA: Schema = Schema::parse_str(OBSERVATION_JSON)
        .expect("observation schema is valid");

    /// `haul/{key}.avro` records (build-time only).
    pub static ref HAUL_SCHEMA: Schema = Schema::parse_str(HAUL_JSON)
        .expect("haul schema is valid");

    /// `catch/{hauljoin}.avro` records (build-time only).
    pub static ref CATCH_SCHEMA: Schema = Schema::parse_str(CATCH_JSON)
        .expect("catch schema is valid");

    /// `species/{species_code}.avro` records (build-time only).
    pub static ref SPECIES_SCHEMA: Schema = Schema::parse_str(SPECIES_JSON)
        .expect("species schema is valid");

    /// `index/{field}.avro` and `index_sharded/{field}_{shard}.avro` records.
    pub static ref INDEX_ENTRY_SCHEMA: Schema = Schema::parse_str(INDEX_ENTRY_JSON)
        .expect("index entry schema is valid");

    /// `index/main.avro` records.
    pub static ref HAUL_KEY_SCHEMA: Schema = Schema::parse_str(HAUL_KEY_JSON)
        .expect("haul key schema is valid");
}

/// Field names required of every joined record, in schema order. The build
/// verification pass checks these against read-back records.
pub fn observation_field_names() -> &'static [&'static str] {
    &[
        "year",
        "srvy",
        "survey",
        "survey_name",
        "survey_definition_id",
        "cruise",
        "cruisejoin",
        "hauljoin",
        "haul",
        "stratum",
        "station",
        "vessel_id",
        "vessel_name",
        "date_time",
        "latitude_dd_start",
        "longitude_dd_start",
        "latitude_dd_end",
        "longitude_dd_end",
        "bottom_temperature_c",
        "surface_temperature_c",
        "depth_m",
        "distance_fished_km",
        "duration_hr",
        "net_width_m",
        "net_height_m",
        "area_swept_km2",
        "performance",
        "species_code",
        "cpue_kgkm2",
        "cpue_nokm2",
        "count",
        "weight_kg",
        "taxon_confidence",
        "scientific_name",
        "common_name",
        "id_rank",
        "worms",
        "itis",
        "complete",
    ]
}

pub fn index_field_names() -> &'static [&'static str] {
    &["value", "keys"]
}

pub fn key_field_names() -> &'static [&'static str] {
    &["year", "survey", "haul"]
}

const OBSERVATION_JSON: &str = r#"
{
    "doc": "Observation joined across haul, catch, and species.",
    "name": "Observation",
    "namespace": "dev.trawlnet",
    "type": "record",
    "fields": [
        {"name": "year", "type": ["null", "int"]},
        {"name": "srvy", "type": ["null", "string"]},
        {"name": "survey", "type": ["null", "string"]},
        {"name": "survey_name", "type": ["null", "string"]},
        {"name": "survey_definition_id", "type": ["null", "long"]},
        {"name": "cruise", "type": ["null", "long"]},
        {"name": "cruisejoin", "type": ["null", "long"]},
        {"name": "hauljoin", "type": ["null", "long"]},
        {"name": "haul", "type": ["null", "long"]},
        {"name": "stratum", "type": ["null", "long"]},
        {"name": "station", "type": ["null", "string"]},
        {"name": "vessel_id", "type": ["null", "long"]},
        {"name": "vessel_name", "type": ["null", "string"]},
        {"name": "date_time", "type": ["null", "string"]},
        {"name": "latitude_dd_start", "type": ["null", "double"]},
        {"name": "longitude_dd_start", "type": ["null", "double"]},
        {"name": "latitude_dd_end", "type": ["null", "double"]},
        {"name": "longitude_dd_end", "type": ["null", "double"]},
        {"name": "bottom_temperature_c", "type": ["null", "double"]},
        {"name": "surface_temperature_c", "type": ["null", "double"]},
        {"name": "depth_m", "type": ["null", "double"]},
        {"name": "distance_fished_km", "type": ["null", "double"]},
        {"name": "duration_hr", "type": ["null", "double"]},
        {"name": "net_width_m", "type": ["null", "double"]},
        {"name": "net_height_m", "type": ["null", "double"]},
        {"name": "area_swept_km2", "type": ["null", "double"]},
        {"name": "performance", "type": ["null", "float"]},
        {"name": "species_code", "type": ["null", "long"]},
        {"name": "cpue_kgkm2", "type": ["null", "double"]},
        {"name": "cpue_nokm2", "type": ["null", "double"]},
        {"name": "count", "type": ["null", "long"]},
        {"name": "weight_kg", "type": ["null", "double"]},
        {"name": "taxon_confidence", "type": ["null", "string"]},
        {"name": "scientific_name", "type": ["null", "string"]},
        {"name": "common_name", "type": ["null", "string"]},
        {"name": "id_rank", "type": ["null", "string"]},
        {"name": "worms", "type": ["null", "long"]},
        {"name": "itis", "type": ["null", "long"]},
        {"name": "complete", "type": ["null", "boolean"]}
    ]
}
"#;

const HAUL_JSON: &str = r#"
{
    "doc": "Context of a single bottom-trawl tow.",
    "name": "Haul",
    "namespace": "dev.trawlnet",
    "type": "record",
    "fields": [
        {"name": "year", "type": ["null", "int"]},
        {"name": "srvy", "type": ["null", "string"]},
        {"name": "survey", "type": ["null", "string"]},
        {"name": "survey_name", "type": ["null", "string"]},
        {"name": "survey_definition_id", "type": ["null", "long"]},
        {"name": "cruise", "type": ["null", "long"]},
        {"name": "cruisejoin", "type": ["null", "long"]},
        {"name": "hauljoin", "type": ["null", "long"]},
        {"name": "haul", "type": ["null", "long"]},
        {"name": "stratum", "type": ["null", "long"]},
        {"name": "station", "type": ["null", "string"]},
        {"name": "vessel_id", "type": ["null", "long"]},
        {"name": "vessel_name", "type": ["null", "string"]},
        {"name": "date_time", "type": ["null", "string"]},
        {"name": "latitude_dd_start", "type": ["null", "double"]},
        {"name": "longitude_dd_start", "type": ["null", "double"]},
        {"name": "latitude_dd_end", "type": ["null", "double"]},
        {"name": "longitude_dd_end", "type": ["null", "double"]},
        {"name": "bottom_temperature_c", "type": ["null", "double"]},
        {"name": "surface_temperature_c", "type": ["null", "double"]},
        {"name": "depth_m", "type": ["null", "double"]},
        {"name": "distance_fished_km", "type": ["null", "double"]},
        {"name": "duration_hr", "type": ["null", "double"]},
        {"name": "net_width_m", "type": ["null", "double"]},
        {"name": "net_height_m", "type": ["null", "double"]},
        {"name": "area_swept_km2", "type": ["null", "double"]},
        {"name": "performance", "type": ["null", "float"]}
    ]
}
"#;

const CATCH_JSON: &str = r#"
{
    "doc": "One species taken in one haul.",
    "name": "Catch",
    "namespace": "dev.trawlnet",
    "type": "record",
    "fields": [
        {"name": "hauljoin", "type": ["null", "long"]},
        {"name": "species_code", "type": ["null", "long"]},
        {"name": "cpue_kgkm2", "type": ["null", "double"]},
        {"name": "cpue_nokm2", "type": ["null", "double"]},
        {"name": "count", "type": ["null", "long"]},
        {"name": "weight_kg", "type": ["null", "double"]},
        {"name": "taxon_confidence", "type": ["null", "string"]}
    ]
}
"#;

const SPECIES_JSON: &str = r#"
{
    "doc": "One row of the curated species master list.",
    "name": "Species",
    "namespace": "dev.trawlnet",
    "type": "record",
    "fields": [
        {"name": "species_code", "type": ["null", "long"]},
        {"name": "scientific_name", "type": ["null", "string"]},
        {"name": "common_name", "type": ["null", "string"]},
        {"name": "id_rank", "type": ["null", "string"]},
        {"name": "worms", "type": ["null", "long"]},
        {"name": "itis", "type": ["null", "long"]}
    ]
}
"#;

const INDEX_ENTRY_JSON: &str = r#"
{
    "doc": "Index from a normalized value to the flat files containing it.",
    "name": "Index",
    "namespace": "dev.trawlnet",
    "type": "record",
    "fields": [
        {"name": "value", "type": ["string", "long", "double", "null"]},
        {"name": "keys", "type": {
            "type": "array",
            "items": {
                "name": "Key",
                "type": "record",
                "fields": [
                    {"name": "year", "type": "int"},
                    {"name": "survey", "type": "string"},
                    {"name": "haul", "type": "long"}
                ]
            }
        }}
    ]
}
"#;

const HAUL_KEY_JSON: &str = r#"
{
    "doc": "Key to an observation flat file.",
    "name": "Key",
    "namespace": "dev.trawlnet",
    "type": "record",
    "fields": [
        {"name": "year", "type": "int"},
        {"name": "survey", "type": "string"},
        {"name": "haul", "type": "long"}
    ]
}
"#;
