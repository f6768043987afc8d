//! The chainable query builder. Setters record one tagged param per field,
//! converting caller units into storage units up front; `execute` assembles
//! the cursor stack without performing any I/O.

use crate::cursor::{CompleteCursor, Cursor, FlatCursor, LimitCursor};
use crate::param::{FieldParam, Param};
use crate::{Error, Plan, WarnSink, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY};
use models::convert;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use storage::{Fetch, HttpFetcher, DEFAULT_RETRY_DELAY};

pub struct Query {
    params: BTreeMap<&'static str, FieldParam>,
    base_url: String,
    fetcher: Option<Arc<dyn Fetch>>,
    limit: Option<usize>,
    filter_incomplete: bool,
    presence_only: bool,
    suppress_large_warning: bool,
    warn_func: Option<WarnSink>,
    concurrency: usize,
    retry_delay: Duration,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            params: BTreeMap::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            fetcher: None,
            limit: None,
            filter_incomplete: false,
            presence_only: false,
            suppress_large_warning: false,
            warn_func: None,
            concurrency: DEFAULT_CONCURRENCY,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Query a different snapshot bucket.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Inject the object-store reader, replacing the HTTP default. The seam
    /// tests use to serve fixture snapshots.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn filter_year(
        &mut self,
        eq: Option<i64>,
        min_val: Option<i64>,
        max_val: Option<i64>,
    ) -> Result<&mut Self, Error> {
        self.set_param("year", int_param("year", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_srvy(
        &mut self,
        eq: Option<&str>,
        min_val: Option<&str>,
        max_val: Option<&str>,
    ) -> Result<&mut Self, Error> {
        self.set_param("srvy", str_param("srvy", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_survey(
        &mut self,
        eq: Option<&str>,
        min_val: Option<&str>,
        max_val: Option<&str>,
    ) -> Result<&mut Self, Error> {
        self.set_param("survey", str_param("survey", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_survey_id(
        &mut self,
        eq: Option<i64>,
        min_val: Option<i64>,
        max_val: Option<i64>,
    ) -> Result<&mut Self, Error> {
        self.set_param("survey_id", int_param("survey_id", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_cruise(
        &mut self,
        eq: Option<i64>,
        min_val: Option<i64>,
        max_val: Option<i64>,
    ) -> Result<&mut Self, Error> {
        self.set_param("cruise", int_param("cruise", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_haul(
        &mut self,
        eq: Option<i64>,
        min_val: Option<i64>,
        max_val: Option<i64>,
    ) -> Result<&mut Self, Error> {
        self.set_param("haul", int_param("haul", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_stratum(
        &mut self,
        eq: Option<i64>,
        min_val: Option<i64>,
        max_val: Option<i64>,
    ) -> Result<&mut Self, Error> {
        self.set_param("stratum", int_param("stratum", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_station(
        &mut self,
        eq: Option<&str>,
        min_val: Option<&str>,
        max_val: Option<&str>,
    ) -> Result<&mut Self, Error> {
        self.set_param("station", str_param("station", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_vessel_name(
        &mut self,
        eq: Option<&str>,
        min_val: Option<&str>,
        max_val: Option<&str>,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "vessel_name",
            str_param("vessel_name", eq, min_val, max_val)?,
        );
        Ok(self)
    }

    pub fn filter_vessel_id(
        &mut self,
        eq: Option<i64>,
        min_val: Option<i64>,
        max_val: Option<i64>,
    ) -> Result<&mut Self, Error> {
        self.set_param("vessel_id", int_param("vessel_id", eq, min_val, max_val)?);
        Ok(self)
    }

    /// Filter on the tow's start timestamp. Comparisons are day-granular:
    /// both sides truncate to their `YYYY-MM-DD` prefix.
    pub fn filter_date_time(
        &mut self,
        eq: Option<&str>,
        min_val: Option<&str>,
        max_val: Option<&str>,
    ) -> Result<&mut Self, Error> {
        let param = match str_param("date_time", eq, min_val, max_val)? {
            FieldParam::Str(inner) => FieldParam::Datetime(inner),
            other => other,
        };
        self.set_param("date_time", param);
        Ok(self)
    }

    pub fn filter_latitude(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "latitude_dd",
            converted_float_param("latitude_dd", eq, min_val, max_val, units, "dd")?,
        );
        Ok(self)
    }

    pub fn filter_longitude(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "longitude_dd",
            converted_float_param("longitude_dd", eq, min_val, max_val, units, "dd")?,
        );
        Ok(self)
    }

    pub fn filter_species_code(
        &mut self,
        eq: Option<i64>,
        min_val: Option<i64>,
        max_val: Option<i64>,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "species_code",
            int_param("species_code", eq, min_val, max_val)?,
        );
        Ok(self)
    }

    pub fn filter_common_name(
        &mut self,
        eq: Option<&str>,
        min_val: Option<&str>,
        max_val: Option<&str>,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "common_name",
            str_param("common_name", eq, min_val, max_val)?,
        );
        Ok(self)
    }

    pub fn filter_scientific_name(
        &mut self,
        eq: Option<&str>,
        min_val: Option<&str>,
        max_val: Option<&str>,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "scientific_name",
            str_param("scientific_name", eq, min_val, max_val)?,
        );
        Ok(self)
    }

    pub fn filter_taxon_confidence(
        &mut self,
        eq: Option<&str>,
        min_val: Option<&str>,
        max_val: Option<&str>,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "taxon_confidence",
            str_param("taxon_confidence", eq, min_val, max_val)?,
        );
        Ok(self)
    }

    /// Filter catch-per-unit-effort by weight. The param stays in the given
    /// units; the executor converts stored values to match. Overwrites any
    /// prior CPUE weight filter regardless of its units.
    pub fn filter_cpue_weight(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        let field = match units {
            "kg/ha" => "cpue_kgha",
            "kg/km2" => "cpue_kgkm2",
            "kg1000/km2" => "cpue_kg1000km2",
            other => return Err(models::UnitError::Unknown(other.to_string()).into()),
        };

        for slot in ["cpue_kgha", "cpue_kgkm2", "cpue_kg1000km2"] {
            self.params.remove(slot);
        }
        self.set_param(field, float_param(field, eq, min_val, max_val)?);
        Ok(self)
    }

    /// Filter catch-per-unit-effort by specimen count, analogous to
    /// [`Query::filter_cpue_weight`].
    pub fn filter_cpue_count(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        let field = match units {
            "count/ha" | "no/ha" => "cpue_noha",
            "count/km2" | "no/km2" => "cpue_nokm2",
            "count1000/km2" | "no1000/km2" => "cpue_no1000km2",
            other => return Err(models::UnitError::Unknown(other.to_string()).into()),
        };

        for slot in ["cpue_noha", "cpue_nokm2", "cpue_no1000km2"] {
            self.params.remove(slot);
        }
        self.set_param(field, float_param(field, eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_weight(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "weight_kg",
            converted_float_param("weight_kg", eq, min_val, max_val, units, "kg")?,
        );
        Ok(self)
    }

    pub fn filter_count(
        &mut self,
        eq: Option<i64>,
        min_val: Option<i64>,
        max_val: Option<i64>,
    ) -> Result<&mut Self, Error> {
        self.set_param("count", int_param("count", eq, min_val, max_val)?);
        Ok(self)
    }

    pub fn filter_bottom_temperature(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "bottom_temperature_c",
            converted_float_param("bottom_temperature_c", eq, min_val, max_val, units, "c")?,
        );
        Ok(self)
    }

    pub fn filter_surface_temperature(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "surface_temperature_c",
            converted_float_param("surface_temperature_c", eq, min_val, max_val, units, "c")?,
        );
        Ok(self)
    }

    pub fn filter_depth(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "depth_m",
            converted_float_param("depth_m", eq, min_val, max_val, units, "m")?,
        );
        Ok(self)
    }

    pub fn filter_distance_fished(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "distance_fished_km",
            converted_float_param("distance_fished_km", eq, min_val, max_val, units, "km")?,
        );
        Ok(self)
    }

    pub fn filter_net_width(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "net_width_m",
            converted_float_param("net_width_m", eq, min_val, max_val, units, "m")?,
        );
        Ok(self)
    }

    pub fn filter_net_height(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "net_height_m",
            converted_float_param("net_height_m", eq, min_val, max_val, units, "m")?,
        );
        Ok(self)
    }

    /// Filter on the area the net swept. The param is kept in hectares and
    /// answered from the km²-denominated storage.
    pub fn filter_area_swept(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "area_swept_ha",
            converted_float_param("area_swept_ha", eq, min_val, max_val, units, "ha")?,
        );
        Ok(self)
    }

    pub fn filter_duration(
        &mut self,
        eq: Option<f64>,
        min_val: Option<f64>,
        max_val: Option<f64>,
        units: &str,
    ) -> Result<&mut Self, Error> {
        self.set_param(
            "duration_hr",
            converted_float_param("duration_hr", eq, min_val, max_val, units, "hr")?,
        );
        Ok(self)
    }

    /// Cap the number of records the cursor yields.
    pub fn set_limit(&mut self, limit: Option<usize>) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Silently set aside incomplete records instead of yielding them.
    pub fn set_filter_incomplete(&mut self, filter_incomplete: bool) -> &mut Self {
        self.filter_incomplete = filter_incomplete;
        self
    }

    /// Restrict results to actual catches. While set, the species-identity
    /// indices are not consulted (they exclude zero-catch rows and would
    /// under-report); those filters fall back to local evaluation.
    pub fn set_presence_only(&mut self, presence_only: bool) -> &mut Self {
        self.presence_only = presence_only;
        self
    }

    pub fn set_suppress_large_warning(&mut self, suppress: bool) -> &mut Self {
        self.suppress_large_warning = suppress;
        self
    }

    pub fn set_warn_function(&mut self, warn_func: WarnSink) -> &mut Self {
        self.warn_func = Some(warn_func);
        self
    }

    /// Cap on concurrent flat-file fetches.
    pub fn set_fetch_concurrency(&mut self, concurrency: usize) -> &mut Self {
        self.concurrency = concurrency;
        self
    }

    /// Pause before the single retry of a failed fetch.
    pub fn set_retry_delay(&mut self, retry_delay: Duration) -> &mut Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Build a cursor over the query's current state. No I/O happens until
    /// the first pull; later changes to the builder do not affect cursors
    /// already returned.
    pub fn execute(&self) -> Result<Box<dyn Cursor>, Error> {
        let fetch: Arc<dyn Fetch> = match &self.fetcher {
            Some(fetcher) => fetcher.clone(),
            None => {
                let base_url = url::Url::parse(&self.base_url)
                    .map_err(|_| Error::BadBaseUrl(self.base_url.clone()))?;
                Arc::new(HttpFetcher::new(base_url))
            }
        };

        let plan = Plan {
            fetch,
            params: self.params.clone(),
            presence_only: self.presence_only,
            suppress_large_warning: self.suppress_large_warning,
            warn_func: self.warn_func.clone(),
            concurrency: self.concurrency,
            retry_delay: self.retry_delay,
        };

        let mut cursor: Box<dyn Cursor> = Box::new(FlatCursor::new(plan));
        if self.filter_incomplete {
            cursor = Box::new(CompleteCursor::new(cursor));
        }
        if let Some(limit) = self.limit {
            cursor = Box::new(LimitCursor::new(cursor, limit));
        }
        Ok(cursor)
    }

    fn set_param(&mut self, field: &'static str, param: FieldParam) {
        // Last write wins for the field.
        self.params.insert(field, param);
    }
}

fn param_of<T>(
    field: &'static str,
    eq: Option<T>,
    min_val: Option<T>,
    max_val: Option<T>,
) -> Result<Param<T>, Error> {
    match (eq, min_val, max_val) {
        (None, None, None) => Ok(Param::Empty),
        (Some(value), None, None) => Ok(Param::Equals(value)),
        (None, low, high) => Ok(Param::Range { low, high }),
        (Some(_), _, _) => Err(Error::ConflictingFilter(field)),
    }
}

fn str_param(
    field: &'static str,
    eq: Option<&str>,
    min_val: Option<&str>,
    max_val: Option<&str>,
) -> Result<FieldParam, Error> {
    Ok(FieldParam::Str(param_of(
        field,
        eq.map(str::to_string),
        min_val.map(str::to_string),
        max_val.map(str::to_string),
    )?))
}

fn int_param(
    field: &'static str,
    eq: Option<i64>,
    min_val: Option<i64>,
    max_val: Option<i64>,
) -> Result<FieldParam, Error> {
    Ok(FieldParam::Int(param_of(field, eq, min_val, max_val)?))
}

fn float_param(
    field: &'static str,
    eq: Option<f64>,
    min_val: Option<f64>,
    max_val: Option<f64>,
) -> Result<FieldParam, Error> {
    Ok(FieldParam::Float(param_of(field, eq, min_val, max_val)?))
}

/// Float param whose bounds are converted from caller units into the field's
/// storage units before the filter is recorded.
fn converted_float_param(
    field: &'static str,
    eq: Option<f64>,
    min_val: Option<f64>,
    max_val: Option<f64>,
    units: &str,
    storage_units: &str,
) -> Result<FieldParam, Error> {
    let eq = eq.map(|v| convert(v, units, storage_units)).transpose()?;
    let min_val = min_val
        .map(|v| convert(v, units, storage_units))
        .transpose()?;
    let max_val = max_val
        .map(|v| convert(v, units, storage_units))
        .transpose()?;
    float_param(field, eq, min_val, max_val)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conflicting_filters_error_at_the_setter() {
        let mut query = Query::new();
        let result = query.filter_year(Some(2021), Some(2020), None);
        assert!(matches!(result, Err(Error::ConflictingFilter("year"))));
    }

    #[test]
    fn unknown_units_error_at_the_setter() {
        let mut query = Query::new();
        assert!(query.filter_weight(Some(10.0), None, None, "stone").is_err());
        assert!(query
            .filter_cpue_weight(Some(1.0), None, None, "kg/acre")
            .is_err());
    }

    #[test]
    fn weight_converts_to_storage_units() {
        let mut query = Query::new();
        query.filter_weight(Some(10.0), None, None, "g").unwrap();
        assert_eq!(
            query.params["weight_kg"],
            FieldParam::Float(Param::Equals(0.01))
        );
    }

    #[test]
    fn cpue_setter_parks_value_under_unit_slot() {
        let mut query = Query::new();
        query
            .filter_cpue_weight(Some(1.0), None, None, "kg/ha")
            .unwrap();
        assert_eq!(
            query.params["cpue_kgha"],
            FieldParam::Float(Param::Equals(1.0))
        );

        // Re-filtering in other units clears the previous slot.
        query
            .filter_cpue_weight(Some(5.0), None, None, "kg/km2")
            .unwrap();
        assert!(!query.params.contains_key("cpue_kgha"));
        assert_eq!(
            query.params["cpue_kgkm2"],
            FieldParam::Float(Param::Equals(5.0))
        );
    }

    #[test]
    fn last_write_wins_per_field() {
        let mut query = Query::new();
        query.filter_year(Some(2020), None, None).unwrap();
        query.filter_year(None, Some(2021), Some(2023)).unwrap();
        assert_eq!(
            query.params["year"],
            FieldParam::Int(Param::Range {
                low: Some(2021),
                high: Some(2023)
            })
        );
    }

    #[test]
    fn date_time_setter_builds_datetime_param() {
        let mut query = Query::new();
        query
            .filter_date_time(Some("2021-06-15T10:30:00"), None, None)
            .unwrap();
        assert!(matches!(
            &query.params["date_time"],
            FieldParam::Datetime(Param::Equals(v)) if v == "2021-06-15T10:30:00"
        ));
    }
}
