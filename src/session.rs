//! Per-invocation context
//!
//! A session owns the active project profile and the units loaded for it.
//! Every computation goes through it, so several projects can be handled
//! side by side.

use crate::config::ProjectProfile;
use crate::core::error::Result;
use crate::core::types::UnitRecord;
use crate::metrics::{
    Aggregation, EnvironmentStat, GroupBy, MetricSample, StageAggregator,
    compute_environment_metrics, summarize_environment,
};
use crate::reporting::logging;
use crate::source::{UnitFilter, UnitSource, apply_profile_exclusions};

#[derive(Debug, Clone)]
pub struct Session {
    profile: ProjectProfile,
    units: Vec<UnitRecord>,
}

impl Session {
    /// Build a session, dropping units the profile excludes.
    pub fn new(profile: ProjectProfile, units: Vec<UnitRecord>) -> Self {
        let units = apply_profile_exclusions(units, &profile);
        Self { profile, units }
    }

    /// Fetch the profile's units from `source` and narrow them with `filter`.
    ///
    /// The filter is checked against the profile before anything is fetched.
    pub async fn load(
        profile: ProjectProfile,
        source: &(dyn UnitSource + Send + Sync),
        filter: &UnitFilter,
    ) -> Result<Self> {
        filter.validate(&profile)?;

        let fetched = source.fetch_units(&profile.name).await?;
        let loaded = fetched.len();

        let mut session = Self::new(profile, fetched);
        session.units = filter.apply(session.units, &session.profile)?;

        logging::log_units_loaded(&source.describe(), loaded, session.units.len());
        Ok(session)
    }

    pub fn profile(&self) -> &ProjectProfile {
        &self.profile
    }

    pub fn units(&self) -> &[UnitRecord] {
        &self.units
    }

    pub fn unit_ids(&self) -> Vec<String> {
        self.units.iter().map(|unit| unit.usn.clone()).collect()
    }

    pub fn aggregate(&self, group_by: GroupBy, include_no_batch: bool) -> Option<Aggregation> {
        StageAggregator::new(&self.profile)
            .include_no_batch(include_no_batch)
            .aggregate(&self.units, group_by)
    }

    pub fn environment_samples(&self) -> Vec<MetricSample> {
        compute_environment_metrics(&self.units, &self.profile)
    }

    pub fn environment_stats(&self) -> Vec<EnvironmentStat> {
        summarize_environment(&self.environment_samples())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::core::StageTimeError;
    use crate::core::types::timestamp;
    use async_trait::async_trait;

    struct FixedSource(Vec<UnitRecord>);

    #[async_trait]
    impl UnitSource for FixedSource {
        async fn fetch_units(&self, _project: &str) -> Result<Vec<UnitRecord>> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "fixture".to_string()
        }
    }

    struct FailingSource;

    #[async_trait]
    impl UnitSource for FailingSource {
        async fn fetch_units(&self, _project: &str) -> Result<Vec<UnitRecord>> {
            Err(StageTimeError::Connectivity("offline".to_string()))
        }

        fn describe(&self) -> String {
            "offline".to_string()
        }
    }

    fn units() -> Vec<UnitRecord> {
        vec![
            UnitRecord::new("U1")
                .with_batch("1")
                .with_current_stage("Burn-in (MD)")
                .with_test_start(timestamp::parse("2026-02-01 00:00:00"))
                .with_stage("RS", timestamp::parse("2026-02-01 04:00:00"), Some(2.0)),
            UnitRecord::new("U2")
                .with_current_stage("Setup (RS)")
                .with_stage("RS", timestamp::parse("2026-02-02 04:00:00"), Some(4.0)),
            UnitRecord::new("P123955120005012").with_stage("RS", None, Some(100.0)),
        ]
    }

    #[test]
    fn test_new__applies_exclusions() {
        let session = Session::new(ProjectProfile::l10(), units());
        assert_eq!(session.unit_ids(), vec!["U1", "U2"]);
    }

    #[test]
    fn test_aggregate_and_environment() {
        let session = Session::new(ProjectProfile::l10(), units());

        let all = session.aggregate(GroupBy::None, false).unwrap();
        let rs = &all.groups[0].stages[0];
        assert_eq!(rs.stage, "RS");
        assert_eq!(rs.summary.unwrap().avg, 3.0);

        let by_day = session.aggregate(GroupBy::Day, false).unwrap();
        assert_eq!(by_day.groups.len(), 2);

        let stats = session.environment_stats();
        assert_eq!(stats[0].name, "PRETEST");
        assert_eq!(stats[0].summary.unwrap().avg, 4.0);
    }

    #[tokio::test]
    async fn test_load__filters_units() -> Result<()> {
        let filter = UnitFilter {
            stage: Some("MD".to_string()),
            ..Default::default()
        };
        let session = Session::load(ProjectProfile::l10(), &FixedSource(units()), &filter).await?;
        assert_eq!(session.unit_ids(), vec!["U1"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_load__rejects_unknown_stage_before_fetching() {
        let filter = UnitFilter {
            stage: Some("ZZ".to_string()),
            ..Default::default()
        };
        let err = Session::load(ProjectProfile::l10(), &FailingSource, &filter)
            .await
            .unwrap_err();
        assert!(matches!(err, StageTimeError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_load__propagates_source_errors() {
        let err = Session::load(ProjectProfile::l10(), &FailingSource, &UnitFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StageTimeError::Connectivity(_)));
    }
}
