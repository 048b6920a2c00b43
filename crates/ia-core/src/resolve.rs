//! Install-date resolution.
//!
//! Each record gets the first date produced by this chain:
//!
//! 1. [`DateSource::Registry`]: the parsed `InstallDate` registration value.
//! 2. [`DateSource::Instrumentation`]: the cached service date for the
//!    package name, if it parses as `yyyyMMdd`.
//! 3. [`DateSource::IconFile`]: creation time of the display icon file.
//! 4. [`DateSource::InstallLocation`]: creation time of the install directory.
//!
//! Explicit dates resolve to local midnight. Resolution is a pure function of
//! the record, the cache, and the filesystem.

use crate::fsmeta::FileMetadata;
use crate::instrumentation::InstallDateCache;
use ia_common::{
    date_at_midnight, parse_install_date, DateSource, InstalledApp, ResolvedInstallDate,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Per-tier tallies from [`InstallDateResolver::resolve_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResolutionSummary {
    pub registry: usize,
    pub instrumentation: usize,
    pub icon_file: usize,
    pub install_location: usize,
    pub unresolved: usize,
    /// Records that already carried a date and were left alone.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub preexisting: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl ResolutionSummary {
    /// Records that ended with a date.
    pub fn resolved(&self) -> usize {
        self.registry + self.instrumentation + self.icon_file + self.install_location + self.preexisting
    }

    pub fn total(&self) -> usize {
        self.resolved() + self.unresolved
    }

    fn record(&mut self, source: Option<DateSource>) {
        match source {
            Some(DateSource::Registry) => self.registry += 1,
            Some(DateSource::Instrumentation) => self.instrumentation += 1,
            Some(DateSource::IconFile) => self.icon_file += 1,
            Some(DateSource::InstallLocation) => self.install_location += 1,
            None => self.unresolved += 1,
        }
    }
}

/// Applies the fallback chain using an explicit cache and filesystem reader.
pub struct InstallDateResolver<'a> {
    cache: &'a InstallDateCache,
    files: &'a dyn FileMetadata,
}

impl<'a> InstallDateResolver<'a> {
    pub fn new(cache: &'a InstallDateCache, files: &'a dyn FileMetadata) -> Self {
        Self { cache, files }
    }

    /// Best available install date for `app`, or `None` when every tier misses.
    pub fn resolve(&self, app: &InstalledApp) -> Option<ResolvedInstallDate> {
        let resolved = DateSource::ALL
            .into_iter()
            .find_map(|source| self.try_tier(app, source).map(|at| ResolvedInstallDate::new(at, source)));
        trace!(name = %app.name, source = ?resolved.map(|r| r.source), "resolved");
        resolved
    }

    fn try_tier(&self, app: &InstalledApp, source: DateSource) -> Option<chrono::NaiveDateTime> {
        match source {
            DateSource::Registry => app.registry_install_date.map(date_at_midnight),
            DateSource::Instrumentation => self
                .cache
                .lookup(&app.name)
                .and_then(parse_install_date)
                .map(date_at_midnight),
            DateSource::IconFile => non_blank(app.display_icon.as_deref())
                .and_then(|path| self.files.file_created(path)),
            DateSource::InstallLocation => non_blank(app.install_location.as_deref())
                .and_then(|path| self.files.dir_created(path)),
        }
    }

    /// Resolve every record that has no date yet.
    pub fn resolve_all(&self, apps: &mut [InstalledApp]) -> ResolutionSummary {
        let mut summary = ResolutionSummary::default();
        for app in apps.iter_mut() {
            if app.resolved_install_date.is_some() {
                summary.preexisting += 1;
                continue;
            }
            app.resolved_install_date = self.resolve(app);
            summary.record(app.date_source());
        }
        summary
    }
}

fn non_blank(path: Option<&str>) -> Option<&str> {
    path.filter(|p| !p.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrumentation::InstrumentationRow;
    use chrono::{NaiveDate, NaiveDateTime};
    use ia_common::{RegistryScope, RegistryView};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeFs {
        files: HashMap<String, NaiveDateTime>,
        dirs: HashMap<String, NaiveDateTime>,
    }

    impl FileMetadata for FakeFs {
        fn file_created(&self, path: &str) -> Option<NaiveDateTime> {
            self.files.get(path).copied()
        }
        fn dir_created(&self, path: &str) -> Option<NaiveDateTime> {
            self.dirs.get(path).copied()
        }
    }

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 30, 0).unwrap()
    }

    fn app(name: &str) -> InstalledApp {
        InstalledApp::new(name, name, RegistryScope::LocalMachine, RegistryView::Native)
    }

    #[test]
    fn test_registry_wins() {
        let cache = InstallDateCache::from_rows(vec![InstrumentationRow::new("Foo", "20200101")]);
        let fs = FakeFs::default();
        let mut a = app("Foo");
        a.registry_install_date = NaiveDate::from_ymd_opt(2023, 6, 15);

        let resolved = InstallDateResolver::new(&cache, &fs).resolve(&a).unwrap();
        assert_eq!(resolved.source, DateSource::Registry);
        assert_eq!(
            resolved.at,
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_instrumentation_case_insensitive() {
        let cache = InstallDateCache::from_rows(vec![InstrumentationRow::new("FOO", "20200101")]);
        let fs = FakeFs::default();
        let resolved = InstallDateResolver::new(&cache, &fs).resolve(&app("foo")).unwrap();
        assert_eq!(resolved.source, DateSource::Instrumentation);
        assert_eq!(resolved.date(), NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(resolved.at.time(), chrono::NaiveTime::MIN);
    }

    #[test]
    fn test_malformed_instrumentation_date_falls_through() {
        let cache = InstallDateCache::from_rows(vec![InstrumentationRow::new("Foo", "2020-01-01")]);
        let mut fs = FakeFs::default();
        fs.files.insert(r"C:\foo.exe".into(), ts(2019, 5, 5, 10));
        let mut a = app("Foo");
        a.display_icon = Some(r"C:\foo.exe".into());

        let resolved = InstallDateResolver::new(&cache, &fs).resolve(&a).unwrap();
        assert_eq!(resolved.source, DateSource::IconFile);
        assert_eq!(resolved.at, ts(2019, 5, 5, 10));
    }

    #[test]
    fn test_install_location_last() {
        let cache = InstallDateCache::empty();
        let mut fs = FakeFs::default();
        fs.dirs.insert(r"C:\Foo".into(), ts(2018, 2, 3, 4));
        let mut a = app("Foo");
        a.display_icon = Some(r"C:\missing.exe".into());
        a.install_location = Some(r"C:\Foo".into());

        let resolved = InstallDateResolver::new(&cache, &fs).resolve(&a).unwrap();
        assert_eq!(resolved.source, DateSource::InstallLocation);
    }

    #[test]
    fn test_icon_must_be_a_file() {
        let cache = InstallDateCache::empty();
        let mut fs = FakeFs::default();
        fs.dirs.insert(r"C:\Foo".into(), ts(2018, 2, 3, 4));
        let mut a = app("Foo");
        a.display_icon = Some(r"C:\Foo".into());

        assert_eq!(InstallDateResolver::new(&cache, &fs).resolve(&a), None);
    }

    #[test]
    fn test_blank_paths_skip_tiers() {
        let cache = InstallDateCache::empty();
        let mut fs = FakeFs::default();
        fs.files.insert("  ".into(), ts(2018, 2, 3, 4));
        fs.dirs.insert("".into(), ts(2018, 2, 3, 4));
        let mut a = app("Foo");
        a.display_icon = Some("  ".into());
        a.install_location = Some("".into());

        assert_eq!(InstallDateResolver::new(&cache, &fs).resolve(&a), None);
    }

    #[test]
    fn test_resolve_all_counts_and_keeps_existing() {
        let cache = InstallDateCache::from_rows(vec![InstrumentationRow::new("B", "20210101")]);
        let fs = FakeFs::default();

        let mut a = app("A");
        a.registry_install_date = NaiveDate::from_ymd_opt(2022, 1, 1);
        let b = app("B");
        let c = app("C");
        let mut d = app("D");
        let fixed = ResolvedInstallDate::new(ts(2001, 1, 1, 1), DateSource::IconFile);
        d.resolved_install_date = Some(fixed);

        let mut apps = vec![a, b, c, d];
        let summary = InstallDateResolver::new(&cache, &fs).resolve_all(&mut apps);

        assert_eq!(summary.registry, 1);
        assert_eq!(summary.instrumentation, 1);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.preexisting, 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(apps[3].resolved_install_date, Some(fixed));
        assert_eq!(apps[2].resolved_install_date, None);
    }
}
